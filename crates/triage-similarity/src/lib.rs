// triage-similarity/src/lib.rs
// ============================================================================
// Crate: triage-similarity
// Description: Composite title/description similarity scoring with
//              additive bonuses, configurable thresholds, and cached lookups.
// Purpose: Back the error-type and broad similarity dedup strategies.
// Dependencies: serde, serde_json, triage-cache, triage-core
// ============================================================================

//! ## Overview
//! Scores a candidate log against a set of existing tracker issues using a
//! weighted blend of title and description similarity, plus a small set of
//! capped additive bonuses (matching error type, matching logger, token
//! overlap, partial log match). Scoring results are cached by
//! `(title, error_type, logger)` through an injected [`triage_cache::Cache`]
//! so the same comparison is never recomputed within the cache's TTL.

#![forbid(unsafe_code)]

pub mod engine;
pub mod ratio;

pub use engine::CandidateIssue;
pub use engine::SimilarityConfig;
pub use engine::SimilarityEngine;
pub use engine::SimilarityInput;
pub use engine::SimilarityMatch;
pub use ratio::char_ratio;
pub use ratio::jaccard;
pub use ratio::token_set_ratio;
pub use ratio::tokenize;
