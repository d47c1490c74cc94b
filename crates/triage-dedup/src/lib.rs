// triage-dedup/src/lib.rs
// ============================================================================
// Crate: triage-dedup
// Description: The five-strategy dedup cascade and its fixed-order
//              orchestrator (components D and E).
// Purpose: Eliminate the great majority of logs before any expensive call.
// Dependencies: triage-cache, triage-core, triage-similarity
// ============================================================================

//! ## Overview
//! Five equivalence checks, ordered cheapest-first, each implementing
//! [`strategies::DedupStrategy`]. [`orchestrator::DedupOrchestrator`] runs
//! them in fixed order and short-circuits on the first non-[`triage_core::DedupResult::Unique`]
//! result. Strategy 1 ([`strategies::InMemorySeenLogs`]) runs pre-analysis,
//! before an `error_type` is known; strategies 2-5 run post-analysis and are
//! the orchestrator's concern.

#![forbid(unsafe_code)]

pub mod error;
pub mod orchestrator;
pub mod strategies;

pub use error::DedupError;
pub use orchestrator::DedupOrchestrator;
pub use orchestrator::PostAnalysisInput;
pub use strategies::DedupStrategy;
pub use strategies::ErrorTypeLabelSearch;
pub use strategies::FingerprintCache;
pub use strategies::InMemorySeenLogs;
pub use strategies::LoghashLabelSearch;
pub use strategies::SimilaritySearch;
