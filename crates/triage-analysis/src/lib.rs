// triage-analysis/src/lib.rs
// ============================================================================
// Crate: triage-analysis
// Description: Circuit breaker, deterministic fallback classifier, and the
//              analysis node that combines them with the LLM client
//              (components F, G, H).
// Purpose: Guarantee every log reaching the ticket node carries a usable
//          Classification, LLM outage or not.
// Dependencies: regex, serde_json, triage-config, triage-core
// ============================================================================

//! ## Overview
//! `triage-analysis` sits between the dedup cascade and the ticket node.
//! [`breaker::CircuitBreaker`] protects the LLM client from being hammered
//! during an outage; [`fallback::FallbackAnalyzer`] is the deterministic
//! backstop that keeps the pipeline classifying logs while the breaker is
//! open; [`node::AnalysisNode`] is the single entry point the pipeline calls.

#![forbid(unsafe_code)]

pub mod breaker;
pub mod error;
pub mod fallback;
pub mod node;

pub use breaker::BreakerState;
pub use breaker::CircuitBreaker;
pub use error::AnalysisError;
pub use error::BreakerError;
pub use fallback::FallbackAnalyzer;
pub use fallback::FallbackBuildError;
pub use node::AnalysisContext;
pub use node::AnalysisNode;
