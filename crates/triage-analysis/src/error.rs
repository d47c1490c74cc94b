// triage-analysis/src/error.rs
// ============================================================================
// Module: Analysis Errors
// Description: Failure modes surfaced by the circuit breaker and analysis node.
// ============================================================================

use thiserror::Error;

use triage_core::ProviderError;

/// Errors raised while calling through the [`crate::breaker::CircuitBreaker`].
#[derive(Debug, Error, Clone)]
pub enum BreakerError {
    /// The breaker is `Open` (or `HalfOpen` with no probe slots free) and
    /// rejected the call before it was attempted.
    #[error("circuit breaker is open")]
    CircuitOpen,
    /// The wrapped call itself failed.
    #[error("call failed: {0}")]
    Call(#[from] ProviderError),
}

/// Errors raised by [`crate::node::AnalysisNode::analyze`].
#[derive(Debug, Error, Clone)]
pub enum AnalysisError {
    /// The task was cancelled before or during the LLM call; never counted
    /// against the circuit breaker and never routed to the fallback analyzer.
    #[error("analysis cancelled")]
    Cancelled,
    /// The LLM call failed or was rejected by the breaker, and the fallback
    /// analyzer is disabled by configuration.
    #[error("analysis unavailable: {0}")]
    Unavailable(String),
}
