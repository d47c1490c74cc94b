// triage-dedup/src/error.rs
// ============================================================================
// Module: Dedup Errors
// Description: Failure modes surfaced by the dedup cascade.
// ============================================================================

use thiserror::Error;

/// Errors raised while running the dedup cascade.
///
/// Per spec §4.D, a strategy that fails transiently must not mask later
/// strategies: every [`crate::strategies::DedupStrategy::check`] call catches
/// these internally and reports [`Unique`](triage_core::DedupResult::Unique)
/// plus a warning rather than propagating. This type exists so that internal
/// conversion has a single, documented shape.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The persistent fingerprint store failed.
    #[error("fingerprint store error: {0}")]
    Store(#[from] triage_core::StoreError),
    /// An external provider (issue tracker) failed.
    #[error("provider error: {0}")]
    Provider(#[from] triage_core::ProviderError),
    /// The similarity engine's cache failed.
    #[error("similarity error: {0}")]
    Similarity(#[from] triage_similarity::engine::SimilarityError),
}
