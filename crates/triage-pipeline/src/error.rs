// triage-pipeline/src/error.rs
// ============================================================================
// Module: Pipeline Errors
// Description: Errors surfaced by a pipeline run itself, as opposed to the
//              per-log outcomes recorded in the audit trail.
// ============================================================================

use thiserror::Error;
use triage_core::ProviderError;

/// Errors that abort a run before any log is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The log backend fetch failed; no logs were processed.
    #[error("log backend fetch failed: {0}")]
    FetchFailed(ProviderError),
}
