// triage-pipeline/src/lib.rs
// ============================================================================
// Crate: triage-pipeline
// Description: Bounded worker pool, token-bucket rate limiter, and the
//              end-to-end run driver (component J).
// Purpose: Turn a configured set of collaborators into one callable
//          `Pipeline::run`, with cancellation and per-task deadlines as
//          first-class concerns rather than an afterthought.
// Dependencies: time, triage-analysis, triage-config, triage-core,
//               triage-dedup, triage-ticket
// ============================================================================

//! ## Overview
//! `triage-pipeline` is the outermost orchestration layer: it owns the
//! worker thread pool, the rate limiter, and the cancellation flag, and
//! calls into [`triage_dedup`], [`triage_analysis`], and [`triage_ticket`]
//! for every log in a fetch batch. Everything downstream of the log backend
//! fetch (dedup, analysis, ticketing, audit) runs per-log on a worker
//! thread; nothing here talks to a concrete transport directly.

#![forbid(unsafe_code)]

mod error;
mod pipeline;
mod rate_limiter;

pub use error::PipelineError;
pub use pipeline::CancelHandle;
pub use pipeline::Pipeline;
pub use pipeline::RunSummary;
pub use rate_limiter::AcquireOutcome;
pub use rate_limiter::RateLimiter;
