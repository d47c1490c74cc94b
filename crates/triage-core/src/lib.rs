// triage-core/src/lib.rs
// ============================================================================
// Crate: triage-core
// Description: Data model, identifiers, normalizer, and external-interface
//              traits shared across the triage pipeline.
// ============================================================================

//! ## Overview
//! `triage-core` is the dependency-free foundation of the log triage
//! pipeline: the data model (§3), the normalizer (component A), the
//! consumer-contract traits for external collaborators (§6), and the audit
//! sink that is the pipeline's sole logging surface.

pub mod core;
pub mod interfaces;

pub use core::audit::AuditError;
pub use core::audit::AuditSink;
pub use core::audit::FileAuditSink;
pub use core::audit::NoopAuditSink;
pub use core::audit::SharedAuditSink;
pub use core::audit::StderrAuditSink;
pub use core::identifiers::EnvironmentName;
pub use core::identifiers::ErrorType;
pub use core::identifiers::Fingerprint;
pub use core::identifiers::IssueKey;
pub use core::identifiers::Loghash;
pub use core::identifiers::ServiceName;
pub use core::identifiers::StrategyName;
pub use core::model::AuditAction;
pub use core::model::AuditRecord;
pub use core::model::CacheEntry;
pub use core::model::CacheStats;
pub use core::model::Classification;
pub use core::model::ClassificationSource;
pub use core::model::DedupResult;
pub use core::model::FingerprintRecord;
pub use core::model::FingerprintSource;
pub use core::model::Issue;
pub use core::model::IssueSearchQuery;
pub use core::model::LogQuery;
pub use core::model::LogRecord;
pub use core::model::RunState;
pub use core::model::RunStatistics;
pub use core::model::Severity;
pub use core::model::TicketPayload;
pub use core::run_state::ReserveOutcome;
pub use core::run_state::SharedRunState;
pub use core::normalize::DEFAULT_TITLE_MAX_LEN;
pub use core::normalize::clean_title;
pub use core::normalize::fingerprint;
pub use core::normalize::loghash;
pub use core::normalize::normalize;
pub use core::normalize::to_kebab_case;
pub use interfaces::FingerprintStore;
pub use interfaces::LlmClient;
pub use interfaces::LogBackend;
pub use interfaces::IssueTracker;
pub use interfaces::ProviderError;
pub use interfaces::SharedFingerprintStore;
pub use interfaces::SharedIssueTracker;
pub use interfaces::SharedLlmClient;
pub use interfaces::SharedLogBackend;
pub use interfaces::StoreError;
