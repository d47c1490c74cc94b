// triage-core/src/core/audit.rs
// ============================================================================
// Module: Audit Sink
// Description: Structured, append-only logging surface for per-log outcomes.
// Purpose: Give every terminal pipeline outcome exactly one structured record.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The pipeline carries no `tracing`/`log` dependency. Every terminal outcome
//! of a per-log task is instead recorded as one [`AuditRecord`] passed to an
//! injected [`AuditSink`]. This mirrors the audit-event-sink pattern used
//! elsewhere in this codebase: default-method traits so a sink only
//! implements what it needs, with `Stderr`/`File`/`Noop` implementations
//! provided.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::model::AuditRecord;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while recording an audit event.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The record could not be serialized to JSON.
    #[error("audit record serialization failed: {0}")]
    Serialize(String),
    /// The sink's underlying I/O failed.
    #[error("audit sink io error: {0}")]
    Io(String),
    /// The sink's internal lock was poisoned by a panicking holder.
    #[error("audit sink mutex poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Receives one [`AuditRecord`] per terminal per-log outcome.
///
/// Implementations must be safe to share across worker threads; callers hold
/// a [`SharedAuditSink`] rather than the concrete type.
pub trait AuditSink {
    /// Records a single audit event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the record could not be persisted. Callers
    /// should treat a sink failure as non-fatal to the pipeline run.
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

/// Writes one JSON line per record to stderr. Intended as a debugging aid,
/// not the primary audit trail.
#[derive(Debug, Default)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let line = serde_json::to_string(record).map_err(|err| AuditError::Serialize(err.to_string()))?;
        writeln!(std::io::stderr(), "{line}").map_err(|err| AuditError::Io(err.to_string()))
    }
}

/// Appends one JSON line per record to a file, per the
/// `<cache_dir>/audit_logs.jsonl` layout. Flushes after every write so a
/// crash never loses an already-recorded outcome.
pub struct FileAuditSink {
    /// Append-mode file handle, guarded for cross-thread sharing.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens (creating if necessary) the audit log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file cannot be opened for append.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| AuditError::Io(err.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| AuditError::Io(err.to_string()))?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let line = serde_json::to_string(record).map_err(|err| AuditError::Serialize(err.to_string()))?;
        let mut file = self.file.lock().map_err(|_| AuditError::Poisoned)?;
        writeln!(file, "{line}").map_err(|err| AuditError::Io(err.to_string()))?;
        file.flush().map_err(|err| AuditError::Io(err.to_string()))
    }
}

/// Discards every record. Used in tests and dry-run previews.
#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Wrapper
// ============================================================================

/// Type-erased, cheaply cloneable handle to an [`AuditSink`].
#[derive(Clone)]
pub struct SharedAuditSink {
    /// The wrapped sink.
    inner: Arc<dyn AuditSink + Send + Sync>,
}

impl SharedAuditSink {
    /// Wraps an existing sink instance.
    pub fn from_sink(sink: impl AuditSink + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(sink) }
    }

    /// Wraps an already-type-erased sink.
    #[must_use]
    pub const fn new(inner: Arc<dyn AuditSink + Send + Sync>) -> Self {
        Self { inner }
    }
}

impl AuditSink for SharedAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.inner.record(record)
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::AuditSink;
    use super::NoopAuditSink;
    use crate::core::identifiers::EnvironmentName;
    use crate::core::identifiers::Fingerprint;
    use crate::core::identifiers::ServiceName;
    use crate::core::model::AuditAction;
    use crate::core::model::AuditRecord;

    fn sample_record() -> AuditRecord {
        AuditRecord {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            service: ServiceName::new("checkout"),
            environment: EnvironmentName::new("production"),
            fingerprint: Fingerprint::new("abcdef012345"),
            action: AuditAction::Skip,
            strategy_name: None,
            issue_key: None,
            severity: None,
            error_type: None,
            duration_ms: 12,
            reason: Some("not_actionable".to_string()),
        }
    }

    #[test]
    fn noop_sink_never_errors() {
        let sink = NoopAuditSink;
        assert!(sink.record(&sample_record()).is_ok());
    }
}
