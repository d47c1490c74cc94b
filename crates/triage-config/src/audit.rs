// triage-config/src/audit.rs
// ============================================================================
// Module: Audit Config
// Description: Selects which `AuditSink` backend the pipeline constructs.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

/// Which [`triage_core::AuditSink`] implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditBackendKind {
    /// Append JSON lines to `<cache_dir>/audit_logs.jsonl`.
    #[default]
    File,
    /// Emit JSON lines to stderr; a debugging aid, not the primary record.
    Stderr,
    /// Discard every record.
    Noop,
}

/// Audit sink configuration (spec §3 audit record, §6 layout).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Which sink implementation to construct.
    pub backend: AuditBackendKind,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { backend: AuditBackendKind::File }
    }
}

impl AuditConfig {
    /// Validates the configuration. Every backend variant is always valid;
    /// this exists to match the sibling sub-configs' shape.
    ///
    /// # Errors
    ///
    /// This implementation currently never fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}
