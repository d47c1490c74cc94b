// triage-config/src/root.rs
// ============================================================================
// Module: Root Config
// Description: Top-level TOML-backed configuration for the triage pipeline.
// Purpose: Load, default, and validate every option in the configuration
//          surface (spec §6) from a single file.
// ============================================================================

//! ## Overview
//! [`TriageConfig`] is read once at process start from a TOML file (default
//! path `./triage.toml`) and frozen; per spec §9's design note on global
//! mutable state, nothing downstream mutates it in place. Multi-tenant or
//! multi-service loops construct a fresh [`TriageConfig`] per iteration
//! rather than mutating a shared instance.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::AuditConfig;
use crate::CacheConfig;
use crate::CircuitBreakerConfig;
use crate::ConfigError;
use crate::DedupConfig;
use crate::PipelineConfig;
use crate::ProvidersConfig;
use crate::TicketConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard cap on the size of a config file this crate will read, guarding
/// against accidentally pointing `--config` at an unrelated large file.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Default path consulted when no explicit path is given to [`TriageConfig::load`].
pub const DEFAULT_CONFIG_PATH: &str = "./triage.toml";

/// Default directory for the cache layer, persistent fingerprint store, and
/// audit log, when not overridden.
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./triage-cache")
}

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for a single triage pipeline run.
///
/// Every nested sub-config carries its own `Default` and `validate()`,
/// mirroring the field defaults documented in spec §6's configuration
/// surface table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Base directory for the cache layer, persistent fingerprint store, and
    /// audit log (`<cache_dir>/fingerprints/`, `<cache_dir>/audit_logs.jsonl`).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Dedup cascade thresholds and tracker search limits.
    pub dedup: DedupConfig,
    /// Cache layer backend selection and capacity.
    pub cache: CacheConfig,
    /// Circuit breaker thresholds and timing.
    pub circuit: CircuitBreakerConfig,
    /// Worker pool sizing, rate limiting, and deadlines.
    pub pipeline: PipelineConfig,
    /// Ticket node creation cap, commenting, and dry-run behavior.
    pub ticket: TicketConfig,
    /// Audit sink backend selection.
    pub audit: AuditConfig,
    /// Connection settings for the log backend, issue tracker, LLM, and
    /// persistent fingerprint store.
    pub providers: ProvidersConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            dedup: DedupConfig::default(),
            cache: CacheConfig::default(),
            circuit: CircuitBreakerConfig::default(),
            pipeline: PipelineConfig::default(),
            ticket: TicketConfig::default(),
            audit: AuditConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl TriageConfig {
    /// Loads configuration from `path`, falling back to [`DEFAULT_CONFIG_PATH`]
    /// when `path` is `None`. Enforces [`MAX_CONFIG_FILE_SIZE`], parses the
    /// file as TOML, and validates the result before returning it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, exceeds the size
    /// limit, is not valid UTF-8, fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf);
        let path_label = path.display().to_string();

        let metadata = std::fs::metadata(&path)
            .map_err(|err| ConfigError::Read { path: path_label.clone(), source: err.to_string() })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                path: path_label,
                size: metadata.len(),
                limit: MAX_CONFIG_FILE_SIZE,
            });
        }

        let bytes = std::fs::read(&path)
            .map_err(|err| ConfigError::Read { path: path_label.clone(), source: err.to_string() })?;
        let text = String::from_utf8(bytes).map_err(|_err| ConfigError::NotUtf8 { path: path_label.clone() })?;

        let config: Self = toml::from_str(&text)
            .map_err(|err| ConfigError::Parse { path: path_label, source: err.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates this config and every nested sub-config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] from the first sub-config that fails
    /// its own validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dedup.validate()?;
        self.cache.validate()?;
        self.circuit.validate()?;
        self.pipeline.validate()?;
        self.ticket.validate()?;
        self.audit.validate()?;
        self.providers.validate()?;
        Ok(())
    }

    /// Returns the directory holding persisted fingerprints
    /// (`<cache_dir>/fingerprints/`).
    #[must_use]
    pub fn fingerprints_dir(&self) -> PathBuf {
        self.cache_dir.join("fingerprints")
    }

    /// Returns the path of the append-only audit log
    /// (`<cache_dir>/audit_logs.jsonl`).
    #[must_use]
    pub fn audit_log_path(&self) -> PathBuf {
        self.cache_dir.join("audit_logs.jsonl")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::TriageConfig;
    use crate::ConfigError;

    #[test]
    fn default_config_validates() {
        TriageConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn load_parses_partial_overrides_and_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("triage.toml");
        let mut file = std::fs::File::create(&path).expect("create config file");
        writeln!(file, "[pipeline]\nworkers = 7\n").expect("write config file");

        let config = TriageConfig::load(Some(&path)).expect("load succeeds");
        assert_eq!(config.pipeline.workers, 7);
        assert!((config.dedup.similarity_threshold - 0.82).abs() < 1e-9);
    }

    #[test]
    fn load_rejects_oversized_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("triage.toml");
        let mut file = std::fs::File::create(&path).expect("create config file");
        let filler = "# padding\n".repeat(200_000);
        writeln!(file, "{filler}").expect("write config file");

        let err = TriageConfig::load(Some(&path)).expect_err("oversized file is rejected");
        assert!(matches!(err, ConfigError::TooLarge { .. }));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("triage.toml");
        let mut file = std::fs::File::create(&path).expect("create config file");
        writeln!(file, "[dedup]\nsimilarity_threshold = 1.5\n").expect("write config file");

        let err = TriageConfig::load(Some(&path)).expect_err("out-of-range value is rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = TriageConfig::load(Some(std::path::Path::new("/nonexistent/triage.toml")))
            .expect_err("missing file is rejected");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
