// triage-config/src/providers.rs
// ============================================================================
// Module: Providers Config
// Description: Connection settings for the log backend, issue tracker, LLM,
//              and persistent fingerprint store consumer contracts (§6).
// Purpose: Keep every outbound-network and storage detail in one place,
//          without this crate depending on `triage-providers` itself.
// ============================================================================

//! ## Overview
//! This module holds plain, `serde`-derived settings for the four external
//! collaborators named in spec §6. It deliberately does not depend on
//! `triage-providers` or `triage-store-sqlite`: those crates own the
//! concrete `LogBackend`/`IssueTracker`/`LlmClient`/`FingerprintStore`
//! implementations and their own internal config types, and the CLI is the
//! only place that bridges the two, matching the workspace's "no tight
//! coupling between config and concrete providers" convention.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

// ============================================================================
// SECTION: Shared HTTP Settings
// ============================================================================

/// Connection and SSRF-hardening settings shared by every HTTP-backed provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEndpointConfig {
    /// Base URL of the remote service.
    pub base_url: String,
    /// Name of the environment variable holding the bearer token or API key;
    /// the value itself is never stored in the config file.
    pub api_key_env: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size accepted, in bytes.
    pub max_response_bytes: usize,
    /// Allow cleartext `http://` base URLs (disabled by default).
    pub allow_http: bool,
    /// Optional host allowlist; when set, only listed hosts are permitted.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// Allow requests to private/link-local/loopback addresses.
    pub allow_private_networks: bool,
    /// User agent string sent with outbound requests.
    pub user_agent: String,
}

impl Default for HttpEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: String::new(),
            timeout_ms: 10_000,
            max_response_bytes: 2 * 1024 * 1024,
            allow_http: false,
            allowed_hosts: None,
            allow_private_networks: false,
            user_agent: "triage-pipeline/0.1".to_string(),
        }
    }
}

impl HttpEndpointConfig {
    /// Validates that timeout and size limits are non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `timeout_ms` or
    /// `max_response_bytes` is zero.
    pub fn validate(&self, field_prefix: &str) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(format!("{field_prefix}.timeout_ms must be at least 1")));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(format!(
                "{field_prefix}.max_response_bytes must be at least 1"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Per-Collaborator Config
// ============================================================================

/// Log-backend connection settings (component §6 `fetch_logs`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogBackendConfig {
    /// Shared HTTP endpoint settings.
    #[serde(flatten)]
    pub http: HttpEndpointConfig,
}

impl LogBackendConfig {
    /// Validates the nested HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an invalid timeout or size limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate("providers.log_backend")
    }
}

/// Issue-tracker connection settings (component §6 `search`/`create`/etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueTrackerConfig {
    /// Shared HTTP endpoint settings.
    #[serde(flatten)]
    pub http: HttpEndpointConfig,
    /// Project or repository key new issues are created under.
    pub project: String,
}

impl Default for IssueTrackerConfig {
    fn default() -> Self {
        Self { http: HttpEndpointConfig::default(), project: String::new() }
    }
}

impl IssueTrackerConfig {
    /// Validates the nested HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an invalid timeout or size limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate("providers.issue_tracker")
    }
}

/// LLM connection settings (component §6 `complete`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Shared HTTP endpoint settings.
    #[serde(flatten)]
    pub http: HttpEndpointConfig,
    /// Model identifier to request.
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { http: HttpEndpointConfig::default(), model: String::new() }
    }
}

impl LlmConfig {
    /// Validates the nested HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an invalid timeout or size limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate("providers.llm")
    }
}

/// Which [`triage_core::FingerprintStore`] implementation the CLI constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintStoreBackendKind {
    /// Single-JSON-document, write-temp-then-rename file store (spec §6 layout).
    #[default]
    JsonFile,
    /// `SQLite`/WAL-mode store for concurrent-writer durability.
    Sqlite,
}

/// Distributed key/value cache transport settings, used only when
/// `cache.backend` selects (or downgrades through) the `distributed` backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedCacheConfig {
    /// Whether a transport is configured at all; when false, `triage-cli`
    /// never constructs one and a `distributed` cache preference downgrades
    /// to `file` immediately, per the cache layer's fallback policy.
    pub enabled: bool,
    /// Shared HTTP endpoint settings.
    #[serde(flatten)]
    pub http: HttpEndpointConfig,
}

impl Default for DistributedCacheConfig {
    fn default() -> Self {
        Self { enabled: false, http: HttpEndpointConfig::default() }
    }
}

impl DistributedCacheConfig {
    /// Validates the nested HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an invalid timeout or size limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate("providers.distributed_cache")
    }
}

/// Persistent fingerprint store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintStoreConfig {
    /// Which backend implementation to construct.
    pub backend: FingerprintStoreBackendKind,
    /// `SQLite` busy-timeout, in milliseconds, used only by the `sqlite` backend.
    pub sqlite_busy_timeout_ms: u64,
}

impl Default for FingerprintStoreConfig {
    fn default() -> Self {
        Self { backend: FingerprintStoreBackendKind::JsonFile, sqlite_busy_timeout_ms: 5_000 }
    }
}

impl FingerprintStoreConfig {
    /// Validates the `SQLite` busy timeout is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `sqlite_busy_timeout_ms` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sqlite_busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "providers.fingerprint_store.sqlite_busy_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Root Providers Config
// ============================================================================

/// Connection settings for every external collaborator (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Log backend settings.
    pub log_backend: LogBackendConfig,
    /// Issue tracker settings.
    pub issue_tracker: IssueTrackerConfig,
    /// LLM settings.
    pub llm: LlmConfig,
    /// Persistent fingerprint store settings.
    pub fingerprint_store: FingerprintStoreConfig,
    /// Distributed cache transport settings.
    pub distributed_cache: DistributedCacheConfig,
}

impl ProvidersConfig {
    /// Validates every nested collaborator config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] from the first nested config that
    /// fails its own validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_backend.validate()?;
        self.issue_tracker.validate()?;
        self.llm.validate()?;
        self.fingerprint_store.validate()?;
        self.distributed_cache.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ProvidersConfig;

    #[test]
    fn defaults_validate() {
        ProvidersConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = ProvidersConfig::default();
        config.llm.http.timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
