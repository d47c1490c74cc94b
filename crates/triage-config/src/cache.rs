// triage-config/src/cache.rs
// ============================================================================
// Module: Cache Config
// Description: Backend selection and capacity limits for the cache layer (component B).
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use triage_cache::CacheBackendKind;

use crate::ConfigError;

/// Default in-process LRU capacity (spec §5 resource limits).
const DEFAULT_MEMORY_CAPACITY: usize = 1000;
/// Default TTL applied to similarity and general-purpose cache entries.
const DEFAULT_TTL_SECONDS: u64 = 300;
/// Upper bound accepted for `memory_capacity`, a sanity ceiling rather than a
/// hard architectural limit.
const MAX_MEMORY_CAPACITY: usize = 1_000_000;

/// Cache layer configuration (spec §4.B, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Preferred backend; the manager downgrades from here if needed.
    pub backend: CacheBackendKind,
    /// Default TTL, in seconds, for entries that do not specify their own.
    pub ttl_seconds: u64,
    /// Capacity of the in-process memory backend.
    pub memory_capacity: usize,
    /// Directory for the file backend; defaults under the configured cache dir.
    pub file_directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            file_directory: None,
        }
    }
}

impl CacheConfig {
    /// Validates capacity and TTL bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `ttl_seconds` is zero or
    /// `memory_capacity` is zero or unreasonably large.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_seconds == 0 {
            return Err(ConfigError::Invalid("cache.ttl_seconds must be at least 1".to_string()));
        }
        if self.memory_capacity == 0 || self.memory_capacity > MAX_MEMORY_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "cache.memory_capacity must be between 1 and {MAX_MEMORY_CAPACITY}, got {}",
                self.memory_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::CacheConfig;

    #[test]
    fn defaults_validate() {
        CacheConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = CacheConfig { memory_capacity: 0, ..CacheConfig::default() };
        assert!(config.validate().is_err());
    }
}
