// triage-cache/src/manager.rs
// ============================================================================
// Module: Cache Manager
// Description: Selects and owns the configured cache backend, downgrading on
//              initialization failure.
// Purpose: Give the pipeline one cache handle regardless of configuration.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! If the configured backend fails to initialize, the manager downgrades to
//! the next backend in the fixed order `{distributed -> file -> memory}` and
//! records a warning. Once downgraded it does not attempt to recover
//! mid-run; a fresh [`CacheManager`] must be constructed to retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use triage_core::CacheStats;

use crate::Cache;
use crate::CacheError;
use crate::distributed::DistributedCache;
use crate::distributed::DistributedKvClient;
use crate::file::FileCache;
use crate::memory::MemoryCache;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Which cache backend to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    /// Bounded in-process LRU.
    #[default]
    Memory,
    /// One-file-per-key on disk.
    File,
    /// Externally hosted, native-TTL key/value store.
    Distributed,
}

/// Configuration accepted by [`CacheManager::new`].
#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    /// Preferred backend; the manager downgrades from here if needed.
    pub preferred: CacheBackendKind,
    /// Directory for the file backend.
    pub file_directory: PathBuf,
    /// Capacity for the memory backend.
    pub memory_capacity: usize,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Owns the active cache backend, having resolved any configured fallback.
pub struct CacheManager {
    /// The backend actually in use, after any downgrade.
    active: Box<dyn Cache + Send + Sync>,
    /// The backend kind actually in use.
    active_backend: CacheBackendKind,
    /// Warnings emitted while resolving the backend (e.g. downgrades).
    warnings: Vec<String>,
}

impl CacheManager {
    /// Resolves the configured backend, downgrading through
    /// `{distributed -> file -> memory}` on initialization failure.
    ///
    /// `distributed_client` supplies the transport for the distributed
    /// backend; passing `None` while `preferred` requests `Distributed` is
    /// itself treated as an initialization failure and triggers downgrade.
    pub fn new(
        config: &CacheManagerConfig,
        distributed_client: Option<Arc<dyn DistributedKvClient + Send + Sync>>,
    ) -> Self {
        let mut warnings = Vec::new();
        if config.preferred == CacheBackendKind::Distributed {
            if let Some(client) = distributed_client {
                return Self {
                    active: Box::new(ArcDistributed::new(client)),
                    active_backend: CacheBackendKind::Distributed,
                    warnings,
                };
            }
            warnings.push(
                "distributed cache backend requested but no client configured; downgrading to \
                 file backend"
                    .to_string(),
            );
        }
        if matches!(config.preferred, CacheBackendKind::Distributed | CacheBackendKind::File) {
            match FileCache::open(&config.file_directory) {
                Ok(file_cache) => {
                    return Self {
                        active: Box::new(file_cache),
                        active_backend: CacheBackendKind::File,
                        warnings,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "file cache backend failed to initialize ({err}); downgrading to memory \
                         backend"
                    ));
                }
            }
        }
        Self {
            active: Box::new(MemoryCache::new(config.memory_capacity)),
            active_backend: CacheBackendKind::Memory,
            warnings,
        }
    }

    /// Returns the backend actually in use after resolving any downgrade.
    #[must_use]
    pub const fn active_backend(&self) -> CacheBackendKind {
        self.active_backend
    }

    /// Returns warnings emitted while resolving the backend.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl Cache for CacheManager {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.active.get(key)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.active.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.active.delete(key)
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.active.clear()
    }

    fn stats(&self) -> CacheStats {
        self.active.stats()
    }
}

/// Adapts an `Arc<dyn DistributedKvClient>` directly, wrapping it in a
/// [`DistributedCache`] so hit/miss statistics accumulate across calls
/// rather than resetting on every method invocation.
struct ArcDistributed {
    /// The shared transport, wrapped once so statistics persist.
    inner: DistributedCache<Arc<dyn DistributedKvClient + Send + Sync>>,
}

impl ArcDistributed {
    /// Wraps `client` for use as a [`Cache`] implementation.
    fn new(client: Arc<dyn DistributedKvClient + Send + Sync>) -> Self {
        Self { inner: DistributedCache::new(client) }
    }
}

impl Cache for ArcDistributed {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key)
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear()
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl DistributedKvClient for Arc<dyn DistributedKvClient + Send + Sync> {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.as_ref().set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.as_ref().delete(key)
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.as_ref().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::CacheBackendKind;
    use super::CacheManager;
    use super::CacheManagerConfig;

    #[test]
    fn downgrades_from_distributed_without_client_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CacheManagerConfig {
            preferred: CacheBackendKind::Distributed,
            file_directory: dir.path().to_path_buf(),
            memory_capacity: 10,
        };
        let manager = CacheManager::new(&config, None);
        assert_eq!(manager.active_backend(), CacheBackendKind::File);
        assert_eq!(manager.warnings().len(), 1);
    }

    #[test]
    fn memory_backend_used_directly_when_preferred() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CacheManagerConfig {
            preferred: CacheBackendKind::Memory,
            file_directory: dir.path().to_path_buf(),
            memory_capacity: 10,
        };
        let manager = CacheManager::new(&config, None);
        assert_eq!(manager.active_backend(), CacheBackendKind::Memory);
        assert!(manager.warnings().is_empty());
    }
}
