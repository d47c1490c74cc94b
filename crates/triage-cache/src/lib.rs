// triage-cache/src/lib.rs
// ============================================================================
// Crate: triage-cache
// Description: Unified key/value cache with three interchangeable backends.
// ============================================================================

//! ## Overview
//! Component B. A single [`Cache`] contract with three backends (in-process
//! LRU memory, one-file-per-key on disk, and a pluggable distributed KV), and
//! a [`CacheManager`] that downgrades through the fallback order
//! `{distributed -> file -> memory}` if the configured backend fails to
//! initialize.

pub mod distributed;
pub mod file;
pub mod manager;
pub mod memory;

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use triage_core::CacheStats;

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend's underlying I/O failed.
    #[error("cache io error: {0}")]
    Io(String),
    /// The value could not be serialized or deserialized.
    #[error("cache serialization error: {0}")]
    Serialize(String),
    /// The backend's internal lock was poisoned by a panicking holder.
    #[error("cache mutex poisoned")]
    Poisoned,
    /// A transient failure the caller should treat as a miss, not an abort.
    #[error("cache transient error: {0}")]
    Transient(String),
}

/// Unified key/value cache contract shared by every backend.
///
/// Keys are opaque strings; values are arbitrary serializable JSON. Callers
/// are expected to namespace keys themselves (e.g. `fingerprint:<hex>`,
/// `similarity:<title>|<error_type>|<logger>`).
pub trait Cache {
    /// Reads `key`. An entry past its expiry is treated as absent and
    /// removed lazily; this is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on genuine backend failure, not on miss.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Writes `key` with `ttl` remaining lifetime from now.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on backend failure.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`, if present. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on backend failure.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on backend failure.
    fn clear(&self) -> Result<(), CacheError>;

    /// Returns current size/hit/miss statistics.
    fn stats(&self) -> CacheStats;
}

pub use distributed::DistributedCache;
pub use distributed::DistributedKvClient;
pub use file::FileCache;
pub use manager::CacheBackendKind;
pub use manager::CacheManager;
pub use manager::CacheManagerConfig;
pub use memory::MemoryCache;
