// triage-cache/src/distributed.rs
// ============================================================================
// Module: Distributed Cache Backend
// Description: Adapts an injected distributed KV transport to the Cache contract.
// Purpose: Allow a shared, native-TTL KV store to back the cache when configured.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The distributed backend does not hard-code a wire protocol: it adapts any
//! [`DistributedKvClient`] implementation (provided by `triage-providers` for
//! a concrete deployment) to the [`Cache`] contract. `set` is treated as
//! fire-and-forget-safe (the underlying client's own idempotent retries, if
//! any, are its concern); `get` tolerates transient errors by returning
//! absent rather than propagating, per the cache layer's parity contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::Value;
use triage_core::CacheStats;

use crate::Cache;
use crate::CacheError;

// ============================================================================
// SECTION: Transport Contract
// ============================================================================

/// Minimal contract a distributed KV transport must satisfy to back the
/// cache layer. Native TTL support is assumed; the adapter does not
/// re-implement expiry.
pub trait DistributedKvClient {
    /// Reads `key`, returning `Ok(None)` both for a true miss and for a
    /// transient transport failure — the distributed backend is explicitly
    /// tolerant of transient errors on read.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] only for non-transient configuration errors.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Writes `key` with the given TTL. Implementations should make this
    /// idempotent; the adapter does not retry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on failure; callers may choose to ignore it
    /// per the fire-and-forget-safe contract.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Deletes `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on failure.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Clears every key this cache namespace owns.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on failure.
    fn clear(&self) -> Result<(), CacheError>;
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Adapts a [`DistributedKvClient`] to the [`Cache`] contract.
pub struct DistributedCache<C> {
    /// The wrapped transport.
    client: C,
    /// Cumulative hit count, process-local (the remote store owns the data).
    hits: AtomicU64,
    /// Cumulative miss count, process-local.
    misses: AtomicU64,
}

impl<C> DistributedCache<C> {
    /// Wraps `client` as a [`Cache`].
    pub const fn new(client: C) -> Self {
        Self { client, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }
}

impl<C: DistributedKvClient> Cache for DistributedCache<C> {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let result = self.client.get(key).unwrap_or(None);
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(result)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let _ = self.client.set(key, value, ttl);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _ = self.client.delete(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.client.clear()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            size: 0,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
