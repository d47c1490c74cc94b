// triage-cache/src/memory.rs
// ============================================================================
// Module: Memory Cache Backend
// Description: Bounded in-process LRU cache with per-entry TTL.
// Purpose: Fast, zero-I/O backend; default when no other backend is configured.
// Dependencies: serde_json, time
// ============================================================================

//! ## Overview
//! A bounded LRU map guarded by a single mutex, mirroring the workspace's
//! `InMemoryRunStateStore` convention (`Arc<Mutex<...>>`, mutex-poison-safe
//! errors). On overflow, the least-recently-used entry is evicted. Expired
//! entries are treated as absent and removed lazily on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use triage_core::CacheStats;

use crate::Cache;
use crate::CacheError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of entries, per the resource-limit table.
pub const DEFAULT_CAPACITY: usize = 1000;

// ============================================================================
// SECTION: Backend
// ============================================================================

/// An entry tracked by the memory cache.
struct Entry {
    /// The cached JSON value.
    value: Value,
    /// Absolute expiry instant.
    expires_at: OffsetDateTime,
    /// Rank incremented on every access; lowest rank is evicted first.
    last_access_rank: u64,
}

/// Mutable state guarded by the backend's single mutex.
struct State {
    /// Live entries, keyed by opaque cache key.
    entries: HashMap<String, Entry>,
    /// Monotonic counter used to derive access ranks.
    next_rank: u64,
    /// Cumulative hit count.
    hits: u64,
    /// Cumulative miss count.
    misses: u64,
}

/// Bounded in-process LRU cache with per-entry TTL.
pub struct MemoryCache {
    /// Maximum number of live entries before eviction kicks in.
    capacity: usize,
    /// Guarded mutable state.
    state: Mutex<State>,
}

impl MemoryCache {
    /// Creates a new memory cache bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State { entries: HashMap::new(), next_rank: 0, hits: 0, misses: 0 }),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut state = self.state.lock().map_err(|_| CacheError::Poisoned)?;
        let now = OffsetDateTime::now_utc();
        let expired = state.entries.get(key).is_some_and(|entry| entry.expires_at <= now);
        if expired {
            state.entries.remove(key);
        }
        state.next_rank += 1;
        let rank = state.next_rank;
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access_rank = rank;
                let value = entry.value.clone();
                state.hits += 1;
                Ok(Some(value))
            }
            None => {
                state.misses += 1;
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let mut state = self.state.lock().map_err(|_| CacheError::Poisoned)?;
        let expires_at = OffsetDateTime::now_utc()
            + time::Duration::try_from(ttl).map_err(|err| CacheError::Serialize(err.to_string()))?;
        state.next_rank += 1;
        let rank = state.next_rank;
        state.entries.insert(key.to_string(), Entry { value, expires_at, last_access_rank: rank });
        evict_if_over_capacity(&mut state, self.capacity);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = self.state.lock().map_err(|_| CacheError::Poisoned)?;
        state.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().map_err(|_| CacheError::Poisoned)?;
        state.entries.clear();
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let Ok(state) = self.state.lock() else {
            return CacheStats::default();
        };
        CacheStats { size: state.entries.len(), hits: state.hits, misses: state.misses }
    }
}

/// Evicts least-recently-used entries until the map is within `capacity`.
fn evict_if_over_capacity(state: &mut State, capacity: usize) {
    while state.entries.len() > capacity {
        let Some(victim) = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access_rank)
            .map(|(key, _)| key.clone())
        else {
            break;
        };
        state.entries.remove(&victim);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::MemoryCache;
    use crate::Cache;

    #[test]
    fn set_then_get_within_ttl_returns_value() {
        let cache = MemoryCache::new(10);
        cache.set("k", json!({"a": 1}), Duration::from_secs(60)).expect("set succeeds");
        assert_eq!(cache.get("k").expect("get succeeds"), Some(json!({"a": 1})));
    }

    #[test]
    fn expired_entry_is_absent() {
        let cache = MemoryCache::new(10);
        cache.set("k", json!(1), Duration::from_millis(0)).expect("set succeeds");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k").expect("get succeeds"), None);
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        cache.set("a", json!(1), Duration::from_secs(60)).expect("set succeeds");
        cache.set("b", json!(2), Duration::from_secs(60)).expect("set succeeds");
        cache.get("a").expect("get succeeds");
        cache.set("c", json!(3), Duration::from_secs(60)).expect("set succeeds");
        assert_eq!(cache.get("b").expect("get succeeds"), None);
        assert_eq!(cache.get("a").expect("get succeeds"), Some(json!(1)));
    }

    #[test]
    fn delete_and_clear() {
        let cache = MemoryCache::new(10);
        cache.set("k", json!(1), Duration::from_secs(60)).expect("set succeeds");
        cache.delete("k").expect("delete succeeds");
        assert_eq!(cache.get("k").expect("get succeeds"), None);
        cache.set("k2", json!(2), Duration::from_secs(60)).expect("set succeeds");
        cache.clear().expect("clear succeeds");
        assert_eq!(cache.stats().size, 0);
    }
}
