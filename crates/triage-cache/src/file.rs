// triage-cache/src/file.rs
// ============================================================================
// Module: File Cache Backend
// Description: One-file-per-key on-disk cache with atomic writes.
// Purpose: Survive process restarts without an external dependency.
// Dependencies: serde_json, sha1, time
// ============================================================================

//! ## Overview
//! Each key is hashed to a filename under a configured directory. Writes go
//! through write-temp-then-rename so a crash mid-write never corrupts an
//! existing entry. Reads check an embedded expiry and delete the file lazily
//! if it has passed. `set` opportunistically sweeps a small number of other
//! entries for expiry so a cache that is never read does not grow forever.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha1::Digest;
use sha1::Sha1;
use time::OffsetDateTime;
use triage_core::CacheStats;

use crate::Cache;
use crate::CacheError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of other entries opportunistically swept for expiry on each `set`.
const SWEEP_SAMPLE_SIZE: usize = 8;

// ============================================================================
// SECTION: On-disk Format
// ============================================================================

/// On-disk representation of a single cache entry.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    /// The cached JSON value.
    value: Value,
    /// Absolute expiry instant, RFC-3339 encoded.
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// One-file-per-key on-disk cache backend.
pub struct FileCache {
    /// Directory holding one file per cache key.
    directory: PathBuf,
    /// Cumulative hit count, process-local.
    hits: AtomicU64,
    /// Cumulative miss count, process-local.
    misses: AtomicU64,
    /// Guards filesystem sweeps so concurrent writers don't race on the
    /// same directory listing.
    sweep_lock: Mutex<()>,
}

impl FileCache {
    /// Opens a file cache rooted at `directory`, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|err| CacheError::Io(err.to_string()))?;
        Ok(Self {
            directory,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sweep_lock: Mutex::new(()),
        })
    }

    /// Maps a cache key to its on-disk filename via a SHA-1 hex digest.
    fn path_for_key(&self, key: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        self.directory.join(format!("{hex}.json"))
    }

    /// Writes `entry` to `path` via write-temp-then-rename.
    fn write_atomic(path: &Path, entry: &StoredEntry) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(entry).map_err(|err| CacheError::Serialize(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes).map_err(|err| CacheError::Io(err.to_string()))?;
        fs::rename(&tmp_path, path).map_err(|err| CacheError::Io(err.to_string()))
    }

    /// Reads and parses the entry at `path`, deleting it if expired or corrupt.
    fn read_entry(path: &Path) -> Result<Option<StoredEntry>, CacheError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Io(err.to_string())),
        };
        let parsed: Result<StoredEntry, _> = serde_json::from_slice(&bytes);
        match parsed {
            Ok(entry) if entry.expires_at > OffsetDateTime::now_utc() => Ok(Some(entry)),
            Ok(_) => {
                let _ = fs::remove_file(path);
                Ok(None)
            }
            Err(_) => {
                let _ = fs::remove_file(path);
                Ok(None)
            }
        }
    }

    /// Opportunistically removes a bounded sample of expired entries.
    fn sweep_sample(&self) {
        let Ok(_guard) = self.sweep_lock.try_lock() else { return };
        let Ok(read_dir) = fs::read_dir(&self.directory) else { return };
        for entry in read_dir.flatten().take(SWEEP_SAMPLE_SIZE) {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                let _ = Self::read_entry(&path);
            }
        }
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for_key(key);
        match Self::read_entry(&path)? {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let path = self.path_for_key(key);
        let expires_at = OffsetDateTime::now_utc()
            + time::Duration::try_from(ttl).map_err(|err| CacheError::Serialize(err.to_string()))?;
        Self::write_atomic(&path, &StoredEntry { value, expires_at })?;
        self.sweep_sample();
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for_key(key);
        match fs::remove_file(path) {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        let read_dir = fs::read_dir(&self.directory).map_err(|err| CacheError::Io(err.to_string()))?;
        for entry in read_dir.flatten() {
            let _ = fs::remove_file(entry.path());
        }
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let size = fs::read_dir(&self.directory).map(Iterator::count).unwrap_or(0);
        CacheStats {
            size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::tempdir;

    use super::FileCache;
    use crate::Cache;

    #[test]
    fn set_then_get_within_ttl_returns_value() {
        let dir = tempdir().expect("tempdir");
        let cache = FileCache::open(dir.path()).expect("open");
        cache.set("k", json!({"a": 1}), Duration::from_secs(60)).expect("set succeeds");
        assert_eq!(cache.get("k").expect("get succeeds"), Some(json!({"a": 1})));
    }

    #[test]
    fn expired_entry_is_absent_and_removed() {
        let dir = tempdir().expect("tempdir");
        let cache = FileCache::open(dir.path()).expect("open");
        cache.set("k", json!(1), Duration::from_millis(0)).expect("set succeeds");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k").expect("get succeeds"), None);
        assert_eq!(cache.get("k").expect("get succeeds"), None);
    }

    #[test]
    fn delete_and_clear() {
        let dir = tempdir().expect("tempdir");
        let cache = FileCache::open(dir.path()).expect("open");
        cache.set("k", json!(1), Duration::from_secs(60)).expect("set succeeds");
        cache.delete("k").expect("delete succeeds");
        assert_eq!(cache.get("k").expect("get succeeds"), None);
        cache.set("k2", json!(2), Duration::from_secs(60)).expect("set succeeds");
        cache.clear().expect("clear succeeds");
        assert_eq!(cache.stats().size, 0);
    }
}
