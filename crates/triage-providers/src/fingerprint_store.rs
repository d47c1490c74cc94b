// triage-providers/src/fingerprint_store.rs
// ============================================================================
// Module: JSON File Fingerprint Store
// Description: Single-JSON-document persistent fingerprint store.
// Purpose: Concrete FingerprintStore implementation for component §6's
//          `<cache_dir>/fingerprints/` layout.
// Dependencies: serde_json, triage-core
// ============================================================================

//! ## Overview
//! [`JsonFileFingerprintStore`] keeps every [`FingerprintRecord`] in one
//! JSON document at `<directory>/fingerprints.json`, keyed by fingerprint
//! hex string. Updates read the whole document, mutate one entry, and
//! write it back via write-temp-then-rename so a crash mid-write never
//! leaves a torn file. A sibling `.lock` file, held for the duration of
//! each read-modify-write, gives best-effort mutual exclusion across
//! processes sharing the same directory; per spec §8, cross-process
//! exactly-once is explicitly not guaranteed, only best-effort.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use time::OffsetDateTime;
use triage_core::Fingerprint;
use triage_core::FingerprintRecord;
use triage_core::FingerprintStore;
use triage_core::IssueKey;
use triage_core::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the single JSON document under the store directory.
const DOCUMENT_FILE_NAME: &str = "fingerprints.json";

/// Name of the advisory lock file under the store directory.
const LOCK_FILE_NAME: &str = "fingerprints.lock";

/// How long to keep retrying to acquire the advisory lock before giving up.
const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between lock-acquisition retries.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// SECTION: Store
// ============================================================================

/// Single-JSON-document, write-temp-then-rename persistent fingerprint store.
pub struct JsonFileFingerprintStore {
    /// Directory holding `fingerprints.json` and `fingerprints.lock`.
    directory: PathBuf,
}

impl JsonFileFingerprintStore {
    /// Opens (creating if needed) a store rooted at `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if `directory` cannot be created.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|err| StoreError::Io(format!("failed to create store directory: {err}")))?;
        Ok(Self { directory })
    }

    /// Path of the single JSON document.
    fn document_path(&self) -> PathBuf {
        self.directory.join(DOCUMENT_FILE_NAME)
    }

    /// Path of the advisory lock file.
    fn lock_path(&self) -> PathBuf {
        self.directory.join(LOCK_FILE_NAME)
    }

    /// Reads the document, applies `mutate` to the entry for `fingerprint`,
    /// and writes the result back, all under the advisory lock.
    fn read_modify_write(
        &self,
        fingerprint: &Fingerprint,
        mutate: impl FnOnce(Option<FingerprintRecord>) -> FingerprintRecord,
    ) -> Result<(), StoreError> {
        let _guard = AdvisoryLock::acquire(&self.lock_path())?;
        let mut document = self.read_document()?;
        let existing = document.remove(fingerprint.as_str());
        let updated = mutate(existing);
        document.insert(fingerprint.as_str().to_string(), updated);
        self.write_document(&document)
    }

    /// Reads the document, treating a missing or corrupt file as empty.
    fn read_document(&self) -> Result<BTreeMap<String, FingerprintRecord>, StoreError> {
        let path = self.document_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(StoreError::Io(format!("failed to read fingerprint store: {err}"))),
        };
        serde_json::from_slice(&bytes).or(Ok(BTreeMap::new()))
    }

    /// Writes `document` via write-temp-then-rename.
    fn write_document(&self, document: &BTreeMap<String, FingerprintRecord>) -> Result<(), StoreError> {
        let path = self.document_path();
        let temp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|err| StoreError::Invalid(format!("failed to encode fingerprint store: {err}")))?;
        fs::write(&temp_path, bytes).map_err(|err| StoreError::Io(format!("failed to write fingerprint store: {err}")))?;
        fs::rename(&temp_path, &path).map_err(|err| StoreError::Io(format!("failed to commit fingerprint store: {err}")))
    }
}

impl FingerprintStore for JsonFileFingerprintStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError> {
        let _guard = AdvisoryLock::acquire(&self.lock_path())?;
        let document = self.read_document()?;
        Ok(document.get(fingerprint.as_str()).cloned())
    }

    fn record_creation(&self, fingerprint: &Fingerprint, issue_key: &IssueKey) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        self.read_modify_write(fingerprint, |existing| match existing {
            Some(mut record) => {
                record.last_seen = now;
                record.occurrences += 1;
                record.issue_key = Some(issue_key.clone());
                record
            }
            None => FingerprintRecord { first_seen: now, last_seen: now, occurrences: 1, issue_key: Some(issue_key.clone()) },
        })
    }

    fn record_dry_run(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        self.read_modify_write(fingerprint, |existing| match existing {
            Some(mut record) => {
                record.last_seen = now;
                record.occurrences += 1;
                record
            }
            None => FingerprintRecord { first_seen: now, last_seen: now, occurrences: 1, issue_key: None },
        })
    }
}

// ============================================================================
// SECTION: Advisory Lock
// ============================================================================

/// RAII guard over an exclusively-created lock file, removed on drop.
struct AdvisoryLock {
    /// Path of the held lock file.
    path: PathBuf,
}

impl AdvisoryLock {
    /// Acquires the lock at `path`, retrying until [`LOCK_ACQUIRE_TIMEOUT`]
    /// elapses.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the lock cannot be acquired in time.
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let deadline = Instant::now() + LOCK_ACQUIRE_TIMEOUT;
        loop {
            match File::options().write(true).create_new(true).open(path) {
                Ok(_file) => return Ok(Self { path: path.to_path_buf() }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Io(format!("timed out acquiring fingerprint store lock: {}", path.display())));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => return Err(StoreError::Io(format!("failed to acquire fingerprint store lock: {err}"))),
            }
        }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        let _ignored = fs::remove_file(&self.path);
    }
}
