// triage-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Fingerprint Store
// Description: Durable FingerprintStore backed by SQLite in WAL journal mode.
// Purpose: Give deployments with concurrent writers a store that does not
//          depend on an advisory file lock for mutual exclusion.
// Dependencies: rusqlite, serde_json, thiserror, triage-core
// ============================================================================

//! ## Overview
//! One table, `fingerprints`, keyed by the fingerprint's hex string, holding
//! `first_seen`/`last_seen` as RFC 3339 strings, an occurrence counter, and
//! an optional issue key. Every read and write goes through a single
//! `Mutex<Connection>`; `SQLite`'s own WAL mode and busy timeout handle
//! cross-process contention, and the in-process mutex serializes the
//! handful of statements each call issues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use triage_core::Fingerprint;
use triage_core::FingerprintRecord;
use triage_core::FingerprintStore;
use triage_core::IssueKey;
use triage_core::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version recorded in `store_meta` on first initialization.
pub const SCHEMA_VERSION: i64 = 1;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors specific to opening or initializing the `SQLite` store, before
/// they are folded into the shared [`StoreError`] surface.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// The underlying `SQLite` engine reported an error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// The store's schema version did not match [`SCHEMA_VERSION`].
    #[error("sqlite store schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version recorded in the database.
        found: i64,
        /// Version this crate expects.
        expected: i64,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`/WAL-mode backed [`FingerprintStore`] implementation.
pub struct SqliteFingerprintStore {
    /// Single shared connection, serialized by this mutex.
    connection: Mutex<Connection>,
}

impl SqliteFingerprintStore {
    /// Opens (creating if needed) a store at `path`, in WAL journal mode,
    /// with the given busy timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the database cannot be opened or its
    /// schema cannot be initialized or does not match [`SCHEMA_VERSION`].
    pub fn open(path: impl AsRef<Path>, busy_timeout_ms: u64) -> Result<Self, StoreError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let mut connection = open_connection(&path, busy_timeout_ms).map_err(StoreError::from)?;
        initialize_schema(&mut connection).map_err(StoreError::from)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Locks the connection, mapping a poisoned mutex to a store I/O error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_err| StoreError::Io("fingerprint store connection mutex poisoned".to_string()))
    }
}

impl FingerprintStore for SqliteFingerprintStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT first_seen, last_seen, occurrences, issue_key FROM fingerprints WHERE fingerprint = ?1",
                params![fingerprint.as_str()],
                |row| {
                    let first_seen: String = row.get(0)?;
                    let last_seen: String = row.get(1)?;
                    let occurrences: i64 = row.get(2)?;
                    let issue_key: Option<String> = row.get(3)?;
                    Ok((first_seen, last_seen, occurrences, issue_key))
                },
            )
            .optional()
            .map_err(|err| StoreError::Io(format!("fingerprint lookup failed: {err}")))?;
        let Some((first_seen, last_seen, occurrences, issue_key)) = row else {
            return Ok(None);
        };
        Ok(Some(to_record(&first_seen, &last_seen, occurrences, issue_key)?))
    }

    fn record_creation(&self, fingerprint: &Fingerprint, issue_key: &IssueKey) -> Result<(), StoreError> {
        upsert(&self.lock()?, fingerprint, Some(issue_key))
    }

    fn record_dry_run(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        upsert(&self.lock()?, fingerprint, None)
    }
}

/// Inserts or updates the row for `fingerprint`, bumping `occurrences` and
/// `last_seen`, and setting `issue_key` when one is given.
fn upsert(connection: &Connection, fingerprint: &Fingerprint, issue_key: Option<&IssueKey>) -> Result<(), StoreError> {
    let now = now_rfc3339()?;
    connection
        .execute(
            "INSERT INTO fingerprints (fingerprint, first_seen, last_seen, occurrences, issue_key)
             VALUES (?1, ?2, ?2, 1, ?3)
             ON CONFLICT(fingerprint) DO UPDATE SET
                 last_seen = ?2,
                 occurrences = occurrences + 1,
                 issue_key = COALESCE(?3, fingerprints.issue_key)",
            params![fingerprint.as_str(), now, issue_key.map(IssueKey::as_str)],
        )
        .map_err(|err| StoreError::Io(format!("fingerprint upsert failed: {err}")))?;
    Ok(())
}

/// Formats the current instant as RFC 3339.
fn now_rfc3339() -> Result<String, StoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| StoreError::Io(format!("failed to format timestamp: {err}")))
}

/// Converts stored row columns into a [`FingerprintRecord`].
fn to_record(first_seen: &str, last_seen: &str, occurrences: i64, issue_key: Option<String>) -> Result<FingerprintRecord, StoreError> {
    let first_seen = OffsetDateTime::parse(first_seen, &Rfc3339)
        .map_err(|err| StoreError::Corrupt(format!("invalid first_seen timestamp: {err}")))?;
    let last_seen = OffsetDateTime::parse(last_seen, &Rfc3339)
        .map_err(|err| StoreError::Corrupt(format!("invalid last_seen timestamp: {err}")))?;
    let occurrences = u64::try_from(occurrences).map_err(|_err| StoreError::Corrupt("negative occurrence count".to_string()))?;
    Ok(FingerprintRecord { first_seen, last_seen, occurrences, issue_key: issue_key.map(IssueKey::new) })
}

/// Opens an `SQLite` connection in WAL journal mode with the given busy timeout.
fn open_connection(path: &Path, busy_timeout_ms: u64) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection.execute_batch("PRAGMA journal_mode = wal; PRAGMA synchronous = normal;").map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Creates the schema on first use, or validates the recorded version on
/// subsequent opens.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS fingerprints (
                    fingerprint TEXT PRIMARY KEY,
                    first_seen TEXT NOT NULL,
                    last_seen TEXT NOT NULL,
                    occurrences INTEGER NOT NULL,
                    issue_key TEXT
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(found) if found != SCHEMA_VERSION => {
            return Err(SqliteStoreError::VersionMismatch { found, expected: SCHEMA_VERSION });
        }
        Some(_matching) => {}
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}

#[cfg(test)]
mod tests {
    use triage_core::Fingerprint;
    use triage_core::FingerprintStore;
    use triage_core::IssueKey;

    use super::SqliteFingerprintStore;

    #[test]
    fn lookup_on_empty_store_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteFingerprintStore::open(dir.path().join("fingerprints.db"), 5_000).expect("open store");
        let fingerprint = Fingerprint::new("abc123def456");
        assert!(store.lookup(&fingerprint).expect("lookup").is_none());
    }

    #[test]
    fn record_creation_then_lookup_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteFingerprintStore::open(dir.path().join("fingerprints.db"), 5_000).expect("open store");
        let fingerprint = Fingerprint::new("abc123def456");
        let issue_key = IssueKey::new("T-100");
        store.record_creation(&fingerprint, &issue_key).expect("record creation");

        let record = store.lookup(&fingerprint).expect("lookup").expect("record present");
        assert_eq!(record.occurrences, 1);
        assert_eq!(record.issue_key, Some(issue_key));
    }

    #[test]
    fn record_dry_run_then_record_creation_preserves_occurrence_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteFingerprintStore::open(dir.path().join("fingerprints.db"), 5_000).expect("open store");
        let fingerprint = Fingerprint::new("abc123def456");
        store.record_dry_run(&fingerprint).expect("dry run");
        let issue_key = IssueKey::new("T-200");
        store.record_creation(&fingerprint, &issue_key).expect("creation");

        let record = store.lookup(&fingerprint).expect("lookup").expect("record present");
        assert_eq!(record.occurrences, 2);
        assert_eq!(record.issue_key, Some(issue_key));
    }

    #[test]
    fn reopening_existing_store_validates_schema_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fingerprints.db");
        {
            let store = SqliteFingerprintStore::open(&path, 5_000).expect("open store");
            let fingerprint = Fingerprint::new("abc123def456");
            store.record_dry_run(&fingerprint).expect("dry run");
        }
        let reopened = SqliteFingerprintStore::open(&path, 5_000).expect("reopen store");
        let fingerprint = Fingerprint::new("abc123def456");
        let record = reopened.lookup(&fingerprint).expect("lookup").expect("record present");
        assert_eq!(record.occurrences, 1);
    }
}
