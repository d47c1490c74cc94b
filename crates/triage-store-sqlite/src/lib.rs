// triage-store-sqlite/src/lib.rs
// ============================================================================
// Crate: triage-store-sqlite
// Description: SQLite/WAL-mode persistent fingerprint store.
// Purpose: Alternative to the JSON-file backend for higher-throughput,
//          concurrent-writer deployments (§6).
// Dependencies: rusqlite, serde_json, thiserror, triage-core
// ============================================================================

//! ## Overview
//! [`SqliteFingerprintStore`] implements `triage_core::FingerprintStore`
//! against a single `SQLite` database file in WAL journal mode. It is
//! deliberately narrow: one table, one schema version, no pagination or
//! snapshotting, since the only durable state this crate owns is a
//! fingerprint-to-record map.

#![forbid(unsafe_code)]

mod store;

pub use store::SCHEMA_VERSION;
pub use store::SqliteFingerprintStore;
pub use store::SqliteStoreError;
