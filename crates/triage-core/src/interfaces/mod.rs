// triage-core/src/interfaces/mod.rs
// ============================================================================
// Module: External Interfaces
// Description: Consumer-contract traits for the log backend, issue tracker,
//              LLM client, and persistent fingerprint store.
// Purpose: Let the pipeline depend on behavior, not concrete transports.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every external collaborator the pipeline depends on is expressed as a
//! trait here. Concrete implementations (HTTP-backed, SQLite-backed,
//! in-memory fakes for tests) live in other crates and are injected at
//! construction; nothing in this crate or its dependents reaches for a
//! concrete transport directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::identifiers::Fingerprint;
use crate::core::identifiers::IssueKey;
use crate::core::model::FingerprintRecord;
use crate::core::model::Issue;
use crate::core::model::IssueSearchQuery;
use crate::core::model::LogQuery;
use crate::core::model::LogRecord;
use crate::core::model::TicketPayload;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by an external provider (log backend, tracker, or LLM).
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    /// The call failed transiently; callers may treat this as an empty
    /// result with a warning rather than aborting, per the error-handling
    /// policy for tracker searches and LLM calls.
    #[error("provider transient error: {0}")]
    Transient(String),
    /// The call failed in a way that should not be retried this run.
    #[error("provider error: {0}")]
    Permanent(String),
    /// The response could not be parsed or validated against its schema.
    #[error("provider returned malformed response: {0}")]
    MalformedResponse(String),
    /// The call was rejected before being sent, e.g. by SSRF hardening.
    #[error("provider request rejected: {0}")]
    RequestRejected(String),
    /// The call was cancelled by the caller; never counted as a failure.
    #[error("provider call cancelled")]
    Cancelled,
}

/// Errors raised by a persistent fingerprint store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store's underlying I/O failed.
    #[error("fingerprint store io error: {0}")]
    Io(String),
    /// The store's contents were corrupt and have been treated as empty.
    #[error("fingerprint store corrupt: {0}")]
    Corrupt(String),
    /// The store rejected the write (e.g. record too large).
    #[error("fingerprint store invalid write: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Log Backend
// ============================================================================

/// Supplies bounded, paginated error logs.
///
/// The implementation is opaque; the pipeline only depends on the
/// [`LogRecord`] fields it documents, never on query construction details.
pub trait LogBackend {
    /// Fetches logs matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transient or permanent backend failures.
    fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ProviderError>;
}

/// Type-erased, cheaply cloneable handle to a [`LogBackend`].
#[derive(Clone)]
pub struct SharedLogBackend {
    /// The wrapped backend.
    inner: Arc<dyn LogBackend + Send + Sync>,
}

impl SharedLogBackend {
    /// Wraps an existing log backend implementation.
    pub fn from_backend(backend: impl LogBackend + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(backend) }
    }
}

impl LogBackend for SharedLogBackend {
    fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ProviderError> {
        self.inner.fetch_logs(query)
    }
}

// ============================================================================
// SECTION: Issue Tracker
// ============================================================================

/// Consumer contract for the issue tracker.
pub trait IssueTracker {
    /// Searches for issues matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`]. Callers (dedup strategies) treat a
    /// transient error as an empty result with a warning, per policy.
    fn search(&self, query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError>;

    /// Atomically creates a new issue from `payload`, returning its key.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any failure; callers must not assume
    /// partial creation occurred.
    fn create(&self, payload: &TicketPayload) -> Result<IssueKey, ProviderError>;

    /// Adds a comment to an existing issue.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on failure.
    fn add_comment(&self, issue_key: &IssueKey, body: &str) -> Result<(), ProviderError>;

    /// Idempotently ensures `labels` are present on an existing issue.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on failure.
    fn add_labels(&self, issue_key: &IssueKey, labels: &[String]) -> Result<(), ProviderError>;
}

/// Type-erased, cheaply cloneable handle to an [`IssueTracker`].
#[derive(Clone)]
pub struct SharedIssueTracker {
    /// The wrapped tracker.
    inner: Arc<dyn IssueTracker + Send + Sync>,
}

impl SharedIssueTracker {
    /// Wraps an existing issue tracker implementation.
    pub fn from_tracker(tracker: impl IssueTracker + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(tracker) }
    }
}

impl IssueTracker for SharedIssueTracker {
    fn search(&self, query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
        self.inner.search(query)
    }

    fn create(&self, payload: &TicketPayload) -> Result<IssueKey, ProviderError> {
        self.inner.create(payload)
    }

    fn add_comment(&self, issue_key: &IssueKey, body: &str) -> Result<(), ProviderError> {
        self.inner.add_comment(issue_key, body)
    }

    fn add_labels(&self, issue_key: &IssueKey, labels: &[String]) -> Result<(), ProviderError> {
        self.inner.add_labels(issue_key, labels)
    }
}

// ============================================================================
// SECTION: LLM Client
// ============================================================================

/// Consumer contract for the LLM used by the analysis node.
pub trait LlmClient {
    /// Completes `prompt`, returning the raw JSON text of the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport failure; malformed JSON is
    /// returned as `Ok` and handled by the analysis node's own parser so
    /// that schema-violation accounting stays in one place.
    fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Type-erased, cheaply cloneable handle to an [`LlmClient`].
#[derive(Clone)]
pub struct SharedLlmClient {
    /// The wrapped client.
    inner: Arc<dyn LlmClient + Send + Sync>,
}

impl SharedLlmClient {
    /// Wraps an existing LLM client implementation.
    pub fn from_client(client: impl LlmClient + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(client) }
    }
}

impl LlmClient for SharedLlmClient {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.inner.complete(prompt)
    }
}

// ============================================================================
// SECTION: Persistent Fingerprint Store
// ============================================================================

/// Durable mapping of fingerprint to first/last-seen metadata and, once
/// created, the tracker issue key.
pub trait FingerprintStore {
    /// Looks up the record for `fingerprint`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`]. On corruption, implementations should prefer
    /// treating the store as empty (returning `Ok(None)`) over erroring, per
    /// the error-handling policy for store corruption; callers should only
    /// see [`StoreError`] for genuine I/O failures.
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError>;

    /// Records that a ticket was created for `fingerprint`, carrying `issue_key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn record_creation(&self, fingerprint: &Fingerprint, issue_key: &IssueKey) -> Result<(), StoreError>;

    /// Records that a dry-run would have created a ticket for `fingerprint`,
    /// without an associated issue key, preserving idempotence across runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn record_dry_run(&self, fingerprint: &Fingerprint) -> Result<(), StoreError>;
}

/// Type-erased, cheaply cloneable handle to a [`FingerprintStore`].
#[derive(Clone)]
pub struct SharedFingerprintStore {
    /// The wrapped store.
    inner: Arc<dyn FingerprintStore + Send + Sync>,
}

impl SharedFingerprintStore {
    /// Wraps an existing fingerprint store implementation.
    pub fn from_store(store: impl FingerprintStore + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(store) }
    }
}

impl FingerprintStore for SharedFingerprintStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError> {
        self.inner.lookup(fingerprint)
    }

    fn record_creation(&self, fingerprint: &Fingerprint, issue_key: &IssueKey) -> Result<(), StoreError> {
        self.inner.record_creation(fingerprint, issue_key)
    }

    fn record_dry_run(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.inner.record_dry_run(fingerprint)
    }
}
