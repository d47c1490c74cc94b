// triage-core/src/core/model.rs
// ============================================================================
// Module: Triage Data Model
// Description: Core structures shared across the dedup, analysis, and ticket subsystems.
// Purpose: Give every component a single, stable vocabulary of value types.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! This module defines the data model described by the triage pipeline:
//! log records, classifications, ticket payloads, dedup results, cache
//! entries, run state, persisted fingerprint records, and audit records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::EnvironmentName;
use crate::core::identifiers::ErrorType;
use crate::core::identifiers::Fingerprint;
use crate::core::identifiers::IssueKey;
use crate::core::identifiers::Loghash;
use crate::core::identifiers::ServiceName;
use crate::core::identifiers::StrategyName;

// ============================================================================
// SECTION: Log Record
// ============================================================================

/// Immutable input log fetched from the log-aggregation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Logger name that emitted the record.
    pub logger: String,
    /// Thread or process identifier the record was emitted from.
    pub thread: String,
    /// Raw, unredacted log message.
    pub message: String,
    /// Optional structured detail (stack trace, extra fields) as free text.
    pub detail: Option<String>,
    /// When the log was originally emitted.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Service the log originates from.
    pub service: ServiceName,
    /// Deployment environment the log originates from.
    pub environment: EnvironmentName,
    /// Number of occurrences of this log observed within the fetch window.
    pub occurrence_count: u64,
}

/// Bounded, paginated query against the log backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    /// Service to restrict the query to.
    pub service: ServiceName,
    /// Environment to restrict the query to.
    pub environment: EnvironmentName,
    /// Lookback window in hours.
    pub window_hours: u32,
    /// Maximum number of log records to return.
    pub limit: u32,
    /// Opaque, backend-specific extra filters.
    #[serde(default)]
    pub extra_filters: Vec<(String, String)>,
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Severity assigned to a classified log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Low-impact issue.
    Low,
    /// Moderate-impact issue.
    Medium,
    /// High-impact issue requiring prompt attention.
    High,
}

impl Severity {
    /// Escalates severity by one level, capped at [`Severity::High`].
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }

    /// Returns the tracker label form, e.g. `severity-high`.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Low => "severity-low",
            Self::Medium => "severity-medium",
            Self::High => "severity-high",
        }
    }

    /// Maps severity to a tracker priority string.
    #[must_use]
    pub const fn as_priority(self) -> &'static str {
        match self {
            Self::Low => "P3",
            Self::Medium => "P2",
            Self::High => "P1",
        }
    }
}

/// Where a classification originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Produced by a successful LLM call.
    Llm,
    /// Produced by the deterministic fallback analyzer.
    Fallback,
}

/// Structured classification of a log, from the LLM or the fallback analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Kebab-case error type tag.
    pub error_type: ErrorType,
    /// Whether a ticket should be created for this log at all.
    pub create_ticket: bool,
    /// Short, action-oriented ticket title (already cleaned, ≤120 chars).
    pub ticket_title: String,
    /// Markdown ticket description with Problem/Causes/Actions sections.
    pub ticket_description: String,
    /// Assigned severity.
    pub severity: Severity,
    /// Confidence in `[0, 1]`, primarily meaningful for fallback output.
    pub confidence: f64,
    /// Where this classification came from.
    pub source: ClassificationSource,
}

// ============================================================================
// SECTION: Ticket Payload
// ============================================================================

/// Immutable, fully built record ready to be submitted to the issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPayload {
    /// Cleaned ticket title.
    pub title: String,
    /// Enriched markdown description.
    pub description: String,
    /// Full label set to attach to the created issue.
    pub labels: BTreeSet<String>,
    /// Tracker priority string derived from severity.
    pub priority: &'static str,
}

// ============================================================================
// SECTION: Dedup Result
// ============================================================================

/// Outcome of running a log through the dedup cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DedupResult {
    /// No existing equivalent found; the log is new.
    Unique,
    /// An equivalent fingerprint was already seen earlier in this run.
    DuplicateInRun,
    /// An equivalent fingerprint exists in local or persistent storage.
    DuplicateByFingerprint {
        /// Whether the match came from the local or the persistent store.
        source: FingerprintSource,
    },
    /// An existing issue already carries this log's loghash label.
    DuplicateByLoghashLabel {
        /// Key of the matching issue.
        issue_key: IssueKey,
    },
    /// An existing issue with a matching error-type label scored above threshold.
    DuplicateByErrorTypeLabel {
        /// Key of the matching issue.
        issue_key: IssueKey,
        /// Similarity score that triggered the match.
        score: f64,
    },
    /// A broader similarity search scored above threshold.
    DuplicateBySimilarity {
        /// Key of the matching issue.
        issue_key: IssueKey,
        /// Similarity score that triggered the match.
        score: f64,
    },
}

impl DedupResult {
    /// Returns the stable strategy name associated with this result, if any.
    #[must_use]
    pub const fn strategy_name(&self) -> Option<StrategyName> {
        match self {
            Self::Unique => None,
            Self::DuplicateInRun => Some(StrategyName::InMemorySeenLogs),
            Self::DuplicateByFingerprint { .. } => Some(StrategyName::FingerprintCache),
            Self::DuplicateByLoghashLabel { .. } => Some(StrategyName::LoghashLabelSearch),
            Self::DuplicateByErrorTypeLabel { .. } => Some(StrategyName::ErrorTypeLabelSearch),
            Self::DuplicateBySimilarity { .. } => Some(StrategyName::SimilaritySearch),
        }
    }

    /// Returns the matching issue key, if this result names one.
    #[must_use]
    pub const fn issue_key(&self) -> Option<&IssueKey> {
        match self {
            Self::DuplicateByLoghashLabel { issue_key }
            | Self::DuplicateByErrorTypeLabel { issue_key, .. }
            | Self::DuplicateBySimilarity { issue_key, .. } => Some(issue_key),
            Self::Unique | Self::DuplicateInRun | Self::DuplicateByFingerprint { .. } => None,
        }
    }

    /// Returns true if this result is anything other than [`DedupResult::Unique`].
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        !matches!(self, Self::Unique)
    }
}

/// Where a fingerprint match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintSource {
    /// Found in the in-process run state.
    Local,
    /// Found in the on-disk or SQL persistent fingerprint store.
    Persistent,
}

// ============================================================================
// SECTION: Issue Tracker Surface
// ============================================================================

/// Tracker issue as returned by a search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker key, e.g. `T-100`.
    pub key: IssueKey,
    /// Current issue title.
    pub title: String,
    /// Current issue description.
    pub description: String,
    /// Labels currently attached to the issue.
    pub labels: BTreeSet<String>,
    /// Current issue status (open, closed, etc).
    pub status: String,
}

/// Query against the issue tracker's search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSearchQuery {
    /// Exact label filters (all must match).
    pub labels: Vec<String>,
    /// Free-text tokens to match against title/description.
    pub tokens: Vec<String>,
    /// Maximum number of results to return.
    pub max_results: u32,
    /// Lookback window in days.
    pub window_days: u32,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// A cached value plus its absolute expiry and insertion-order rank.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Absolute instant after which the entry is considered absent.
    pub expires_at: OffsetDateTime,
    /// Monotonically increasing insertion rank, used for LRU eviction.
    pub insertion_rank: u64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries currently live.
    pub size: usize,
    /// Cumulative hit count.
    pub hits: u64,
    /// Cumulative miss count.
    pub misses: u64,
}

impl CacheStats {
    /// Returns the hit rate in `[0, 1]`, or 0 when there have been no lookups.
    #[must_use]
    pub fn hit_rate(self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { (self.hits as f64) / (total as f64) }
    }
}

// ============================================================================
// SECTION: Run State
// ============================================================================

/// Per-process mutable aggregate tracked across a single pipeline run.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Number of tickets created so far this run.
    pub tickets_created_count: u64,
    /// Hard cap on tickets created this run.
    pub max_tickets_per_run: u64,
    /// Fingerprints for which a ticket was created or simulated this run.
    pub created_fingerprints: BTreeSet<Fingerprint>,
    /// Loghashes of every normalized message seen so far this run,
    /// independent of classification; backs the pre-analysis in-run check
    /// (component D1), which runs before an `error_type` is known and so
    /// cannot yet compute a real [`Fingerprint`].
    pub seen_loghashes: BTreeSet<Loghash>,
    /// Last comment timestamp per fingerprint, for cooldown enforcement.
    pub comment_timestamps: std::collections::BTreeMap<Fingerprint, OffsetDateTime>,
    /// Running pipeline statistics.
    pub statistics: RunStatistics,
}

impl RunState {
    /// Creates a fresh run state with the given per-run ticket cap.
    #[must_use]
    pub fn new(max_tickets_per_run: u64) -> Self {
        Self {
            tickets_created_count: 0,
            max_tickets_per_run,
            created_fingerprints: BTreeSet::new(),
            seen_loghashes: BTreeSet::new(),
            comment_timestamps: std::collections::BTreeMap::new(),
            statistics: RunStatistics::default(),
        }
    }

    /// Returns true if the per-run cap has been reached.
    #[must_use]
    pub const fn cap_reached(&self) -> bool {
        self.tickets_created_count >= self.max_tickets_per_run
    }
}

/// Snapshot of pipeline-wide counters, emitted in the final run summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Logs fetched from the backend.
    pub logs_fetched: u64,
    /// Logs eliminated by the in-run seen-set.
    pub in_run_duplicates: u64,
    /// Logs eliminated by the persistent fingerprint store.
    pub persistent_duplicates: u64,
    /// Logs eliminated by loghash label search.
    pub loghash_matches: u64,
    /// Logs eliminated by error-type label search.
    pub errortype_matches: u64,
    /// Logs eliminated by the broad similarity search.
    pub similarity_matches: u64,
    /// Tickets created.
    pub tickets_created: u64,
    /// Comments added to existing issues.
    pub comments_added: u64,
    /// Logs skipped because the per-run cap was reached.
    pub caps_hit: u64,
    /// Logs that ended in an error outcome.
    pub errors: u64,
}

// ============================================================================
// SECTION: Persistent Fingerprint Store
// ============================================================================

/// Persisted state for a single fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// When this fingerprint was first observed.
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
    /// When this fingerprint was most recently observed.
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    /// Number of times this fingerprint has been observed.
    pub occurrences: u64,
    /// Tracker issue key, once a ticket has been created for this fingerprint.
    pub issue_key: Option<IssueKey>,
}

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Terminal action recorded for a single log's processing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A new ticket was created.
    Create,
    /// A comment was added to an existing ticket.
    Comment,
    /// The log was skipped (not actionable, duplicate, or timed out).
    Skip,
    /// A ticket creation was simulated (dry-run).
    Simulate,
    /// The per-run ticket cap was hit.
    Cap,
    /// The log's processing ended in an error.
    Error,
}

/// One structured line per log's terminal outcome; the pipeline's sole
/// logging surface, appended to `<cache_dir>/audit_logs.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When this record was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Service the originating log came from.
    pub service: ServiceName,
    /// Environment the originating log came from.
    pub environment: EnvironmentName,
    /// Fingerprint of the originating log.
    pub fingerprint: Fingerprint,
    /// Terminal action taken.
    pub action: AuditAction,
    /// Name of the dedup strategy that matched, if any.
    pub strategy_name: Option<StrategyName>,
    /// Tracker issue key involved, if any.
    pub issue_key: Option<IssueKey>,
    /// Severity assigned to the log, if classified.
    pub severity: Option<Severity>,
    /// Error type assigned to the log, if classified.
    pub error_type: Option<ErrorType>,
    /// Wall-clock duration of this log's processing, in milliseconds.
    pub duration_ms: u64,
    /// Human-readable reason, populated for `skip`/`error` actions.
    pub reason: Option<String>,
}

/// Tracker label computed from a loghash, re-exported here for convenience.
#[must_use]
pub fn loghash_label(loghash: &Loghash) -> String {
    loghash.as_label()
}
