// triage-dedup/src/strategies.rs
// ============================================================================
// Module: Dedup Strategies
// Description: The five ordered equivalence checks that make up the dedup
//              cascade (component D).
// Purpose: Eliminate duplicate logs as cheaply as possible, deferring the
//          costliest checks (tracker search, similarity scoring) to last.
// Dependencies: triage-cache, triage-core, triage-similarity
// ============================================================================

//! ## Overview
//! Strategy 1 ([`InMemorySeenLogs`]) runs before classification, over a
//! [`Loghash`] rather than a real [`Fingerprint`], since `error_type` is not
//! yet known. Strategies 2-5 run after classification and share
//! [`PostAnalysisInput`] (defined in [`crate::orchestrator`]). Every `check`
//! is infallible by contract: a transient failure in an underlying provider
//! or cache is caught and reported as [`DedupResult::Unique`] plus a
//! [`StrategyOutcome::warning`], never propagated, so one flaky strategy
//! cannot mask the ones that would have run after it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use triage_core::DedupResult;
use triage_core::FingerprintSource;
use triage_core::Issue;
use triage_core::IssueSearchQuery;
use triage_core::Loghash;
use triage_core::SharedFingerprintStore;
use triage_core::SharedIssueTracker;
use triage_core::SharedRunState;
use triage_core::StrategyName;
use triage_core::normalize;
use triage_similarity::CandidateIssue;
use triage_similarity::SimilarityEngine;
use triage_similarity::SimilarityInput;
use triage_similarity::tokenize;

use crate::orchestrator::PostAnalysisInput;

// ============================================================================
// SECTION: Strategy Outcome
// ============================================================================

/// Result of running one strategy: the dedup verdict, plus an optional
/// warning describing a transient failure that was swallowed rather than
/// propagated (spec §4.D's "must not mask later strategies" rule).
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    /// The dedup verdict this strategy reached.
    pub result: DedupResult,
    /// Set when a transient failure was swallowed in favor of reporting
    /// [`DedupResult::Unique`].
    pub warning: Option<String>,
}

impl StrategyOutcome {
    /// No match found; nothing went wrong.
    fn unique() -> Self {
        Self { result: DedupResult::Unique, warning: None }
    }

    /// No match found because an underlying call failed transiently.
    fn unique_with_warning(warning: impl Into<String>) -> Self {
        Self { result: DedupResult::Unique, warning: Some(warning.into()) }
    }

    /// A match was found.
    fn found(result: DedupResult) -> Self {
        Self { result, warning: None }
    }
}

// ============================================================================
// SECTION: Pre-analysis Strategy
// ============================================================================

/// Fields available before a log has been classified.
#[derive(Debug, Clone, Copy)]
pub struct PreAnalysisInput<'a> {
    /// Loghash of the current log's normalized message.
    pub loghash: &'a Loghash,
}

/// A dedup strategy that runs before classification, over [`PreAnalysisInput`].
pub trait DedupStrategy: Send + Sync {
    /// Stable name recorded in audit records and statistics.
    fn name(&self) -> StrategyName;

    /// Checks `input` against `run_state`, never propagating an error.
    fn check(&self, input: &PreAnalysisInput<'_>, run_state: &SharedRunState) -> StrategyOutcome;
}

/// Component D1: the in-run seen-loghash set. O(1), no I/O.
#[derive(Debug, Default)]
pub struct InMemorySeenLogs;

impl DedupStrategy for InMemorySeenLogs {
    fn name(&self) -> StrategyName {
        StrategyName::InMemorySeenLogs
    }

    fn check(&self, input: &PreAnalysisInput<'_>, run_state: &SharedRunState) -> StrategyOutcome {
        if run_state.check_and_mark_loghash_seen(input.loghash) {
            StrategyOutcome::found(DedupResult::DuplicateInRun)
        } else {
            StrategyOutcome::unique()
        }
    }
}

// ============================================================================
// SECTION: Post-analysis Strategies
// ============================================================================

/// A dedup strategy that runs after classification, over [`PostAnalysisInput`].
pub trait PostAnalysisStrategy: Send + Sync {
    /// Stable name recorded in audit records and statistics.
    fn name(&self) -> StrategyName;

    /// Checks `input` against `run_state`, never propagating an error.
    fn check(&self, input: &PostAnalysisInput, run_state: &SharedRunState) -> StrategyOutcome;
}

/// Component D2: the persistent fingerprint store, preceded by a local
/// in-run check over the same real fingerprint (now that `error_type` is
/// known). One local read; no tracker I/O.
pub struct FingerprintCache {
    /// Persistent fingerprint store.
    store: SharedFingerprintStore,
}

impl FingerprintCache {
    /// Builds a strategy over the given persistent store.
    #[must_use]
    pub const fn new(store: SharedFingerprintStore) -> Self {
        Self { store }
    }
}

impl PostAnalysisStrategy for FingerprintCache {
    fn name(&self) -> StrategyName {
        StrategyName::FingerprintCache
    }

    fn check(&self, input: &PostAnalysisInput, run_state: &SharedRunState) -> StrategyOutcome {
        if run_state.fingerprint_seen_locally(&input.fingerprint) {
            return StrategyOutcome::found(DedupResult::DuplicateByFingerprint {
                source: FingerprintSource::Local,
            });
        }
        match self.store.lookup(&input.fingerprint) {
            Ok(Some(_)) => StrategyOutcome::found(DedupResult::DuplicateByFingerprint {
                source: FingerprintSource::Persistent,
            }),
            Ok(None) => StrategyOutcome::unique(),
            Err(err) => {
                StrategyOutcome::unique_with_warning(format!("fingerprint_cache lookup failed: {err}"))
            }
        }
    }
}

/// Component D3: an exact tracker search on the current log's loghash label.
pub struct LoghashLabelSearch {
    /// Issue tracker to search.
    tracker: SharedIssueTracker,
    /// Lookback window in days.
    search_window_days: u32,
}

impl LoghashLabelSearch {
    /// Builds a strategy over the given tracker and search window.
    #[must_use]
    pub const fn new(tracker: SharedIssueTracker, search_window_days: u32) -> Self {
        Self { tracker, search_window_days }
    }
}

impl PostAnalysisStrategy for LoghashLabelSearch {
    fn name(&self) -> StrategyName {
        StrategyName::LoghashLabelSearch
    }

    fn check(&self, input: &PostAnalysisInput, run_state: &SharedRunState) -> StrategyOutcome {
        let _ = run_state;
        let query = IssueSearchQuery {
            labels: vec![input.loghash.as_label()],
            tokens: Vec::new(),
            max_results: 1,
            window_days: self.search_window_days,
        };
        match self.tracker.search(&query) {
            Ok(issues) => match issues.into_iter().next() {
                Some(issue) => {
                    StrategyOutcome::found(DedupResult::DuplicateByLoghashLabel { issue_key: issue.key })
                }
                None => StrategyOutcome::unique(),
            },
            Err(err) => {
                StrategyOutcome::unique_with_warning(format!("loghash_label_search failed: {err}"))
            }
        }
    }
}

/// Component D4: a tracker search on the current log's error-type label,
/// narrowed further by similarity scoring against the matching issues.
pub struct ErrorTypeLabelSearch {
    /// Issue tracker to search.
    tracker: SharedIssueTracker,
    /// Scoring engine shared with [`SimilaritySearch`].
    similarity: Arc<SimilarityEngine>,
    /// Maximum number of tracker results to request.
    search_max_results: u32,
    /// Lookback window in days.
    search_window_days: u32,
}

impl ErrorTypeLabelSearch {
    /// Builds a strategy over the given tracker, similarity engine, and limits.
    #[must_use]
    pub const fn new(
        tracker: SharedIssueTracker,
        similarity: Arc<SimilarityEngine>,
        search_max_results: u32,
        search_window_days: u32,
    ) -> Self {
        Self { tracker, similarity, search_max_results, search_window_days }
    }
}

impl PostAnalysisStrategy for ErrorTypeLabelSearch {
    fn name(&self) -> StrategyName {
        StrategyName::ErrorTypeLabelSearch
    }

    fn check(&self, input: &PostAnalysisInput, run_state: &SharedRunState) -> StrategyOutcome {
        let _ = run_state;
        let query = IssueSearchQuery {
            labels: vec![input.error_type.as_label()],
            tokens: Vec::new(),
            max_results: self.search_max_results,
            window_days: self.search_window_days,
        };
        let issues = match self.tracker.search(&query) {
            Ok(issues) => issues,
            Err(err) => {
                return StrategyOutcome::unique_with_warning(format!(
                    "error_type_label_search failed: {err}"
                ));
            }
        };
        let candidates: Vec<CandidateIssue> = issues.iter().map(to_candidate).collect();
        let similarity_input = to_similarity_input(input);
        match self.similarity.find_best(&similarity_input, &candidates) {
            Ok(Some(found)) => StrategyOutcome::found(DedupResult::DuplicateByErrorTypeLabel {
                issue_key: found.issue_key,
                score: found.score,
            }),
            Ok(None) => StrategyOutcome::unique(),
            Err(err) => StrategyOutcome::unique_with_warning(format!(
                "error_type_label_search similarity scoring failed: {err}"
            )),
        }
    }
}

/// Component D5: a broader, token-based tracker search scored by the
/// similarity engine. The most expensive strategy; runs last.
pub struct SimilaritySearch {
    /// Issue tracker to search.
    tracker: SharedIssueTracker,
    /// Scoring engine shared with [`ErrorTypeLabelSearch`].
    similarity: Arc<SimilarityEngine>,
    /// Maximum number of tracker results to request.
    search_max_results: u32,
    /// Lookback window in days.
    search_window_days: u32,
}

impl SimilaritySearch {
    /// Builds a strategy over the given tracker, similarity engine, and limits.
    #[must_use]
    pub const fn new(
        tracker: SharedIssueTracker,
        similarity: Arc<SimilarityEngine>,
        search_max_results: u32,
        search_window_days: u32,
    ) -> Self {
        Self { tracker, similarity, search_max_results, search_window_days }
    }
}

impl PostAnalysisStrategy for SimilaritySearch {
    fn name(&self) -> StrategyName {
        StrategyName::SimilaritySearch
    }

    fn check(&self, input: &PostAnalysisInput, run_state: &SharedRunState) -> StrategyOutcome {
        let _ = run_state;
        let tokens: Vec<String> = tokenize(&input.title).into_iter().collect();
        let query = IssueSearchQuery {
            labels: Vec::new(),
            tokens,
            max_results: self.search_max_results,
            window_days: self.search_window_days,
        };
        let issues = match self.tracker.search(&query) {
            Ok(issues) => issues,
            Err(err) => {
                return StrategyOutcome::unique_with_warning(format!("similarity_search failed: {err}"));
            }
        };
        let candidates: Vec<CandidateIssue> = issues.iter().map(to_candidate).collect();
        let similarity_input = to_similarity_input(input);
        match self.similarity.find_best(&similarity_input, &candidates) {
            Ok(Some(found)) => StrategyOutcome::found(DedupResult::DuplicateBySimilarity {
                issue_key: found.issue_key,
                score: found.score,
            }),
            Ok(None) => StrategyOutcome::unique(),
            Err(err) => {
                StrategyOutcome::unique_with_warning(format!("similarity_search scoring failed: {err}"))
            }
        }
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Converts a tracker [`Issue`] into a [`CandidateIssue`] for scoring,
/// deriving `error_type` and `original_log_extract` from the issue's labels
/// and description.
fn to_candidate(issue: &Issue) -> CandidateIssue {
    let error_type = issue
        .labels
        .iter()
        .find_map(|label| label.strip_prefix("error_type-"))
        .map(triage_core::ErrorType::new);
    CandidateIssue {
        key: issue.key.clone(),
        title: issue.title.clone(),
        description: issue.description.clone(),
        error_type,
        logger: None,
        original_log_extract: extract_original_log(&issue.description),
    }
}

/// Builds the similarity engine's input from a post-analysis dedup input.
fn to_similarity_input(input: &PostAnalysisInput) -> SimilarityInput {
    SimilarityInput {
        title: input.title.clone(),
        description: input.description.clone(),
        error_type: Some(input.error_type.clone()),
        logger: input.logger.clone(),
        normalized_current_log: input.normalized_current_log.clone(),
    }
}

/// Extracts the fenced original-log excerpt a ticket description carries,
/// normalizing it for comparison with the current log's normalized text.
/// Returns `None` if the description carries no fenced block.
fn extract_original_log(description: &str) -> Option<String> {
    let start = description.find("```")?;
    let after = &description[start + 3..];
    let end = after.find("```")?;
    let block = after[..end].trim();
    if block.is_empty() { None } else { Some(normalize(block)) }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use triage_core::DedupResult;
    use triage_core::ErrorType;
    use triage_core::Fingerprint;
    use triage_core::FingerprintRecord;
    use triage_core::FingerprintSource;
    use triage_core::Issue;
    use triage_core::IssueKey;
    use triage_core::IssueSearchQuery;
    use triage_core::Loghash;
    use triage_core::ProviderError;
    use triage_core::SharedFingerprintStore;
    use triage_core::SharedIssueTracker;
    use triage_core::SharedRunState;
    use triage_core::StoreError;
    use triage_core::TicketPayload;
    use triage_similarity::SimilarityConfig;
    use triage_similarity::SimilarityEngine;

    use super::DedupStrategy;
    use super::ErrorTypeLabelSearch;
    use super::FingerprintCache;
    use super::InMemorySeenLogs;
    use super::LoghashLabelSearch;
    use super::PostAnalysisStrategy;
    use super::PreAnalysisInput;
    use super::SimilaritySearch;
    use crate::orchestrator::PostAnalysisInput;

    struct FakeStore {
        hit: bool,
    }

    impl triage_core::FingerprintStore for FakeStore {
        fn lookup(&self, _fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError> {
            if self.hit {
                Ok(Some(FingerprintRecord {
                    first_seen: time::OffsetDateTime::UNIX_EPOCH,
                    last_seen: time::OffsetDateTime::UNIX_EPOCH,
                    occurrences: 1,
                    issue_key: None,
                }))
            } else {
                Ok(None)
            }
        }

        fn record_creation(&self, _fingerprint: &Fingerprint, _issue_key: &IssueKey) -> Result<(), StoreError> {
            Ok(())
        }

        fn record_dry_run(&self, _fingerprint: &Fingerprint) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct FakeTracker {
        issues: Vec<Issue>,
    }

    impl triage_core::IssueTracker for FakeTracker {
        fn search(&self, _query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
            Ok(self.issues.clone())
        }

        fn create(&self, _payload: &TicketPayload) -> Result<IssueKey, ProviderError> {
            Ok(IssueKey::new("T-1"))
        }

        fn add_comment(&self, _issue_key: &IssueKey, _body: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        fn add_labels(&self, _issue_key: &IssueKey, _labels: &[String]) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    struct FailingTracker;

    impl triage_core::IssueTracker for FailingTracker {
        fn search(&self, _query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
            Err(ProviderError::Transient("tracker unavailable".to_string()))
        }

        fn create(&self, _payload: &TicketPayload) -> Result<IssueKey, ProviderError> {
            Ok(IssueKey::new("T-1"))
        }

        fn add_comment(&self, _issue_key: &IssueKey, _body: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        fn add_labels(&self, _issue_key: &IssueKey, _labels: &[String]) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn sample_post_analysis() -> PostAnalysisInput {
        PostAnalysisInput {
            fingerprint: Fingerprint::new("abc123def456"),
            loghash: Loghash::new("feedfacecafe"),
            error_type: ErrorType::new("db-timeout"),
            title: "database connection timeout".to_string(),
            description: "connection refused while talking to the database pool".to_string(),
            logger: Some("db.pool".to_string()),
            normalized_current_log: Some("connection refused talking database pool".to_string()),
        }
    }

    #[test]
    fn in_memory_seen_logs_flags_repeat_loghash_within_run() {
        let run_state = SharedRunState::new(5);
        let loghash = Loghash::new("feedfacecafe");
        let strategy = InMemorySeenLogs;
        let first = strategy.check(&PreAnalysisInput { loghash: &loghash }, &run_state);
        assert_eq!(first.result, DedupResult::Unique);
        let second = strategy.check(&PreAnalysisInput { loghash: &loghash }, &run_state);
        assert_eq!(second.result, DedupResult::DuplicateInRun);
    }

    #[test]
    fn fingerprint_cache_prefers_local_over_persistent() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let _ = run_state.reserve_ticket_slot(&input.fingerprint);
        let store = SharedFingerprintStore::from_store(FakeStore { hit: true });
        let strategy = FingerprintCache::new(store);
        let outcome = strategy.check(&input, &run_state);
        assert_eq!(
            outcome.result,
            DedupResult::DuplicateByFingerprint { source: FingerprintSource::Local }
        );
    }

    #[test]
    fn fingerprint_cache_falls_through_to_persistent_store() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let store = SharedFingerprintStore::from_store(FakeStore { hit: true });
        let strategy = FingerprintCache::new(store);
        let outcome = strategy.check(&input, &run_state);
        assert_eq!(
            outcome.result,
            DedupResult::DuplicateByFingerprint { source: FingerprintSource::Persistent }
        );
    }

    #[test]
    fn fingerprint_cache_reports_unique_on_pure_miss() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let store = SharedFingerprintStore::from_store(FakeStore { hit: false });
        let strategy = FingerprintCache::new(store);
        let outcome = strategy.check(&input, &run_state);
        assert_eq!(outcome.result, DedupResult::Unique);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn loghash_label_search_matches_exact_label() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let issue = Issue {
            key: IssueKey::new("T-7"),
            title: "existing issue".to_string(),
            description: "whatever".to_string(),
            labels: BTreeSet::from([input.loghash.as_label()]),
            status: "open".to_string(),
        };
        let tracker = SharedIssueTracker::from_tracker(FakeTracker { issues: vec![issue] });
        let strategy = LoghashLabelSearch::new(tracker, 30);
        let outcome = strategy.check(&input, &run_state);
        assert_eq!(
            outcome.result,
            DedupResult::DuplicateByLoghashLabel { issue_key: IssueKey::new("T-7") }
        );
    }

    #[test]
    fn transient_tracker_failure_reports_unique_with_warning() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let tracker = SharedIssueTracker::from_tracker(FailingTracker);
        let strategy = LoghashLabelSearch::new(tracker, 30);
        let outcome = strategy.check(&input, &run_state);
        assert_eq!(outcome.result, DedupResult::Unique);
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn error_type_label_search_scores_above_threshold() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let issue = Issue {
            key: IssueKey::new("T-3"),
            title: "database connection timeout".to_string(),
            description: "connection refused while talking to the database pool".to_string(),
            labels: BTreeSet::from([input.error_type.as_label()]),
            status: "open".to_string(),
        };
        let tracker = SharedIssueTracker::from_tracker(FakeTracker { issues: vec![issue] });
        let similarity = Arc::new(SimilarityEngine::new(
            SimilarityConfig::default(),
            Arc::new(triage_cache::MemoryCache::new(100)),
        ));
        let strategy = ErrorTypeLabelSearch::new(tracker, similarity, 50, 30);
        let outcome = strategy.check(&input, &run_state);
        assert!(matches!(outcome.result, DedupResult::DuplicateByErrorTypeLabel { .. }));
    }

    #[test]
    fn similarity_search_finds_unrelated_match_by_text() {
        let run_state = SharedRunState::new(5);
        let input = sample_post_analysis();
        let issue = Issue {
            key: IssueKey::new("T-9"),
            title: "database connection timeout".to_string(),
            description: "connection refused while talking to the database pool".to_string(),
            labels: BTreeSet::new(),
            status: "open".to_string(),
        };
        let tracker = SharedIssueTracker::from_tracker(FakeTracker { issues: vec![issue] });
        let similarity = Arc::new(SimilarityEngine::new(
            SimilarityConfig::default(),
            Arc::new(triage_cache::MemoryCache::new(100)),
        ));
        let strategy = SimilaritySearch::new(tracker, similarity, 50, 30);
        let outcome = strategy.check(&input, &run_state);
        assert!(matches!(outcome.result, DedupResult::DuplicateBySimilarity { .. }));
    }
}
