// triage-dedup/src/orchestrator.rs
// ============================================================================
// Module: Dedup Orchestrator
// Description: Runs the post-analysis dedup strategies in fixed order with
//              short-circuit-on-first-match semantics (component E).
// Purpose: Give the ticket node a single `check` entry point over strategies
//          2-5, so it never has to know their internal ordering.
// Dependencies: triage-core
// ============================================================================

//! ## Overview
//! [`DedupOrchestrator`] holds strategies 2-5 ([`crate::FingerprintCache`],
//! [`crate::LoghashLabelSearch`], [`crate::ErrorTypeLabelSearch`],
//! [`crate::SimilaritySearch`]) in the fixed order spec §4.D prescribes and
//! evaluates them against one [`PostAnalysisInput`], stopping at the first
//! non-[`DedupResult::Unique`] result. The state machine is flat: no
//! strategy is retried and no loop exists. Strategy 1
//! ([`crate::InMemorySeenLogs`]) runs separately, pre-analysis, and is not
//! the orchestrator's concern.

// ============================================================================
// SECTION: Imports
// ============================================================================

use triage_core::DedupResult;
use triage_core::ErrorType;
use triage_core::Fingerprint;
use triage_core::Loghash;
use triage_core::SharedRunState;

use crate::strategies::PostAnalysisStrategy;

// ============================================================================
// SECTION: Post-analysis Input
// ============================================================================

/// Fields available once a log has been classified, shared by strategies 2-5.
#[derive(Debug, Clone)]
pub struct PostAnalysisInput {
    /// Real fingerprint, now computable since `error_type` is known.
    pub fingerprint: Fingerprint,
    /// Loghash of the current log's normalized message.
    pub loghash: Loghash,
    /// Classified error type.
    pub error_type: ErrorType,
    /// Cleaned ticket title the classification produced.
    pub title: String,
    /// Ticket description the classification produced.
    pub description: String,
    /// Logger name that emitted the current log, if known.
    pub logger: Option<String>,
    /// Normalized current log text, for the direct/partial-log checks.
    pub normalized_current_log: Option<String>,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Outcome of running the full post-analysis cascade: the final verdict plus
/// any warnings strategies swallowed along the way.
#[derive(Debug, Clone)]
pub struct OrchestratorOutcome {
    /// The verdict of the first strategy to report a duplicate, or `Unique`
    /// if every strategy reported `Unique`.
    pub result: DedupResult,
    /// Warnings collected from strategies that swallowed a transient
    /// failure, in evaluation order. Non-empty warnings do not change
    /// `result`; they are informational only.
    pub warnings: Vec<String>,
}

/// Runs strategies 2-5 in fixed order, short-circuiting on the first
/// non-[`DedupResult::Unique`] result.
pub struct DedupOrchestrator {
    /// Strategies in the exact order spec §4.D prescribes.
    strategies: Vec<Box<dyn PostAnalysisStrategy>>,
}

impl DedupOrchestrator {
    /// Builds an orchestrator over an explicit, already-ordered strategy
    /// list. Callers are expected to pass `[FingerprintCache,
    /// LoghashLabelSearch, ErrorTypeLabelSearch, SimilaritySearch]`.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn PostAnalysisStrategy>>) -> Self {
        Self { strategies }
    }

    /// Runs every strategy in order against `input`, returning the first
    /// duplicate verdict found, or `Unique` if none matched.
    #[must_use]
    pub fn check(&self, input: &PostAnalysisInput, run_state: &SharedRunState) -> OrchestratorOutcome {
        let mut warnings = Vec::new();
        for strategy in &self.strategies {
            let outcome = strategy.check(input, run_state);
            if let Some(warning) = outcome.warning {
                warnings.push(format!("{}: {warning}", strategy.name()));
            }
            if outcome.result.is_duplicate() {
                return OrchestratorOutcome { result: outcome.result, warnings };
            }
        }
        OrchestratorOutcome { result: DedupResult::Unique, warnings }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use triage_core::DedupResult;
    use triage_core::ErrorType;
    use triage_core::Fingerprint;
    use triage_core::FingerprintRecord;
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

    use super::DedupOrchestrator;
    use super::PostAnalysisInput;
    use crate::strategies::FingerprintCache;
    use crate::strategies::PostAnalysisStrategy;

    struct MissingStore;

    impl triage_core::FingerprintStore for MissingStore {
        fn lookup(&self, _fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError> {
            Ok(None)
        }

        fn record_creation(&self, _fingerprint: &Fingerprint, _issue_key: &IssueKey) -> Result<(), StoreError> {
            Ok(())
        }

        fn record_dry_run(&self, _fingerprint: &Fingerprint) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct EmptyTracker;

    impl triage_core::IssueTracker for EmptyTracker {
        fn search(&self, _query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
            Ok(Vec::new())
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

    fn sample_input() -> PostAnalysisInput {
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
    fn all_unique_strategies_yield_unique() {
        let run_state = SharedRunState::new(5);
        let store = SharedFingerprintStore::from_store(MissingStore);
        let tracker = SharedIssueTracker::from_tracker(EmptyTracker);
        let similarity = std::sync::Arc::new(triage_similarity::SimilarityEngine::new(
            triage_similarity::SimilarityConfig::default(),
            std::sync::Arc::new(triage_cache::MemoryCache::new(100)),
        ));
        let strategies: Vec<Box<dyn PostAnalysisStrategy>> = vec![
            Box::new(FingerprintCache::new(store)),
            Box::new(crate::strategies::LoghashLabelSearch::new(tracker.clone(), 30)),
            Box::new(crate::strategies::ErrorTypeLabelSearch::new(
                tracker.clone(),
                similarity.clone(),
                50,
                30,
            )),
            Box::new(crate::strategies::SimilaritySearch::new(tracker, similarity, 50, 30)),
        ];
        let orchestrator = DedupOrchestrator::new(strategies);
        let outcome = orchestrator.check(&sample_input(), &run_state);
        assert_eq!(outcome.result, DedupResult::Unique);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn first_match_short_circuits_later_strategies() {
        let run_state = SharedRunState::new(5);
        let store = SharedFingerprintStore::from_store(MissingStore);
        let _ = run_state.reserve_ticket_slot(&sample_input().fingerprint);
        let tracker = SharedIssueTracker::from_tracker(EmptyTracker);
        let similarity = std::sync::Arc::new(triage_similarity::SimilarityEngine::new(
            triage_similarity::SimilarityConfig::default(),
            std::sync::Arc::new(triage_cache::MemoryCache::new(100)),
        ));
        let strategies: Vec<Box<dyn PostAnalysisStrategy>> = vec![
            Box::new(FingerprintCache::new(store)),
            Box::new(crate::strategies::LoghashLabelSearch::new(tracker.clone(), 30)),
            Box::new(crate::strategies::ErrorTypeLabelSearch::new(
                tracker.clone(),
                similarity.clone(),
                50,
                30,
            )),
            Box::new(crate::strategies::SimilaritySearch::new(tracker, similarity, 50, 30)),
        ];
        let orchestrator = DedupOrchestrator::new(strategies);
        let outcome = orchestrator.check(&sample_input(), &run_state);
        assert!(matches!(outcome.result, DedupResult::DuplicateByFingerprint { .. }));
    }
}
