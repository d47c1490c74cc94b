// triage-ticket/src/node.rs
// ============================================================================
// Module: Ticket Node
// Description: Validates, dedups, caps, and commits one classified log as a
//              tracker ticket, comment, or skip (component I).
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use time::Duration;
use time::OffsetDateTime;
use triage_config::TicketConfig;
use triage_core::Classification;
use triage_core::DedupResult;
use triage_core::Fingerprint;
use triage_core::IssueKey;
use triage_core::LogRecord;
use triage_core::Loghash;
use triage_core::ReserveOutcome;
use triage_core::SharedFingerprintStore;
use triage_core::SharedIssueTracker;
use triage_core::SharedRunState;
use triage_core::StrategyName;
use triage_core::TicketPayload;
use triage_dedup::DedupOrchestrator;
use triage_dedup::PostAnalysisInput;

// ============================================================================
// SECTION: Input / Outcome
// ============================================================================

/// Everything [`TicketNode::process`] needs for one already-classified log.
#[derive(Debug, Clone, Copy)]
pub struct TicketInput<'a> {
    /// The originating log record.
    pub log: &'a LogRecord,
    /// The classification produced by the analysis node.
    pub classification: &'a Classification,
    /// Fingerprint computed from the classified `error_type` and the
    /// normalized message.
    pub fingerprint: &'a Fingerprint,
    /// Loghash of the normalized message, independent of `error_type`.
    pub loghash: &'a Loghash,
    /// Normalized message text, for the direct/partial-log similarity checks.
    pub normalized_message: &'a str,
}

/// Terminal outcome of [`TicketNode::process`] for one log.
#[derive(Debug, Clone)]
pub enum TicketOutcome {
    /// The classification was missing a required field.
    Invalid(String),
    /// The classification marked this log as not worth a ticket.
    NotActionable,
    /// An equivalent log or issue was already found; no new ticket was created.
    Duplicate {
        /// Which strategy matched.
        strategy: StrategyName,
        /// The matching issue, if the strategy names one.
        issue_key: Option<IssueKey>,
    },
    /// A comment was added to an existing issue instead of a new ticket.
    Commented {
        /// The issue the comment was added to.
        issue_key: IssueKey,
    },
    /// The per-run ticket-creation cap was reached.
    Cap,
    /// Ticket creation was simulated rather than performed (dry-run).
    Simulated,
    /// A new ticket was created.
    Created {
        /// The key of the newly created issue.
        issue_key: IssueKey,
    },
    /// The tracker rejected the create or comment call.
    Error(String),
}

// ============================================================================
// SECTION: Ticket Node
// ============================================================================

/// Validates, dedups, caps, and commits classified logs as tracker tickets.
pub struct TicketNode {
    tracker: SharedIssueTracker,
    fingerprint_store: SharedFingerprintStore,
    orchestrator: DedupOrchestrator,
    config: TicketConfig,
}

impl TicketNode {
    /// Creates a new ticket node over an already-constructed dedup orchestrator.
    #[must_use]
    pub fn new(
        tracker: SharedIssueTracker,
        fingerprint_store: SharedFingerprintStore,
        orchestrator: DedupOrchestrator,
        config: TicketConfig,
    ) -> Self {
        Self { tracker, fingerprint_store, orchestrator, config }
    }

    /// Runs the full seven-step ticket decision for `input`.
    #[must_use]
    pub fn process(&self, input: &TicketInput<'_>, run_state: &SharedRunState) -> TicketOutcome {
        if let Some(reason) = validate(input.classification) {
            return TicketOutcome::Invalid(reason);
        }
        if !input.classification.create_ticket {
            return TicketOutcome::NotActionable;
        }

        let post_input = PostAnalysisInput {
            fingerprint: input.fingerprint.clone(),
            loghash: input.loghash.clone(),
            error_type: input.classification.error_type.clone(),
            title: input.classification.ticket_title.clone(),
            description: input.classification.ticket_description.clone(),
            logger: Some(input.log.logger.clone()),
            normalized_current_log: Some(input.normalized_message.to_string()),
        };
        let dedup_outcome = self.orchestrator.check(&post_input, run_state);
        if dedup_outcome.result.is_duplicate() {
            return self.handle_duplicate(&dedup_outcome.result, input, run_state);
        }

        let reservation = if self.config.auto_create_ticket {
            run_state.reserve_ticket_slot(input.fingerprint)
        } else {
            run_state.reserve_simulation_slot(input.fingerprint)
        };

        match reservation {
            ReserveOutcome::CapReached => TicketOutcome::Cap,
            ReserveOutcome::AlreadyReservedThisRun => {
                TicketOutcome::Duplicate { strategy: StrategyName::InMemorySeenLogs, issue_key: None }
            }
            ReserveOutcome::Reserved => self.commit(input, run_state),
        }
    }

    /// Handles a dedup match: best-effort idempotent loghash labeling, plus
    /// an optional cooldown-gated comment.
    fn handle_duplicate(
        &self,
        result: &DedupResult,
        input: &TicketInput<'_>,
        run_state: &SharedRunState,
    ) -> TicketOutcome {
        let strategy = result.strategy_name().unwrap_or(StrategyName::FingerprintCache);
        let issue_key = result.issue_key().cloned();

        if let Some(issue_key) = &issue_key {
            let _ = self.tracker.add_labels(issue_key, &[input.loghash.as_label()]);
            if self.config.comment_on_duplicate && self.cooldown_elapsed(input.fingerprint, run_state) {
                let body = comment_body(input.log);
                if self.tracker.add_comment(issue_key, &body).is_ok() {
                    run_state.record_comment(input.fingerprint, OffsetDateTime::now_utc());
                    return TicketOutcome::Commented { issue_key: issue_key.clone() };
                }
            }
        }
        TicketOutcome::Duplicate { strategy, issue_key }
    }

    /// Returns true if enough time has passed since the last comment on
    /// `fingerprint` to add another one.
    fn cooldown_elapsed(&self, fingerprint: &Fingerprint, run_state: &SharedRunState) -> bool {
        let cooldown = Duration::minutes(i64::try_from(self.config.comment_cooldown_minutes).unwrap_or(i64::MAX));
        run_state
            .last_comment_at(fingerprint)
            .is_none_or(|last| OffsetDateTime::now_utc() - last >= cooldown)
    }

    /// Builds the tracker payload and commits it, real or simulated.
    fn commit(&self, input: &TicketInput<'_>, run_state: &SharedRunState) -> TicketOutcome {
        let payload = build_payload(input);

        if !self.config.auto_create_ticket {
            if self.config.persist_dry_run_fingerprints {
                let _ = self.fingerprint_store.record_dry_run(input.fingerprint);
            }
            return TicketOutcome::Simulated;
        }

        match self.tracker.create(&payload) {
            Ok(issue_key) => {
                let _ = self.fingerprint_store.record_creation(input.fingerprint, &issue_key);
                let _ = self.tracker.add_labels(&issue_key, &[input.loghash.as_label()]);
                TicketOutcome::Created { issue_key }
            }
            Err(err) => {
                run_state.release_reservation(input.fingerprint);
                TicketOutcome::Error(err.to_string())
            }
        }
    }
}

/// Returns a validation failure reason, or `None` if `classification` is
/// well-formed enough to act on.
fn validate(classification: &Classification) -> Option<String> {
    if classification.ticket_title.trim().is_empty() {
        return Some("ticket title is empty".to_string());
    }
    if classification.ticket_description.trim().is_empty() {
        return Some("ticket description is empty".to_string());
    }
    if classification.error_type.as_str().trim().is_empty() {
        return Some("error type is empty".to_string());
    }
    None
}

/// Builds the short comment body added on a cooldown-eligible duplicate.
fn comment_body(log: &LogRecord) -> String {
    format!(
        "Observed again ({count} occurrence(s)) in {service}/{environment}.",
        count = log.occurrence_count,
        service = log.service.as_str(),
        environment = log.environment.as_str(),
    )
}

/// Builds the full tracker payload for a new ticket.
fn build_payload(input: &TicketInput<'_>) -> TicketPayload {
    let mut labels = BTreeSet::new();
    labels.insert(input.classification.error_type.as_label());
    labels.insert(input.classification.severity.as_label());
    labels.insert(input.loghash.as_label());
    labels.insert(input.fingerprint.as_label());
    labels.insert("source-triage-pipeline".to_string());

    let description = format!(
        "{body}\n\n---\nService: {service}\nEnvironment: {environment}\nFingerprint: `{fingerprint}`\n\
         Occurrences: {occurrences}\n",
        body = input.classification.ticket_description,
        service = input.log.service.as_str(),
        environment = input.log.environment.as_str(),
        fingerprint = input.fingerprint,
        occurrences = input.log.occurrence_count,
    );

    TicketPayload {
        title: input.classification.ticket_title.clone(),
        description,
        labels,
        priority: input.classification.severity.as_priority(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use time::OffsetDateTime;
    use triage_cache::MemoryCache;
    use triage_config::TicketConfig;
    use triage_core::Classification;
    use triage_core::ClassificationSource;
    use triage_core::EnvironmentName;
    use triage_core::ErrorType;
    use triage_core::Fingerprint;
    use triage_core::FingerprintRecord;
    use triage_core::Issue;
    use triage_core::IssueKey;
    use triage_core::IssueSearchQuery;
    use triage_core::LogRecord;
    use triage_core::Loghash;
    use triage_core::ProviderError;
    use triage_core::ServiceName;
    use triage_core::Severity;
    use triage_core::SharedFingerprintStore;
    use triage_core::SharedIssueTracker;
    use triage_core::SharedRunState;
    use triage_core::StoreError;
    use triage_core::TicketPayload;
    use triage_dedup::DedupOrchestrator;
    use triage_dedup::ErrorTypeLabelSearch;
    use triage_dedup::FingerprintCache;
    use triage_dedup::LoghashLabelSearch;
    use triage_dedup::SimilaritySearch;
    use triage_similarity::SimilarityConfig;
    use triage_similarity::SimilarityEngine;

    use super::TicketInput;
    use super::TicketNode;
    use super::TicketOutcome;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<std::collections::HashMap<String, FingerprintRecord>>,
    }

    impl triage_core::FingerprintStore for MemoryStore {
        fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>, StoreError> {
            Ok(self.records.lock().map_err(|_| StoreError::Io("poisoned".to_string()))?.get(fingerprint.as_str()).cloned())
        }

        fn record_creation(&self, fingerprint: &Fingerprint, issue_key: &IssueKey) -> Result<(), StoreError> {
            let now = OffsetDateTime::now_utc();
            self.records.lock().map_err(|_| StoreError::Io("poisoned".to_string()))?.insert(
                fingerprint.as_str().to_string(),
                FingerprintRecord { first_seen: now, last_seen: now, occurrences: 1, issue_key: Some(issue_key.clone()) },
            );
            Ok(())
        }

        fn record_dry_run(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
            let now = OffsetDateTime::now_utc();
            self.records.lock().map_err(|_| StoreError::Io("poisoned".to_string()))?.insert(
                fingerprint.as_str().to_string(),
                FingerprintRecord { first_seen: now, last_seen: now, occurrences: 1, issue_key: None },
            );
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedTracker {
        create_result: Mutex<Option<Result<IssueKey, ProviderError>>>,
        comments: Mutex<Vec<(IssueKey, String)>>,
    }

    impl triage_core::IssueTracker for ScriptedTracker {
        fn search(&self, _query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
            Ok(Vec::new())
        }

        fn create(&self, _payload: &TicketPayload) -> Result<IssueKey, ProviderError> {
            self.create_result
                .lock()
                .map_err(|_| ProviderError::Permanent("poisoned".to_string()))?
                .take()
                .unwrap_or_else(|| Ok(IssueKey::new("T-1")))
        }

        fn add_comment(&self, issue_key: &IssueKey, body: &str) -> Result<(), ProviderError> {
            self.comments
                .lock()
                .map_err(|_| ProviderError::Permanent("poisoned".to_string()))?
                .push((issue_key.clone(), body.to_string()));
            Ok(())
        }

        fn add_labels(&self, _issue_key: &IssueKey, _labels: &[String]) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn orchestrator(tracker: SharedIssueTracker, store: SharedFingerprintStore) -> DedupOrchestrator {
        let similarity = Arc::new(SimilarityEngine::new(SimilarityConfig::default(), Arc::new(MemoryCache::new(100))));
        DedupOrchestrator::new(vec![
            Box::new(FingerprintCache::new(store)),
            Box::new(LoghashLabelSearch::new(tracker.clone(), 30)),
            Box::new(ErrorTypeLabelSearch::new(tracker.clone(), similarity.clone(), 50, 30)),
            Box::new(SimilaritySearch::new(tracker, similarity, 50, 30)),
        ])
    }

    fn sample_log() -> LogRecord {
        LogRecord {
            logger: "db.pool".to_string(),
            thread: "worker-1".to_string(),
            message: "Connection to db-1 timed out after 30000ms".to_string(),
            detail: None,
            timestamp: OffsetDateTime::now_utc(),
            service: ServiceName::new("checkout"),
            environment: EnvironmentName::new("production"),
            occurrence_count: 4,
        }
    }

    fn sample_classification() -> Classification {
        Classification {
            error_type: ErrorType::new("db-timeout"),
            create_ticket: true,
            ticket_title: "Database connection timeout".to_string(),
            ticket_description: "desc".to_string(),
            severity: Severity::High,
            confidence: 0.9,
            source: ClassificationSource::Llm,
        }
    }

    #[test]
    fn not_actionable_classification_is_skipped() {
        let tracker = SharedIssueTracker::from_tracker(ScriptedTracker::default());
        let store = SharedFingerprintStore::from_store(MemoryStore::default());
        let node = TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), TicketConfig::default());
        let mut classification = sample_classification();
        classification.create_ticket = false;
        let log = sample_log();
        let fingerprint = Fingerprint::new("abc123def456");
        let loghash = Loghash::new("feedfacecafe");
        let input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &fingerprint,
            loghash: &loghash,
            normalized_message: "connection to db timed out",
        };
        let run_state = SharedRunState::new(5);
        assert!(matches!(node.process(&input, &run_state), TicketOutcome::NotActionable));
    }

    #[test]
    fn first_ticket_is_created_and_second_identical_log_is_a_duplicate() {
        let tracker = SharedIssueTracker::from_tracker(ScriptedTracker::default());
        let store = SharedFingerprintStore::from_store(MemoryStore::default());
        let node = TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), TicketConfig::default());
        let log = sample_log();
        let classification = sample_classification();
        let fingerprint = Fingerprint::new("abc123def456");
        let loghash = Loghash::new("feedfacecafe");
        let input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &fingerprint,
            loghash: &loghash,
            normalized_message: "connection to db timed out",
        };
        let run_state = SharedRunState::new(5);
        let first = node.process(&input, &run_state);
        assert!(matches!(first, TicketOutcome::Created { .. }));

        let second = node.process(&input, &run_state);
        assert!(matches!(second, TicketOutcome::Duplicate { .. }));
    }

    #[test]
    fn cap_reached_short_circuits_reservation() {
        let tracker = SharedIssueTracker::from_tracker(ScriptedTracker::default());
        let store = SharedFingerprintStore::from_store(MemoryStore::default());
        let node = TicketNode::new(
            tracker.clone(),
            store.clone(),
            orchestrator(tracker, store),
            TicketConfig { max_tickets_per_run: 0, ..TicketConfig::default() },
        );
        let log = sample_log();
        let classification = sample_classification();
        let fingerprint = Fingerprint::new("abc123def456");
        let loghash = Loghash::new("feedfacecafe");
        let input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &fingerprint,
            loghash: &loghash,
            normalized_message: "connection to db timed out",
        };
        let run_state = SharedRunState::new(0);
        assert!(matches!(node.process(&input, &run_state), TicketOutcome::Cap));
    }

    #[test]
    fn tracker_failure_releases_the_reservation() {
        let tracker_impl = ScriptedTracker::default();
        *tracker_impl.create_result.lock().expect("lock") =
            Some(Err(ProviderError::Permanent("tracker down".to_string())));
        let tracker = SharedIssueTracker::from_tracker(tracker_impl);
        let store = SharedFingerprintStore::from_store(MemoryStore::default());
        let node = TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), TicketConfig::default());
        let log = sample_log();
        let classification = sample_classification();
        let fingerprint = Fingerprint::new("abc123def456");
        let loghash = Loghash::new("feedfacecafe");
        let input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &fingerprint,
            loghash: &loghash,
            normalized_message: "connection to db timed out",
        };
        let run_state = SharedRunState::new(5);
        let outcome = node.process(&input, &run_state);
        assert!(matches!(outcome, TicketOutcome::Error(_)));
        assert_eq!(run_state.tickets_created_count(), 0);
    }

    #[test]
    fn dry_run_simulates_every_log_without_consuming_the_cap() {
        let tracker = SharedIssueTracker::from_tracker(ScriptedTracker::default());
        let store = SharedFingerprintStore::from_store(MemoryStore::default());
        let node = TicketNode::new(
            tracker.clone(),
            store.clone(),
            orchestrator(tracker, store),
            TicketConfig { auto_create_ticket: false, max_tickets_per_run: 1, ..TicketConfig::default() },
        );
        let log = sample_log();
        let classification = sample_classification();
        let run_state = SharedRunState::new(1);

        let first_input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &Fingerprint::new("abc123def456"),
            loghash: &Loghash::new("feedfacecafe"),
            normalized_message: "connection to db timed out",
        };
        let second_input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &Fingerprint::new("def456abc123"),
            loghash: &Loghash::new("cafefeedface"),
            normalized_message: "connection to db timed out again",
        };

        assert!(matches!(node.process(&first_input, &run_state), TicketOutcome::Simulated));
        assert!(matches!(node.process(&second_input, &run_state), TicketOutcome::Simulated));
        assert_eq!(run_state.tickets_created_count(), 0);
    }

    #[test]
    fn invalid_classification_is_reported_without_touching_run_state() {
        let tracker = SharedIssueTracker::from_tracker(ScriptedTracker::default());
        let store = SharedFingerprintStore::from_store(MemoryStore::default());
        let node = TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), TicketConfig::default());
        let log = sample_log();
        let mut classification = sample_classification();
        classification.ticket_title = String::new();
        let fingerprint = Fingerprint::new("abc123def456");
        let loghash = Loghash::new("feedfacecafe");
        let input = TicketInput {
            log: &log,
            classification: &classification,
            fingerprint: &fingerprint,
            loghash: &loghash,
            normalized_message: "connection to db timed out",
        };
        let run_state = SharedRunState::new(5);
        assert!(matches!(node.process(&input, &run_state), TicketOutcome::Invalid(_)));
        assert_eq!(run_state.tickets_created_count(), 0);
    }
}
