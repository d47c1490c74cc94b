// triage-pipeline/tests/end_to_end.rs
// ============================================================================
// Integration tests: a full Pipeline run over in-memory fakes for every
// external collaborator (log backend, issue tracker, LLM, fingerprint store).
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use time::OffsetDateTime;
use triage_analysis::CircuitBreaker;
use triage_analysis::AnalysisNode;
use triage_analysis::FallbackAnalyzer;
use triage_cache::MemoryCache;
use triage_config::CircuitBreakerConfig;
use triage_config::PipelineConfig;
use triage_config::TicketConfig;
use triage_core::EnvironmentName;
use triage_core::Issue;
use triage_core::IssueKey;
use triage_core::IssueSearchQuery;
use triage_core::IssueTracker;
use triage_core::LlmClient;
use triage_core::LogBackend;
use triage_core::LogQuery;
use triage_core::LogRecord;
use triage_core::NoopAuditSink;
use triage_core::ProviderError;
use triage_core::ServiceName;
use triage_core::SharedAuditSink;
use triage_core::SharedFingerprintStore;
use triage_core::SharedIssueTracker;
use triage_core::SharedLlmClient;
use triage_core::SharedLogBackend;
use triage_core::SharedRunState;
use triage_core::TicketPayload;
use triage_dedup::DedupOrchestrator;
use triage_dedup::ErrorTypeLabelSearch;
use triage_dedup::FingerprintCache;
use triage_dedup::LoghashLabelSearch;
use triage_dedup::SimilaritySearch;
use triage_pipeline::Pipeline;
use triage_similarity::SimilarityConfig;
use triage_similarity::SimilarityEngine;
use triage_ticket::TicketNode;

struct FakeLogBackend {
    logs: Vec<LogRecord>,
}

impl LogBackend for FakeLogBackend {
    fn fetch_logs(&self, _query: &LogQuery) -> Result<Vec<LogRecord>, ProviderError> {
        Ok(self.logs.clone())
    }
}

#[derive(Default)]
struct FakeTracker {
    created: Mutex<Vec<TicketPayload>>,
}

impl IssueTracker for FakeTracker {
    fn search(&self, _query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
        Ok(Vec::new())
    }

    fn create(&self, payload: &TicketPayload) -> Result<IssueKey, ProviderError> {
        let mut created = self.created.lock().map_err(|_| ProviderError::Permanent("poisoned".to_string()))?;
        let key = IssueKey::new(format!("T-{}", created.len() + 1));
        created.push(payload.clone());
        Ok(key)
    }

    fn add_comment(&self, _issue_key: &IssueKey, _body: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    fn add_labels(&self, _issue_key: &IssueKey, _labels: &[String]) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryFingerprintStore {
    records: Mutex<std::collections::HashMap<String, triage_core::FingerprintRecord>>,
}

impl triage_core::FingerprintStore for MemoryFingerprintStore {
    fn lookup(&self, fingerprint: &triage_core::Fingerprint) -> Result<Option<triage_core::FingerprintRecord>, triage_core::StoreError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| triage_core::StoreError::Io("poisoned".to_string()))?
            .get(fingerprint.as_str())
            .cloned())
    }

    fn record_creation(&self, fingerprint: &triage_core::Fingerprint, issue_key: &IssueKey) -> Result<(), triage_core::StoreError> {
        let now = OffsetDateTime::now_utc();
        self.records
            .lock()
            .map_err(|_| triage_core::StoreError::Io("poisoned".to_string()))?
            .insert(
                fingerprint.as_str().to_string(),
                triage_core::FingerprintRecord { first_seen: now, last_seen: now, occurrences: 1, issue_key: Some(issue_key.clone()) },
            );
        Ok(())
    }

    fn record_dry_run(&self, fingerprint: &triage_core::Fingerprint) -> Result<(), triage_core::StoreError> {
        let now = OffsetDateTime::now_utc();
        self.records
            .lock()
            .map_err(|_| triage_core::StoreError::Io("poisoned".to_string()))?
            .insert(
                fingerprint.as_str().to_string(),
                triage_core::FingerprintRecord { first_seen: now, last_seen: now, occurrences: 1, issue_key: None },
            );
        Ok(())
    }
}

struct ScriptedLlm {
    response: Result<String, ProviderError>,
}

impl LlmClient for ScriptedLlm {
    fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        self.response.clone()
    }
}

fn log(service: &str, message: &str) -> LogRecord {
    LogRecord {
        logger: "db.pool".to_string(),
        thread: "worker-1".to_string(),
        message: message.to_string(),
        detail: None,
        timestamp: OffsetDateTime::now_utc(),
        service: ServiceName::new(service),
        environment: EnvironmentName::new("production"),
        occurrence_count: 1,
    }
}

fn query() -> LogQuery {
    LogQuery {
        service: ServiceName::new("checkout"),
        environment: EnvironmentName::new("production"),
        window_hours: 1,
        limit: 100,
        extra_filters: Vec::new(),
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

fn build_pipeline(llm_response: Result<String, ProviderError>, logs: Vec<LogRecord>, workers: usize) -> Pipeline {
    let tracker = SharedIssueTracker::from_tracker(FakeTracker::default());
    let store = SharedFingerprintStore::from_store(MemoryFingerprintStore::default());
    let llm = SharedLlmClient::from_client(ScriptedLlm { response: llm_response });
    let backend = SharedLogBackend::from_backend(FakeLogBackend { logs });

    let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let fallback = FallbackAnalyzer::new().expect("fallback catalog compiles");
    let analysis_node = AnalysisNode::new(llm, breaker, fallback, true);

    let ticket_node = TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), TicketConfig::default());

    let run_state = SharedRunState::new(25);
    let audit_sink = SharedAuditSink::from_sink(NoopAuditSink);
    let config = PipelineConfig { workers, rate_per_second: 50.0, task_timeout_seconds: 30, pool_deadline_seconds: None };

    Pipeline::new(backend, analysis_node, ticket_node, run_state, audit_sink, config)
}

fn ok_classification(error_type: &str, title: &str) -> String {
    format!(
        r#"{{"error_type":"{error_type}","create_ticket":true,"ticket_title":"{title}",
            "ticket_description":"desc","severity":"high","confidence":0.9}}"#
    )
}

#[test]
fn two_distinct_logs_each_produce_a_ticket() {
    let logs = vec![
        log("checkout", "Connection to db-1 timed out after 30000ms"),
        log("checkout", "Payment gateway returned HTTP 503"),
    ];
    let pipeline = build_pipeline(Ok(ok_classification("db-timeout", "DB timeout")), logs, 2);
    let summary = pipeline.run(&query()).expect("run succeeds");

    assert_eq!(summary.statistics.logs_fetched, 2);
    assert_eq!(summary.statistics.tickets_created, 2);
    assert_eq!(summary.statistics.in_run_duplicates, 0);
}

#[test]
fn identical_log_sent_twice_is_caught_before_classification() {
    let message = "Connection to db-1 timed out after 30000ms";
    let logs = vec![log("checkout", message), log("checkout", message)];
    let pipeline = build_pipeline(Ok(ok_classification("db-timeout", "DB timeout")), logs, 1);
    let summary = pipeline.run(&query()).expect("run succeeds");

    assert_eq!(summary.statistics.logs_fetched, 2);
    assert_eq!(summary.statistics.tickets_created, 1);
    assert_eq!(summary.statistics.in_run_duplicates, 1);
}

#[test]
fn llm_transport_failure_falls_back_and_still_creates_a_ticket() {
    let logs = vec![log("checkout", "Connection to db-1 timed out after 30000ms")];
    let pipeline = build_pipeline(Err(ProviderError::Transient("boom".to_string())), logs, 1);
    let summary = pipeline.run(&query()).expect("run succeeds");

    assert_eq!(summary.statistics.tickets_created, 1);
    assert_eq!(summary.statistics.errors, 0);
}

#[test]
fn cancelling_before_run_processes_nothing_new() {
    let logs = vec![
        log("checkout", "Connection to db-1 timed out after 30000ms"),
        log("checkout", "Payment gateway returned HTTP 503"),
    ];
    let pipeline = build_pipeline(Ok(ok_classification("db-timeout", "DB timeout")), logs, 2);
    pipeline.cancel_handle().cancel();
    let summary = pipeline.run(&query()).expect("run succeeds");

    assert_eq!(summary.statistics.logs_fetched, 2);
    assert_eq!(summary.statistics.tickets_created, 0);
}

#[test]
fn cap_is_never_exceeded_under_concurrent_unique_logs() {
    let logs: Vec<LogRecord> = (0..10)
        .map(|index| log("checkout", &format!("Payment gateway returned HTTP 50{index} unique failure mode")))
        .collect();
    let tracker = SharedIssueTracker::from_tracker(FakeTracker::default());
    let store = SharedFingerprintStore::from_store(MemoryFingerprintStore::default());
    let llm = SharedLlmClient::from_client(ScriptedLlm {
        response: Ok(ok_classification("http-server-error", "Upstream 5xx")),
    });
    let backend = SharedLogBackend::from_backend(FakeLogBackend { logs });

    let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let fallback = FallbackAnalyzer::new().expect("fallback catalog compiles");
    let analysis_node = AnalysisNode::new(llm, breaker, fallback, true);
    let ticket_config = TicketConfig { max_tickets_per_run: 3, ..TicketConfig::default() };
    let ticket_node =
        TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), ticket_config);

    let run_state = SharedRunState::new(3);
    let audit_sink = SharedAuditSink::from_sink(NoopAuditSink);
    let config = PipelineConfig { workers: 5, rate_per_second: 50.0, task_timeout_seconds: 30, pool_deadline_seconds: None };
    let pipeline = Pipeline::new(backend, analysis_node, ticket_node, run_state, audit_sink, config);

    let summary = pipeline.run(&query()).expect("run succeeds");

    assert_eq!(summary.statistics.tickets_created, 3);
    assert_eq!(summary.statistics.caps_hit, 7);
}

#[test]
fn dry_run_fingerprint_is_seen_as_a_duplicate_on_a_later_real_run() {
    let message = "Connection to db-1 timed out after 30000ms";
    let tracker = SharedIssueTracker::from_tracker(FakeTracker::default());
    let store = SharedFingerprintStore::from_store(MemoryFingerprintStore::default());

    // Run 1: dry-run, auto_create_ticket = false.
    let llm = SharedLlmClient::from_client(ScriptedLlm {
        response: Ok(ok_classification("db-timeout", "DB timeout")),
    });
    let backend = SharedLogBackend::from_backend(FakeLogBackend { logs: vec![log("checkout", message)] });
    let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let fallback = FallbackAnalyzer::new().expect("fallback catalog compiles");
    let analysis_node = AnalysisNode::new(llm, breaker, fallback, true);
    let dry_run_config = TicketConfig { auto_create_ticket: false, ..TicketConfig::default() };
    let ticket_node =
        TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker.clone(), store.clone()), dry_run_config);
    let run_state = SharedRunState::new(25);
    let audit_sink = SharedAuditSink::from_sink(NoopAuditSink);
    let config = PipelineConfig { workers: 1, rate_per_second: 50.0, task_timeout_seconds: 30, pool_deadline_seconds: None };
    let pipeline = Pipeline::new(backend, analysis_node, ticket_node, run_state, audit_sink, config);
    let first_summary = pipeline.run(&query()).expect("dry run succeeds");
    assert_eq!(first_summary.statistics.tickets_created, 0);

    // Run 2: real run over the same input, sharing the persistent store.
    let llm = SharedLlmClient::from_client(ScriptedLlm {
        response: Ok(ok_classification("db-timeout", "DB timeout")),
    });
    let backend = SharedLogBackend::from_backend(FakeLogBackend { logs: vec![log("checkout", message)] });
    let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    let fallback = FallbackAnalyzer::new().expect("fallback catalog compiles");
    let analysis_node = AnalysisNode::new(llm, breaker, fallback, true);
    let ticket_node =
        TicketNode::new(tracker.clone(), store.clone(), orchestrator(tracker, store), TicketConfig::default());
    let run_state = SharedRunState::new(25);
    let audit_sink = SharedAuditSink::from_sink(NoopAuditSink);
    let config = PipelineConfig { workers: 1, rate_per_second: 50.0, task_timeout_seconds: 30, pool_deadline_seconds: None };
    let pipeline = Pipeline::new(backend, analysis_node, ticket_node, run_state, audit_sink, config);
    let second_summary = pipeline.run(&query()).expect("second run succeeds");

    assert_eq!(second_summary.statistics.tickets_created, 0);
    assert_eq!(second_summary.statistics.persistent_duplicates, 1);
}
