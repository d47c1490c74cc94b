// triage-cli/src/compose.rs
// ============================================================================
// Module: Composition Root
// Description: Builds a fully wired Pipeline from a validated TriageConfig.
// Purpose: Keep the one place that bridges `triage-config` to concrete
//          `triage-providers`/`triage-store-sqlite` implementations isolated
//          from argument parsing and output formatting.
// ============================================================================

//! ## Overview
//! Every other crate in this workspace depends only on traits and plain
//! config structs; this module is where concrete collaborators are chosen
//! and assembled, mirroring the construction already exercised by
//! `triage-pipeline`'s end-to-end tests against in-memory fakes. Nothing
//! downstream of [`build_pipeline`] needs to know which cache backend,
//! fingerprint store, or audit sink was actually selected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use triage_analysis::AnalysisNode;
use triage_analysis::CircuitBreaker;
use triage_analysis::FallbackAnalyzer;
use triage_analysis::FallbackBuildError;
use triage_cache::CacheManager;
use triage_cache::CacheManagerConfig;
use triage_config::FingerprintStoreBackendKind;
use triage_config::TriageConfig;
use triage_core::AuditError;
use triage_core::NoopAuditSink;
use triage_core::SharedAuditSink;
use triage_core::SharedFingerprintStore;
use triage_core::SharedIssueTracker;
use triage_core::SharedLlmClient;
use triage_core::SharedLogBackend;
use triage_core::SharedRunState;
use triage_core::StderrAuditSink;
use triage_core::StoreError;
use triage_dedup::DedupOrchestrator;
use triage_dedup::ErrorTypeLabelSearch;
use triage_dedup::FingerprintCache;
use triage_dedup::LoghashLabelSearch;
use triage_dedup::SimilaritySearch;
use triage_pipeline::Pipeline;
use triage_providers::HttpDistributedCache;
use triage_providers::HttpIssueTracker;
use triage_providers::HttpLlmClient;
use triage_providers::HttpLogBackend;
use triage_providers::JsonFileFingerprintStore;
use triage_similarity::SimilarityConfig;
use triage_similarity::SimilarityEngine;
use triage_store_sqlite::SqliteFingerprintStore;
use triage_ticket::TicketNode;

use triage_core::FileAuditSink;

/// Name of the single-file `SQLite` database under `<cache_dir>/fingerprints/`
/// when the `sqlite` fingerprint store backend is selected.
const SQLITE_FILE_NAME: &str = "fingerprints.sqlite3";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures that can occur while wiring a [`Pipeline`] from configuration,
/// as opposed to failures that occur once the pipeline is running.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The persistent fingerprint store could not be opened.
    #[error("failed to open fingerprint store: {0}")]
    FingerprintStore(#[from] StoreError),
    /// The configured audit sink could not be opened.
    #[error("failed to open audit sink: {0}")]
    AuditSink(#[from] AuditError),
    /// The deterministic fallback analyzer's pattern catalog failed to compile.
    #[error("fallback analyzer catalog failed to compile: {0}")]
    Fallback(#[from] FallbackBuildError),
}

// ============================================================================
// SECTION: Composition
// ============================================================================

/// A wired [`Pipeline`] plus any non-fatal warnings produced while resolving
/// its collaborators (currently only cache-backend downgrades, per §4.B's
/// fallback policy).
pub struct Composed {
    /// The wired pipeline, ready for [`Pipeline::run`].
    pub pipeline: Pipeline,
    /// Warnings accumulated while resolving collaborators.
    pub warnings: Vec<String>,
}

/// Builds a [`Pipeline`] wired from every setting in `config`.
///
/// # Errors
///
/// Returns [`ComposeError`] if the persistent fingerprint store, the audit
/// sink, or the fallback analyzer's pattern catalog cannot be constructed.
pub fn build_pipeline(config: &TriageConfig) -> Result<Composed, ComposeError> {
    let log_backend = SharedLogBackend::from_backend(HttpLogBackend::new(config.providers.log_backend.clone()));
    let tracker = SharedIssueTracker::from_tracker(HttpIssueTracker::new(config.providers.issue_tracker.clone()));
    let llm = SharedLlmClient::from_client(HttpLlmClient::new(config.providers.llm.clone()));
    let fingerprint_store = open_fingerprint_store(config)?;

    let distributed_client = distributed_cache_client(config);
    let cache_manager = CacheManager::new(&cache_manager_config(config), distributed_client);
    let warnings = cache_manager.warnings().to_vec();
    let cache = Arc::new(cache_manager);
    let similarity = Arc::new(SimilarityEngine::new(similarity_config(config), cache));

    let orchestrator = DedupOrchestrator::new(vec![
        Box::new(FingerprintCache::new(fingerprint_store.clone())),
        Box::new(LoghashLabelSearch::new(tracker.clone(), config.dedup.search_window_days)),
        Box::new(ErrorTypeLabelSearch::new(
            tracker.clone(),
            Arc::clone(&similarity),
            config.dedup.search_max_results,
            config.dedup.search_window_days,
        )),
        Box::new(SimilaritySearch::new(
            tracker.clone(),
            similarity,
            config.dedup.search_max_results,
            config.dedup.search_window_days,
        )),
    ]);

    let breaker = CircuitBreaker::new(config.circuit);
    let fallback = FallbackAnalyzer::new()?;
    let analysis_node = AnalysisNode::new(llm, breaker, fallback, config.ticket.fallback_enabled);

    let ticket_node = TicketNode::new(tracker, fingerprint_store, orchestrator, config.ticket);

    let run_state = SharedRunState::new(config.ticket.max_tickets_per_run);
    let audit_sink = open_audit_sink(config)?;

    let pipeline = Pipeline::new(log_backend, analysis_node, ticket_node, run_state, audit_sink, config.pipeline);
    Ok(Composed { pipeline, warnings })
}

/// Opens the persistent fingerprint store named by `config.providers.fingerprint_store.backend`.
fn open_fingerprint_store(config: &TriageConfig) -> Result<SharedFingerprintStore, StoreError> {
    match config.providers.fingerprint_store.backend {
        FingerprintStoreBackendKind::JsonFile => {
            Ok(SharedFingerprintStore::from_store(JsonFileFingerprintStore::open(config.fingerprints_dir())?))
        }
        FingerprintStoreBackendKind::Sqlite => {
            let path = config.fingerprints_dir().join(SQLITE_FILE_NAME);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| StoreError::Io(format!("failed to create store directory: {err}")))?;
            }
            Ok(SharedFingerprintStore::from_store(SqliteFingerprintStore::open(
                path,
                config.providers.fingerprint_store.sqlite_busy_timeout_ms,
            )?))
        }
    }
}

/// Builds the [`CacheManagerConfig`] from `config`'s cache section.
fn cache_manager_config(config: &TriageConfig) -> CacheManagerConfig {
    CacheManagerConfig {
        preferred: config.cache.backend,
        file_directory: config.cache.file_directory.clone().unwrap_or_else(|| config.cache_dir.join("cache")),
        memory_capacity: config.cache.memory_capacity,
    }
}

/// Builds the distributed cache transport named by
/// `config.providers.distributed_cache.enabled`, or `None` if it is
/// disabled, in which case a `distributed` cache preference downgrades to
/// `file` per the cache layer's fallback policy.
fn distributed_cache_client(config: &TriageConfig) -> Option<Arc<dyn triage_cache::DistributedKvClient + Send + Sync>> {
    if !config.providers.distributed_cache.enabled {
        return None;
    }
    Some(Arc::new(HttpDistributedCache::new(config.providers.distributed_cache.clone())))
}

/// Derives the similarity engine's scoring configuration from `config.dedup`
/// and `config.cache`, keeping the spec's fixed weights and bonuses
/// (§4.C) while the three decision thresholds and the cache TTL stay
/// configurable.
fn similarity_config(config: &TriageConfig) -> SimilarityConfig {
    SimilarityConfig {
        similarity_threshold: config.dedup.similarity_threshold,
        direct_log_threshold: config.dedup.direct_log_threshold,
        partial_log_threshold: config.dedup.partial_log_threshold,
        cache_ttl: Duration::from_secs(config.cache.ttl_seconds),
        ..SimilarityConfig::default()
    }
}

/// Opens the configured [`SharedAuditSink`] backend.
fn open_audit_sink(config: &TriageConfig) -> Result<SharedAuditSink, AuditError> {
    use triage_config::AuditBackendKind;

    match config.audit.backend {
        AuditBackendKind::File => {
            Ok(SharedAuditSink::from_sink(FileAuditSink::open(&config.audit_log_path())?))
        }
        AuditBackendKind::Stderr => Ok(SharedAuditSink::from_sink(StderrAuditSink)),
        AuditBackendKind::Noop => Ok(SharedAuditSink::from_sink(NoopAuditSink)),
    }
}
