// triage-pipeline/src/pipeline.rs
// ============================================================================
// Module: Pipeline
// Description: Bounded worker pool driving one run end to end: fetch, dedup,
//              analyze, ticket, audit (component J).
// Purpose: Turn a LogQuery into a RunSummary without ever letting one stuck
//          log, one flaky provider, or a cancellation request corrupt run
//          state shared across threads.
// Dependencies: time, triage-analysis, triage-config, triage-core,
//               triage-dedup, triage-ticket
// ============================================================================

//! ## Overview
//! [`Pipeline::run`] fetches one bounded batch of logs, fans them out over a
//! fixed pool of OS threads via an [`mpsc`] channel, and joins on completion.
//! Each worker pushes a log through the pre-analysis in-run dedup check, the
//! rate-limited [`triage_analysis::AnalysisNode`], and the
//! [`triage_ticket::TicketNode`] in turn, recording exactly one
//! [`AuditRecord`] per log regardless of which step it exited at.
//! Cancellation ([`CancelHandle::cancel`]) and the optional pool-wide
//! deadline are both checked between logs and inside the rate limiter's
//! wait, so a request to stop never waits for the whole backlog to drain,
//! only for in-flight logs to finish.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use time::OffsetDateTime;
use triage_analysis::AnalysisContext;
use triage_analysis::AnalysisError;
use triage_analysis::AnalysisNode;
use triage_config::PipelineConfig;
use triage_core::AuditAction;
use triage_core::AuditRecord;
use triage_core::AuditSink;
use triage_core::Classification;
use triage_core::ErrorType;
use triage_core::Fingerprint;
use triage_core::IssueKey;
use triage_core::LogBackend;
use triage_core::LogQuery;
use triage_core::LogRecord;
use triage_core::Loghash;
use triage_core::RunStatistics;
use triage_core::SharedAuditSink;
use triage_core::SharedLogBackend;
use triage_core::SharedRunState;
use triage_core::Severity;
use triage_core::StrategyName;
use triage_core::fingerprint;
use triage_core::loghash;
use triage_core::normalize;
use triage_dedup::DedupStrategy;
use triage_dedup::InMemorySeenLogs;
use triage_dedup::strategies::PreAnalysisInput;
use triage_ticket::TicketInput;
use triage_ticket::TicketNode;
use triage_ticket::TicketOutcome;

use crate::error::PipelineError;
use crate::rate_limiter::AcquireOutcome;
use crate::rate_limiter::RateLimiter;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Cheaply cloneable handle letting a caller cancel an in-progress run from
/// another thread (e.g. a CLI signal handler).
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation; already-dispatched logs run to completion, no
    /// new log starts.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// Final result of one [`Pipeline::run`] call.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Aggregate counters for this run.
    pub statistics: RunStatistics,
    /// Non-fatal warnings accumulated while processing (audit sink failures,
    /// individual provider hiccups already absorbed elsewhere).
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Worker Context
// ============================================================================

/// Everything a worker thread needs to process logs, cloned once per thread.
#[derive(Clone)]
struct WorkerContext {
    analysis_node: Arc<AnalysisNode>,
    ticket_node: Arc<TicketNode>,
    run_state: SharedRunState,
    audit_sink: SharedAuditSink,
    rate_limiter: Arc<RateLimiter>,
    seen_logs: Arc<InMemorySeenLogs>,
    cancel: Arc<AtomicBool>,
    task_timeout: Duration,
}

/// Arguments to [`WorkerContext::emit`], grouped to keep the call site under
/// the argument-count lint.
struct EmitArgs {
    log: LogRecord,
    fingerprint: Fingerprint,
    action: AuditAction,
    strategy_name: Option<StrategyName>,
    issue_key: Option<IssueKey>,
    severity: Option<Severity>,
    error_type: Option<ErrorType>,
    duration_ms: u64,
    reason: Option<String>,
}

impl WorkerContext {
    /// Processes a single log end to end, always producing exactly one
    /// audit record.
    fn process_one(&self, log: LogRecord, pool_deadline: Option<Instant>, warnings: &Mutex<Vec<String>>) {
        let start = Instant::now();
        let mut deadline = start + self.task_timeout;
        if let Some(pool_deadline) = pool_deadline {
            deadline = deadline.min(pool_deadline);
        }

        let normalized_message = normalize(&log.message);
        let log_loghash = Loghash::new(loghash(&log.message));

        let pre_input = PreAnalysisInput { loghash: &log_loghash };
        let pre_outcome = self.seen_logs.check(&pre_input, &self.run_state);
        if pre_outcome.result.is_duplicate() {
            self.run_state.update_statistics(|stats| stats.in_run_duplicates += 1);
            self.emit(
                EmitArgs {
                    log,
                    fingerprint: placeholder_fingerprint(&log_loghash),
                    action: AuditAction::Skip,
                    strategy_name: Some(StrategyName::InMemorySeenLogs),
                    issue_key: None,
                    severity: None,
                    error_type: None,
                    duration_ms: duration_ms(start),
                    reason: Some("in_run_duplicate".to_string()),
                },
                warnings,
            );
            return;
        }

        if self.cancel.load(Ordering::Relaxed) || Instant::now() >= deadline {
            self.emit_skip(log, &log_loghash, start, "cancelled_or_timed_out", warnings);
            return;
        }

        match self.rate_limiter.acquire(deadline, &self.cancel) {
            AcquireOutcome::Cancelled => {
                self.emit_skip(log, &log_loghash, start, "cancelled", warnings);
                return;
            }
            AcquireOutcome::TimedOut => {
                self.emit_skip(log, &log_loghash, start, "timeout", warnings);
                return;
            }
            AcquireOutcome::Acquired => {}
        }

        let ctx = AnalysisContext {
            logger: log.logger.clone(),
            thread: log.thread.clone(),
            normalized_message: normalized_message.clone(),
            raw_message: log.message.clone(),
            detail: log.detail.clone(),
            service: log.service.clone(),
            environment: log.environment.clone(),
            occurrence_count: log.occurrence_count,
        };

        let classification = match self.analysis_node.analyze(&ctx) {
            Ok(classification) => classification,
            Err(AnalysisError::Cancelled) => {
                self.emit_skip(log, &log_loghash, start, "llm_call_cancelled", warnings);
                return;
            }
            Err(AnalysisError::Unavailable(reason)) => {
                self.run_state.update_statistics(|stats| stats.errors += 1);
                self.emit(
                    EmitArgs {
                        log,
                        fingerprint: placeholder_fingerprint(&log_loghash),
                        action: AuditAction::Error,
                        strategy_name: None,
                        issue_key: None,
                        severity: None,
                        error_type: None,
                        duration_ms: duration_ms(start),
                        reason: Some(reason),
                    },
                    warnings,
                );
                return;
            }
        };

        let log_fingerprint = Fingerprint::new(fingerprint(classification.error_type.as_str(), &log.message));
        let outcome = {
            let ticket_input = TicketInput {
                log: &log,
                classification: &classification,
                fingerprint: &log_fingerprint,
                loghash: &log_loghash,
                normalized_message: &normalized_message,
            };
            self.ticket_node.process(&ticket_input, &self.run_state)
        };
        self.record_outcome(log, log_fingerprint, &classification, outcome, start, warnings);
    }

    /// Emits a skip record for a log that never reached classification.
    fn emit_skip(&self, log: LogRecord, log_loghash: &Loghash, start: Instant, reason: &str, warnings: &Mutex<Vec<String>>) {
        self.emit(
            EmitArgs {
                log,
                fingerprint: placeholder_fingerprint(log_loghash),
                action: AuditAction::Skip,
                strategy_name: None,
                issue_key: None,
                severity: None,
                error_type: None,
                duration_ms: duration_ms(start),
                reason: Some(reason.to_string()),
            },
            warnings,
        );
    }

    /// Maps a [`TicketOutcome`] to its statistics bump and audit record.
    fn record_outcome(
        &self,
        log: LogRecord,
        log_fingerprint: Fingerprint,
        classification: &Classification,
        outcome: TicketOutcome,
        start: Instant,
        warnings: &Mutex<Vec<String>>,
    ) {
        let duration = duration_ms(start);
        let (action, strategy_name, issue_key, reason) = match outcome {
            TicketOutcome::Invalid(reason) => {
                self.run_state.update_statistics(|stats| stats.errors += 1);
                (AuditAction::Error, None, None, Some(reason))
            }
            TicketOutcome::NotActionable => (AuditAction::Skip, None, None, Some("not_actionable".to_string())),
            TicketOutcome::Duplicate { strategy, issue_key } => {
                self.run_state.update_statistics(|stats| bump_duplicate_stat(stats, strategy));
                (AuditAction::Skip, Some(strategy), issue_key, Some(format!("duplicate:{}", strategy.as_str())))
            }
            TicketOutcome::Commented { issue_key } => {
                self.run_state.update_statistics(|stats| stats.comments_added += 1);
                (AuditAction::Comment, None, Some(issue_key), None)
            }
            TicketOutcome::Cap => {
                self.run_state.update_statistics(|stats| stats.caps_hit += 1);
                (AuditAction::Cap, None, None, Some("per_run_cap_reached".to_string()))
            }
            TicketOutcome::Simulated => (AuditAction::Simulate, None, None, None),
            TicketOutcome::Created { issue_key } => {
                self.run_state.update_statistics(|stats| stats.tickets_created += 1);
                (AuditAction::Create, None, Some(issue_key), None)
            }
            TicketOutcome::Error(reason) => {
                self.run_state.update_statistics(|stats| stats.errors += 1);
                (AuditAction::Error, None, None, Some(reason))
            }
        };
        self.emit(
            EmitArgs {
                log,
                fingerprint: log_fingerprint,
                action,
                strategy_name,
                issue_key,
                severity: Some(classification.severity),
                error_type: Some(classification.error_type.clone()),
                duration_ms: duration,
                reason,
            },
            warnings,
        );
    }

    /// Builds and records one [`AuditRecord`]; a sink failure becomes a
    /// run-level warning rather than aborting the worker.
    fn emit(&self, args: EmitArgs, warnings: &Mutex<Vec<String>>) {
        let record = AuditRecord {
            timestamp: OffsetDateTime::now_utc(),
            service: args.log.service,
            environment: args.log.environment,
            fingerprint: args.fingerprint,
            action: args.action,
            strategy_name: args.strategy_name,
            issue_key: args.issue_key,
            severity: args.severity,
            error_type: args.error_type,
            duration_ms: args.duration_ms,
            reason: args.reason,
        };
        if let Err(err) = self.audit_sink.record(&record) {
            if let Ok(mut warnings) = warnings.lock() {
                warnings.push(format!("audit sink error: {err}"));
            }
        }
    }
}

/// Bumps the statistics counter matching the strategy that found a duplicate.
fn bump_duplicate_stat(stats: &mut RunStatistics, strategy: StrategyName) {
    match strategy {
        StrategyName::InMemorySeenLogs => stats.in_run_duplicates += 1,
        StrategyName::FingerprintCache => stats.persistent_duplicates += 1,
        StrategyName::LoghashLabelSearch => stats.loghash_matches += 1,
        StrategyName::ErrorTypeLabelSearch => stats.errortype_matches += 1,
        StrategyName::SimilaritySearch => stats.similarity_matches += 1,
    }
}

/// Best-effort identity for audit records produced before classification,
/// when no real fingerprint (which requires `error_type`) exists yet.
fn placeholder_fingerprint(log_loghash: &Loghash) -> Fingerprint {
    Fingerprint::new(log_loghash.as_str())
}

/// Converts an elapsed duration to milliseconds without a truncating cast.
fn duration_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Drives one run of the triage pipeline over a bounded pool of OS threads.
pub struct Pipeline {
    log_backend: SharedLogBackend,
    analysis_node: Arc<AnalysisNode>,
    ticket_node: Arc<TicketNode>,
    run_state: SharedRunState,
    audit_sink: SharedAuditSink,
    rate_limiter: Arc<RateLimiter>,
    seen_logs: Arc<InMemorySeenLogs>,
    cancel: Arc<AtomicBool>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a new pipeline over already-constructed nodes and run state.
    #[must_use]
    pub fn new(
        log_backend: SharedLogBackend,
        analysis_node: AnalysisNode,
        ticket_node: TicketNode,
        run_state: SharedRunState,
        audit_sink: SharedAuditSink,
        config: PipelineConfig,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_per_second));
        Self {
            log_backend,
            analysis_node: Arc::new(analysis_node),
            ticket_node: Arc::new(ticket_node),
            run_state,
            audit_sink,
            rate_limiter,
            seen_logs: Arc::new(InMemorySeenLogs),
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Returns a handle the caller can use to cancel this pipeline's next
    /// (or current) run from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { flag: Arc::clone(&self.cancel) }
    }

    /// Fetches logs matching `query` and processes every one through the
    /// dedup, analysis, and ticketing stages, returning the run's aggregate
    /// statistics and any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FetchFailed`] if the log backend itself could
    /// not be queried; no logs are processed in that case.
    pub fn run(&self, query: &LogQuery) -> Result<RunSummary, PipelineError> {
        let logs = self.log_backend.fetch_logs(query).map_err(PipelineError::FetchFailed)?;
        let fetched = u64::try_from(logs.len()).unwrap_or(u64::MAX);
        self.run_state.update_statistics(|stats| stats.logs_fetched += fetched);

        let (sender, receiver) = mpsc::channel::<LogRecord>();
        for log in logs {
            let _ = sender.send(log);
        }
        drop(sender);
        let receiver = Arc::new(Mutex::new(receiver));

        let pool_deadline = self.config.pool_deadline_seconds.map(|secs| Instant::now() + Duration::from_secs(secs));
        let warnings = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            let receiver = Arc::clone(&receiver);
            let warnings = Arc::clone(&warnings);
            let context = self.worker_context();
            handles.push(thread::spawn(move || {
                loop {
                    if context.cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    if pool_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        break;
                    }
                    let next = receiver.lock().ok().and_then(|guard| guard.recv().ok());
                    match next {
                        Some(log) => context.process_one(log, pool_deadline, &warnings),
                        None => break,
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.join();
        }

        let warnings = Arc::try_unwrap(warnings)
            .map(|mutex| mutex.into_inner().unwrap_or_default())
            .unwrap_or_default();
        Ok(RunSummary { statistics: self.run_state.statistics_snapshot(), warnings })
    }

    /// Builds the per-thread context shared by every worker in a run.
    fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            analysis_node: Arc::clone(&self.analysis_node),
            ticket_node: Arc::clone(&self.ticket_node),
            run_state: self.run_state.clone(),
            audit_sink: self.audit_sink.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            seen_logs: Arc::clone(&self.seen_logs),
            cancel: Arc::clone(&self.cancel),
            task_timeout: Duration::from_secs(self.config.task_timeout_seconds),
        }
    }
}
