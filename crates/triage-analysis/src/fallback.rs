// triage-analysis/src/fallback.rs
// ============================================================================
// Module: Fallback Analyzer
// Description: Deterministic, regex/keyword-driven classifier used when the
//              LLM is unavailable (component G).
// Purpose: Guarantee the pipeline can still triage logs with the circuit open.
// Dependencies: regex, triage-core
// ============================================================================

//! ## Overview
//! A fixed catalog of error-type patterns, each carrying a handful of
//! regexes and keywords, a default severity, and a title/cause template.
//! [`FallbackAnalyzer::classify`] scores every pattern against the log's
//! normalized message, picks the highest-scoring match, and falls back to a
//! generic `unknown-error` classification if nothing scores above zero.
//! Unlike the LLM path this is pure and infallible: no I/O, no network call,
//! always produces a [`Classification`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use thiserror::Error;
use triage_core::Classification;
use triage_core::ClassificationSource;
use triage_core::ErrorType;
use triage_core::Severity;
use triage_core::clean_title;
use triage_core::to_kebab_case;

use crate::node::AnalysisContext;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error raised while compiling the fallback analyzer's pattern catalog.
///
/// Every pattern string in [`PATTERNS`] is a compile-time constant under our
/// control; this error exists so [`FallbackAnalyzer::new`] can propagate a
/// regex mistake through `?` rather than panicking, not because a catalog
/// bug is expected in practice.
#[derive(Debug, Error)]
pub enum FallbackBuildError {
    /// One of the catalog's regex strings failed to compile.
    #[error("invalid fallback pattern regex: {0}")]
    InvalidPattern(#[from] regex::Error),
}

// ============================================================================
// SECTION: Pattern Catalog
// ============================================================================

/// Markers whose presence in the logger name or message escalates severity
/// by one level, regardless of which pattern matched.
const ESCALATION_MARKERS: [&str; 5] = ["auth", "payment", "billing", "checkout", "security"];

/// One entry in the deterministic classification catalog.
struct Pattern {
    error_type: &'static str,
    regexes: &'static [&'static str],
    keywords: &'static [&'static str],
    severity: Severity,
    title: &'static str,
    cause: &'static str,
    action: &'static str,
}

/// The fixed catalog of known error shapes, cheapest/most-specific first.
const PATTERNS: &[Pattern] = &[
    Pattern {
        error_type: "database-connection-timeout",
        regexes: &[r"connect(ion)?\s+(to\s+)?.*(timed?\s*out|timeout)"],
        keywords: &["connection pool exhausted", "could not connect to database", "db timeout"],
        severity: Severity::High,
        title: "Database connection timeout",
        cause: "The connection pool could not obtain a healthy connection within the configured timeout.",
        action: "Check database health, connection pool sizing, and network latency to the database host.",
    },
    Pattern {
        error_type: "database-query-failure",
        regexes: &[r"(sql|query)\s+(error|failed|failure)", r"deadlock\s+detected"],
        keywords: &["constraint violation", "duplicate key", "syntax error at or near"],
        severity: Severity::Medium,
        title: "Database query failure",
        cause: "A query against the database failed, either from a constraint violation or a transient deadlock.",
        action: "Inspect the failing query and recent schema or data changes.",
    },
    Pattern {
        error_type: "http-server-error",
        regexes: &[r"\b5\d\d\b.*(error|response|status)", r"internal server error"],
        keywords: &["upstream returned 500", "bad gateway", "service unavailable"],
        severity: Severity::High,
        title: "Upstream server error",
        cause: "A downstream HTTP dependency returned a 5xx response.",
        action: "Check the health and error rate of the upstream service named in the log.",
    },
    Pattern {
        error_type: "http-client-error",
        regexes: &[r"\b4\d\d\b.*(error|response|status)"],
        keywords: &["bad request", "unprocessable entity"],
        severity: Severity::Low,
        title: "Client request error",
        cause: "A request failed client-side validation; this is typically caller error, not a service defect.",
        action: "No action required unless the rate increases sharply.",
    },
    Pattern {
        error_type: "authentication-failure",
        regexes: &[r"(auth(entication)?|login)\s+(failed|failure|error)", r"invalid\s+credentials"],
        keywords: &["token expired", "unauthorized", "invalid api key"],
        severity: Severity::Medium,
        title: "Authentication failure",
        cause: "A request failed authentication, due to an expired, missing, or invalid credential.",
        action: "Verify upstream credential rotation and client configuration.",
    },
    Pattern {
        error_type: "authorization-denied",
        regexes: &[r"(forbidden|permission)\s+denied", r"\baccess\s+denied\b"],
        keywords: &["insufficient scope", "not authorized"],
        severity: Severity::Medium,
        title: "Authorization denied",
        cause: "A request was rejected by an authorization check.",
        action: "Confirm the caller's expected permissions against the policy that denied the request.",
    },
    Pattern {
        error_type: "out-of-memory",
        regexes: &[r"out\s+of\s+memory", r"\boom\b.*kill"],
        keywords: &["cannot allocate memory", "heap space"],
        severity: Severity::High,
        title: "Out of memory",
        cause: "The process exhausted available memory or was killed by the OOM killer.",
        action: "Check for a memory leak or undersized resource limits for this service.",
    },
    Pattern {
        error_type: "disk-space-exhausted",
        regexes: &[r"no\s+space\s+left\s+on\s+device", r"disk\s+(full|exhausted)"],
        keywords: &["quota exceeded", "insufficient disk space"],
        severity: Severity::High,
        title: "Disk space exhausted",
        cause: "A write failed because the underlying volume ran out of space.",
        action: "Free or expand the affected volume and check for runaway log or temp file growth.",
    },
    Pattern {
        error_type: "network-timeout",
        regexes: &[r"(read|connect|socket)\s+timeout", r"request\s+timed\s+out"],
        keywords: &["i/o timeout", "deadline exceeded"],
        severity: Severity::Medium,
        title: "Network timeout",
        cause: "A network call exceeded its configured deadline.",
        action: "Check latency and error rate for the remote endpoint named in the log.",
    },
    Pattern {
        error_type: "connection-refused",
        regexes: &[r"connection\s+refused", r"econnrefused"],
        keywords: &["no route to host", "host unreachable"],
        severity: Severity::High,
        title: "Connection refused",
        cause: "A downstream host actively refused the connection.",
        action: "Verify the target service is running and reachable from this network.",
    },
    Pattern {
        error_type: "message-queue-lag",
        regexes: &[r"consumer\s+lag", r"queue\s+depth\s+exceeded"],
        keywords: &["backlog growing", "rebalance in progress"],
        severity: Severity::Medium,
        title: "Message queue consumer lag",
        cause: "A consumer is falling behind its partition's publish rate.",
        action: "Check consumer throughput and partition count against current load.",
    },
    Pattern {
        error_type: "serialization-error",
        regexes: &[r"(json|deserializ|serializ)\w*\s+(error|failed)"],
        keywords: &["unexpected token", "unknown field", "malformed payload"],
        severity: Severity::Low,
        title: "Serialization error",
        cause: "A payload could not be encoded or decoded against its expected schema.",
        action: "Check for a recent schema or contract change between the two sides of this call.",
    },
    Pattern {
        error_type: "configuration-error",
        regexes: &[r"(missing|invalid)\s+(config|configuration|environment\s+variable)"],
        keywords: &["required setting not found", "failed to load configuration"],
        severity: Severity::High,
        title: "Configuration error",
        cause: "A required configuration value was missing or invalid at startup or runtime.",
        action: "Check the deployment's environment variables and config file against what changed.",
    },
    Pattern {
        error_type: "null-pointer-error",
        regexes: &[r"null\s+pointer", r"nil\s+pointer\s+dereference"],
        keywords: &["attempt to call a nil", "cannot read propert(y|ies) of (null|undefined)"],
        severity: Severity::Medium,
        title: "Null reference error",
        cause: "Code dereferenced a null or undefined value.",
        action: "Check the stack trace for the call site and the upstream condition that should have guarded it.",
    },
    Pattern {
        error_type: "unhandled-exception",
        regexes: &[r"unhandled\s+(exception|error)", r"panic(ked)?\s*[:]"],
        keywords: &["uncaught exception", "fatal error"],
        severity: Severity::High,
        title: "Unhandled exception",
        cause: "An exception propagated out of its expected handling boundary.",
        action: "Check the stack trace and add handling for the condition that triggered it.",
    },
    Pattern {
        error_type: "rate-limit-exceeded",
        regexes: &[r"rate\s*limit(ed)?\s+exceeded", r"too\s+many\s+requests"],
        keywords: &["429", "throttled"],
        severity: Severity::Low,
        title: "Rate limit exceeded",
        cause: "A caller exceeded the configured request rate; typically expected backpressure, not a defect.",
        action: "No action required unless the rate of 429s increases sharply.",
    },
    Pattern {
        error_type: "dependency-version-mismatch",
        regexes: &[r"(version|schema)\s+mismatch", r"incompatible\s+(version|protocol)"],
        keywords: &["unsupported api version", "protocol negotiation failed"],
        severity: Severity::Medium,
        title: "Dependency version mismatch",
        cause: "Two sides of a call disagree on a protocol or schema version.",
        action: "Check recent deploys of either side for an unreleased breaking change.",
    },
    Pattern {
        error_type: "cache-failure",
        regexes: &[r"cache\s+(miss\s+storm|error|unavailable)"],
        keywords: &["cache connection failed", "eviction storm"],
        severity: Severity::Low,
        title: "Cache layer failure",
        cause: "The cache backend failed or is producing an unusual miss rate.",
        action: "Check cache backend health; traffic will fall through to the origin in the meantime.",
    },
    Pattern {
        error_type: "tls-certificate-error",
        regexes: &[r"certificate\s+(expired|invalid|verify\s+failed)", r"x509.*(error|invalid)"],
        keywords: &["ssl handshake failed", "unknown certificate authority"],
        severity: Severity::High,
        title: "TLS certificate error",
        cause: "A TLS handshake failed certificate validation.",
        action: "Check the certificate's expiry and chain of trust for the endpoint named in the log.",
    },
    Pattern {
        error_type: "data-validation-error",
        regexes: &[r"validation\s+(error|failed)", r"invalid\s+(input|argument|parameter)"],
        keywords: &["required field missing", "value out of range"],
        severity: Severity::Low,
        title: "Input validation error",
        cause: "A request failed input validation; typically caller error.",
        action: "No action required unless the rate increases sharply or one caller dominates it.",
    },
    Pattern {
        error_type: "shutdown-in-progress",
        regexes: &[r"(graceful\s+)?shutdown\s+in\s+progress", r"server\s+is\s+shutting\s+down"],
        keywords: &["draining connections", "received sigterm"],
        severity: Severity::Low,
        title: "Expected shutdown",
        cause: "The process logged an expected shutdown or deploy-drain event.",
        action: "No action required; this is routine deploy behavior.",
    },
    Pattern {
        error_type: "circuit-breaker-open",
        regexes: &[r"circuit\s+breaker\s+(is\s+)?open", r"fail\s*fast(ing)?"],
        keywords: &["tripped breaker", "short-circuiting calls"],
        severity: Severity::Medium,
        title: "Downstream circuit breaker open",
        cause: "A client-side circuit breaker tripped against a downstream dependency.",
        action: "Check the health of the dependency the breaker is guarding.",
    },
];

/// Severity and ticket decision for logs matching no cataloged pattern.
const UNKNOWN_ERROR_TYPE: &str = "unknown-error";
const UNKNOWN_TITLE: &str = "Unclassified error";
const UNKNOWN_CONFIDENCE: f64 = 0.1;

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// A compiled pattern, ready for matching.
struct CompiledPattern {
    pattern: &'static Pattern,
    regexes: Vec<Regex>,
}

/// Deterministic classifier used when the LLM is unavailable or disabled.
pub struct FallbackAnalyzer {
    compiled: Vec<CompiledPattern>,
}

impl FallbackAnalyzer {
    /// Compiles the pattern catalog.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackBuildError`] if a catalog regex fails to compile;
    /// this cannot happen with the built-in catalog, but keeps the
    /// constructor honest about the fallibility of [`Regex::new`].
    pub fn new() -> Result<Self, FallbackBuildError> {
        let mut compiled = Vec::with_capacity(PATTERNS.len());
        for pattern in PATTERNS {
            let regexes =
                pattern.regexes.iter().map(|source| Regex::new(source)).collect::<Result<Vec<_>, _>>()?;
            compiled.push(CompiledPattern { pattern, regexes });
        }
        Ok(Self { compiled })
    }

    /// Classifies `ctx` by scoring every cataloged pattern against its
    /// normalized message and returning the highest-scoring match, or a
    /// generic `unknown-error` classification if nothing matched.
    #[must_use]
    pub fn classify(&self, ctx: &AnalysisContext) -> Classification {
        let haystack = ctx.normalized_message.as_str();
        let mut best: Option<(&CompiledPattern, f64, f64)> = None;
        for compiled in &self.compiled {
            let (score, max_score) = score_pattern(compiled, haystack);
            if score <= 0.0 {
                continue;
            }
            if best.as_ref().is_none_or(|(_, best_score, _)| score > *best_score) {
                best = Some((compiled, score, max_score));
            }
        }

        let (error_type, title, description, severity, confidence) = match best {
            Some((compiled, score, max_score)) => {
                let confidence = if max_score > 0.0 { (score / max_score).min(1.0) } else { 0.0 };
                (
                    compiled.pattern.error_type.to_string(),
                    compiled.pattern.title.to_string(),
                    describe(compiled.pattern, ctx),
                    compiled.pattern.severity,
                    confidence,
                )
            }
            None => (
                UNKNOWN_ERROR_TYPE.to_string(),
                UNKNOWN_TITLE.to_string(),
                describe_unknown(ctx),
                Severity::Medium,
                UNKNOWN_CONFIDENCE,
            ),
        };

        let escalated = if should_escalate(ctx) { severity.escalate() } else { severity };
        let create_ticket = decide_create_ticket(escalated, confidence);

        Classification {
            error_type: ErrorType::new(to_kebab_case(&error_type)),
            create_ticket,
            ticket_title: clean_title(&title, triage_core::DEFAULT_TITLE_MAX_LEN),
            ticket_description: description,
            severity: escalated,
            confidence,
            source: ClassificationSource::Fallback,
        }
    }
}

/// Decides whether a classification should create a ticket from its
/// (already-escalated) severity and confidence: high severity always
/// tickets, medium needs at least 0.4 confidence, low needs at least 0.7.
fn decide_create_ticket(severity: Severity, confidence: f64) -> bool {
    match severity {
        Severity::High => true,
        Severity::Medium => confidence >= 0.4,
        Severity::Low => confidence >= 0.7,
    }
}

/// Scores one compiled pattern against `haystack`: each matching regex is
/// worth 1.0, each matching keyword is worth 0.5. Returns `(score, max_score)`.
fn score_pattern(compiled: &CompiledPattern, haystack: &str) -> (f64, f64) {
    let mut score = 0.0;
    for regex in &compiled.regexes {
        if regex.is_match(haystack) {
            score += 1.0;
        }
    }
    for keyword in compiled.pattern.keywords {
        if haystack.contains(keyword) {
            score += 0.5;
        }
    }
    let max_score = compiled.regexes.len() as f64 + (compiled.pattern.keywords.len() as f64) * 0.5;
    (score, max_score)
}

/// Returns true if the log's logger or message carries an escalation marker.
fn should_escalate(ctx: &AnalysisContext) -> bool {
    let logger = ctx.logger.to_ascii_lowercase();
    ESCALATION_MARKERS
        .iter()
        .any(|marker| logger.contains(marker) || ctx.normalized_message.contains(marker))
}

/// Builds a markdown ticket description for a matched pattern.
fn describe(pattern: &Pattern, ctx: &AnalysisContext) -> String {
    format!(
        "## Problem\n{title} observed {count} time(s) in `{logger}` ({service}/{environment}).\n\n\
         ## Likely cause\n{cause}\n\n\
         ## Suggested action\n{action}\n",
        title = pattern.title,
        count = ctx.occurrence_count,
        logger = ctx.logger,
        service = ctx.service.as_str(),
        environment = ctx.environment.as_str(),
        cause = pattern.cause,
        action = pattern.action,
    )
}

/// Builds a markdown ticket description for an unmatched log.
fn describe_unknown(ctx: &AnalysisContext) -> String {
    format!(
        "## Problem\nAn error log from `{logger}` ({service}/{environment}) did not match any known \
         pattern and the LLM classifier was unavailable.\n\n\
         ## Likely cause\nUnknown; automatic classification could not identify a known error shape.\n\n\
         ## Suggested action\nReview the raw log manually: `{raw}`\n",
        logger = ctx.logger,
        service = ctx.service.as_str(),
        environment = ctx.environment.as_str(),
        raw = truncate(&ctx.raw_message, 300),
    )
}

/// Truncates `text` to at most `max_chars` characters, appending an ellipsis
/// if truncated.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}…")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use triage_core::EnvironmentName;
    use triage_core::ServiceName;

    use super::FallbackAnalyzer;
    use crate::node::AnalysisContext;

    fn ctx(message: &str, logger: &str) -> AnalysisContext {
        AnalysisContext {
            logger: logger.to_string(),
            thread: "main".to_string(),
            normalized_message: triage_core::normalize(message),
            raw_message: message.to_string(),
            detail: None,
            service: ServiceName::new("checkout"),
            environment: EnvironmentName::new("production"),
            occurrence_count: 5,
        }
    }

    #[test]
    fn matches_database_timeout_pattern() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification = analyzer.classify(&ctx("Connection to db-primary timed out after 30s", "db.pool"));
        assert_eq!(classification.error_type.as_str(), "database-connection-timeout");
        assert!(classification.create_ticket);
    }

    #[test]
    fn unmatched_log_falls_back_to_unknown() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification = analyzer.classify(&ctx("the quick brown fox jumps over the lazy dog", "misc"));
        assert_eq!(classification.error_type.as_str(), "unknown-error");
        assert!((classification.confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn auth_marker_escalates_severity() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification =
            analyzer.classify(&ctx("Authentication failed: invalid credentials", "auth.service"));
        assert_eq!(classification.severity, triage_core::Severity::High);
    }

    #[test]
    fn client_error_pattern_does_not_create_ticket() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification = analyzer.classify(&ctx("request failed with 404 status", "http.client"));
        assert!(!classification.create_ticket);
    }

    #[test]
    fn low_severity_match_below_confidence_bar_does_not_create_ticket() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification =
            analyzer.classify(&ctx("json serialization error while encoding response", "api.codec"));
        assert_eq!(classification.severity, triage_core::Severity::Low);
        assert!(!classification.create_ticket);
    }

    #[test]
    fn cache_failure_below_confidence_bar_does_not_create_ticket() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification = analyzer.classify(&ctx("cache error talking to redis", "cache.client"));
        assert_eq!(classification.severity, triage_core::Severity::Low);
        assert!(!classification.create_ticket);
    }

    #[test]
    fn unknown_error_confidence_is_too_low_to_create_a_ticket() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification = analyzer.classify(&ctx("the quick brown fox jumps over the lazy dog", "misc"));
        assert_eq!(classification.error_type.as_str(), "unknown-error");
        assert!(!classification.create_ticket);
    }

    #[test]
    fn escalation_runs_before_the_ticket_decision() {
        let analyzer = FallbackAnalyzer::new().expect("catalog compiles");
        let classification = analyzer.classify(&ctx(
            "validation error: invalid argument, required field missing",
            "auth.service",
        ));
        assert_eq!(classification.error_type.as_str(), "data-validation-error");
        assert_eq!(classification.severity, triage_core::Severity::Medium);
        assert!(classification.create_ticket);
    }
}
