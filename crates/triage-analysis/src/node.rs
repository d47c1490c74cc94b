// triage-analysis/src/node.rs
// ============================================================================
// Module: Analysis Node
// Description: Wraps the LLM client behind the circuit breaker, with a
//              deterministic fallback on failure (component H).
// Purpose: Give the pipeline one `analyze` call that always (short of
//          cancellation, or a disabled fallback) returns a usable Classification.
// Dependencies: serde_json, triage-core
// ============================================================================

//! ## Overview
//! [`AnalysisNode::analyze`] builds a bounded prompt from an [`AnalysisContext`],
//! calls the LLM through the [`crate::breaker::CircuitBreaker`], and parses
//! the response against the fixed JSON schema the prompt requests. A schema
//! violation, a breaker rejection, or a transport failure all route to the
//! same place: the deterministic [`crate::fallback::FallbackAnalyzer`],
//! unless it has been disabled, in which case the failure propagates as
//! [`AnalysisError::Unavailable`]. A cancelled call propagates as
//! [`AnalysisError::Cancelled`] without ever reaching the fallback analyzer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use triage_core::Classification;
use triage_core::ClassificationSource;
use triage_core::EnvironmentName;
use triage_core::ErrorType;
use triage_core::ProviderError;
use triage_core::Severity;
use triage_core::ServiceName;
use triage_core::SharedLlmClient;
use triage_core::clean_title;
use triage_core::to_kebab_case;

use crate::breaker::CircuitBreaker;
use crate::error::AnalysisError;
use crate::error::BreakerError;
use crate::fallback::FallbackAnalyzer;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Fields available to the analysis node for one log, independent of which
/// path (LLM or fallback) ends up producing the classification.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Logger name that emitted the log.
    pub logger: String,
    /// Thread or process identifier the log was emitted from.
    pub thread: String,
    /// Normalized (redacted, lowercased) message text.
    pub normalized_message: String,
    /// Original, unredacted message text, used only in fallback descriptions
    /// for a human reading the ticket, never sent to the LLM.
    pub raw_message: String,
    /// Optional structured detail (stack trace, extra fields).
    pub detail: Option<String>,
    /// Service the log originates from.
    pub service: ServiceName,
    /// Deployment environment the log originates from.
    pub environment: EnvironmentName,
    /// Number of occurrences of this log observed within the fetch window.
    pub occurrence_count: u64,
}

// ============================================================================
// SECTION: LLM Response Schema
// ============================================================================

/// Expected shape of the LLM's JSON response. Optional fields are defaulted
/// and out-of-range values normalized rather than treated as schema
/// violations; a missing required field or wrong type is a schema violation.
#[derive(Debug, Deserialize)]
struct RawClassification {
    error_type: String,
    create_ticket: bool,
    ticket_title: String,
    ticket_description: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parses and post-processes a raw LLM response into a [`Classification`].
fn parse_llm_response(text: &str) -> Result<Classification, ()> {
    let raw: RawClassification = serde_json::from_str(text).map_err(|_| ())?;
    if raw.error_type.trim().is_empty()
        || raw.ticket_title.trim().is_empty()
        || raw.ticket_description.trim().is_empty()
    {
        return Err(());
    }
    let severity = raw
        .severity
        .as_deref()
        .map(str::to_ascii_lowercase)
        .and_then(|value| match value.as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        })
        .unwrap_or(Severity::Medium);
    let confidence = raw.confidence.unwrap_or(1.0).clamp(0.0, 1.0);
    Ok(Classification {
        error_type: ErrorType::new(to_kebab_case(&raw.error_type)),
        create_ticket: raw.create_ticket,
        ticket_title: clean_title(&raw.ticket_title, triage_core::DEFAULT_TITLE_MAX_LEN),
        ticket_description: raw.ticket_description,
        severity,
        confidence,
        source: ClassificationSource::Llm,
    })
}

/// Builds the bounded prompt sent to the LLM for one log.
fn build_prompt(ctx: &AnalysisContext) -> String {
    let detail = ctx.detail.as_deref().unwrap_or("(none)");
    format!(
        "Classify the following production error log. Respond with a single JSON object with \
         exactly these fields: error_type (short kebab-case tag), create_ticket (boolean), \
         ticket_title (string, <=120 chars), ticket_description (markdown, with Problem/Likely \
         cause/Suggested action sections), severity (one of \"low\", \"medium\", \"high\"), and \
         confidence (number in [0, 1]).\n\n\
         Service: {service}\nEnvironment: {environment}\nLogger: {logger}\nThread: {thread}\n\
         Occurrences in window: {occurrences}\nMessage: {message}\nDetail: {detail}\n",
        service = ctx.service.as_str(),
        environment = ctx.environment.as_str(),
        logger = ctx.logger,
        thread = ctx.thread,
        occurrences = ctx.occurrence_count,
        message = ctx.normalized_message,
    )
}

// ============================================================================
// SECTION: Analysis Node
// ============================================================================

/// Classifies logs via the LLM, behind a circuit breaker, with a
/// deterministic fallback.
pub struct AnalysisNode {
    llm: SharedLlmClient,
    breaker: CircuitBreaker,
    fallback: FallbackAnalyzer,
    fallback_enabled: bool,
}

impl AnalysisNode {
    /// Creates a new analysis node over `llm`, guarded by a fresh breaker
    /// built from `breaker_config`, with `fallback` as its deterministic backstop.
    #[must_use]
    pub fn new(
        llm: SharedLlmClient,
        breaker: CircuitBreaker,
        fallback: FallbackAnalyzer,
        fallback_enabled: bool,
    ) -> Self {
        Self { llm, breaker, fallback, fallback_enabled }
    }

    /// Classifies `ctx`, trying the LLM first and falling back on any
    /// failure short of cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Cancelled`] if the call was cancelled, or
    /// [`AnalysisError::Unavailable`] if the LLM failed and the fallback
    /// analyzer is disabled by configuration.
    pub fn analyze(&self, ctx: &AnalysisContext) -> Result<Classification, AnalysisError> {
        let prompt = build_prompt(ctx);
        let llm = &self.llm;
        match self.breaker.call(|| llm.complete(&prompt)) {
            Ok(text) => match parse_llm_response(&text) {
                Ok(classification) => Ok(classification),
                Err(()) => self.fallback_or_unavailable(ctx),
            },
            Err(BreakerError::Call(ProviderError::Cancelled)) => Err(AnalysisError::Cancelled),
            Err(BreakerError::CircuitOpen | BreakerError::Call(_)) => self.fallback_or_unavailable(ctx),
        }
    }

    /// Routes to the fallback analyzer, or reports unavailability if
    /// fallback has been disabled by configuration.
    fn fallback_or_unavailable(&self, ctx: &AnalysisContext) -> Result<Classification, AnalysisError> {
        if self.fallback_enabled {
            Ok(self.fallback.classify(ctx))
        } else {
            Err(AnalysisError::Unavailable("llm call failed and fallback is disabled".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use triage_config::CircuitBreakerConfig;
    use triage_core::LlmClient;
    use triage_core::ProviderError;
    use triage_core::SharedLlmClient;

    use super::AnalysisContext;
    use super::AnalysisNode;
    use crate::breaker::CircuitBreaker;
    use crate::error::AnalysisError;
    use crate::fallback::FallbackAnalyzer;

    struct ScriptedLlm {
        response: Result<String, ProviderError>,
    }

    impl LlmClient for ScriptedLlm {
        fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.response.clone()
        }
    }

    fn ctx() -> AnalysisContext {
        AnalysisContext {
            logger: "db.pool".to_string(),
            thread: "worker-1".to_string(),
            normalized_message: "connection to db timed out".to_string(),
            raw_message: "Connection to db-1 timed out after 30000ms".to_string(),
            detail: None,
            service: triage_core::ServiceName::new("checkout"),
            environment: triage_core::EnvironmentName::new("production"),
            occurrence_count: 3,
        }
    }

    fn node(llm_response: Result<String, ProviderError>, fallback_enabled: bool) -> AnalysisNode {
        let llm = SharedLlmClient::from_client(ScriptedLlm { response: llm_response });
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let fallback = FallbackAnalyzer::new().expect("catalog compiles");
        AnalysisNode::new(llm, breaker, fallback, fallback_enabled)
    }

    #[test]
    fn well_formed_llm_response_is_used_directly() {
        let node = node(
            Ok(r#"{"error_type":"db-timeout","create_ticket":true,"ticket_title":"DB timeout",
                   "ticket_description":"desc","severity":"high","confidence":0.9}"#
                .to_string()),
            true,
        );
        let classification = node.analyze(&ctx()).expect("analysis succeeds");
        assert_eq!(classification.error_type.as_str(), "db-timeout");
        assert_eq!(classification.source, triage_core::ClassificationSource::Llm);
    }

    #[test]
    fn malformed_llm_response_routes_to_fallback() {
        let node = node(Ok("not json".to_string()), true);
        let classification = node.analyze(&ctx()).expect("fallback produces a classification");
        assert_eq!(classification.source, triage_core::ClassificationSource::Fallback);
    }

    #[test]
    fn transport_failure_routes_to_fallback() {
        let node = node(Err(ProviderError::Transient("boom".to_string())), true);
        let classification = node.analyze(&ctx()).expect("fallback produces a classification");
        assert_eq!(classification.source, triage_core::ClassificationSource::Fallback);
    }

    #[test]
    fn transport_failure_without_fallback_is_unavailable() {
        let node = node(Err(ProviderError::Transient("boom".to_string())), false);
        let result = node.analyze(&ctx());
        assert!(matches!(result, Err(AnalysisError::Unavailable(_))));
    }

    #[test]
    fn cancellation_propagates_without_touching_fallback() {
        let node = node(Err(ProviderError::Cancelled), true);
        let result = node.analyze(&ctx());
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
    }

    #[test]
    fn missing_severity_defaults_to_medium() {
        let node = node(
            Ok(r#"{"error_type":"x","create_ticket":true,"ticket_title":"t","ticket_description":"d"}"#
                .to_string()),
            true,
        );
        let classification = node.analyze(&ctx()).expect("analysis succeeds");
        assert_eq!(classification.severity, triage_core::Severity::Medium);
    }
}
