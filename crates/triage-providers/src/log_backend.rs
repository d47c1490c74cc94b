// triage-providers/src/log_backend.rs
// ============================================================================
// Module: HTTP Log Backend
// Description: Fetches bounded, paginated error logs over HTTP.
// Purpose: Concrete LogBackend implementation for component §6 fetch_logs.
// Dependencies: reqwest, serde_json, triage-config, triage-core
// ============================================================================

//! ## Overview
//! [`HttpLogBackend`] turns a [`LogQuery`] into a single GET request against
//! the configured log-aggregation endpoint, reading the response through the
//! hardened transport in [`crate::net`] and decoding it into [`LogRecord`]s.
//! The wire schema is a simple JSON array of objects; services whose backend
//! differs can implement [`LogBackend`] directly rather than through this type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::Url;
use serde::Deserialize;
use time::OffsetDateTime;
use triage_config::LogBackendConfig;
use triage_core::EnvironmentName;
use triage_core::LogBackend;
use triage_core::LogQuery;
use triage_core::LogRecord;
use triage_core::ProviderError;
use triage_core::ServiceName;

use crate::net;

// ============================================================================
// SECTION: Wire Schema
// ============================================================================

/// Wire representation of a single fetched log entry.
#[derive(Debug, Deserialize)]
struct WireLogRecord {
    /// Logger name.
    logger: String,
    /// Thread or process identifier.
    thread: String,
    /// Raw log message.
    message: String,
    /// Optional structured detail.
    #[serde(default)]
    detail: Option<String>,
    /// RFC 3339 timestamp string.
    timestamp: String,
    /// Number of occurrences within the fetch window.
    #[serde(default = "default_occurrence_count")]
    occurrence_count: u64,
}

/// Default occurrence count for a backend that omits the field.
const fn default_occurrence_count() -> u64 {
    1
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// HTTP-backed [`LogBackend`] implementation.
pub struct HttpLogBackend {
    /// Connection and hardening settings.
    config: LogBackendConfig,
    /// Bearer token read once from `config.http.api_key_env`, if set.
    api_key: Option<String>,
}

impl HttpLogBackend {
    /// Builds a new log backend from `config`, reading the API key from the
    /// environment variable it names, if any.
    #[must_use]
    pub fn new(config: LogBackendConfig) -> Self {
        let api_key = crate::read_api_key(&config.http.api_key_env);
        Self { config, api_key }
    }
}

impl LogBackend for HttpLogBackend {
    fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ProviderError> {
        let url = build_query_url(&self.config.http.base_url, query)?;
        let resolved = net::resolve_request_host(&url, &self.config.http)?;
        let api_key = self.api_key.clone();
        let mut response = net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = client.get(url.clone());
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        })?;
        if !response.status().is_success() {
            return Err(ProviderError::Permanent(format!(
                "log backend returned status {}",
                response.status()
            )));
        }
        let bytes = net::read_body_limited(&mut response, self.config.http.max_response_bytes)?;
        let wire: Vec<WireLogRecord> = serde_json::from_slice(&bytes)
            .map_err(|err| ProviderError::MalformedResponse(format!("invalid log backend response: {err}")))?;
        wire.into_iter()
            .map(|entry| to_log_record(entry, query))
            .collect::<Result<Vec<_>, _>>()
    }
}

/// Converts a wire record into a [`LogRecord`], attaching the query's
/// service and environment since the backend is queried per-service.
fn to_log_record(entry: WireLogRecord, query: &LogQuery) -> Result<LogRecord, ProviderError> {
    let timestamp = OffsetDateTime::parse(&entry.timestamp, &time::format_description::well_known::Rfc3339)
        .map_err(|err| ProviderError::MalformedResponse(format!("invalid log timestamp: {err}")))?;
    Ok(LogRecord {
        logger: entry.logger,
        thread: entry.thread,
        message: entry.message,
        detail: entry.detail,
        timestamp,
        service: ServiceName::new(query.service.as_str()),
        environment: EnvironmentName::new(query.environment.as_str()),
        occurrence_count: entry.occurrence_count,
    })
}

/// Builds the fetch URL from `base_url` and `query`'s filters.
fn build_query_url(base_url: &str, query: &LogQuery) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base_url)
        .map_err(|err| ProviderError::Permanent(format!("invalid log backend base url: {err}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("service", query.service.as_str());
        pairs.append_pair("environment", query.environment.as_str());
        pairs.append_pair("window_hours", &query.window_hours.to_string());
        pairs.append_pair("limit", &query.limit.to_string());
        for (key, value) in &query.extra_filters {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use triage_core::EnvironmentName;
    use triage_core::ServiceName;

    use super::build_query_url;
    use triage_core::LogQuery;

    #[test]
    fn build_query_url_includes_filters() {
        let query = LogQuery {
            service: ServiceName::new("checkout"),
            environment: EnvironmentName::new("production"),
            window_hours: 24,
            limit: 50,
            extra_filters: vec![("min_level".to_string(), "error".to_string())],
        };
        let url = build_query_url("https://logs.example.test/api/v1/search", &query).expect("build url");
        let query_string = url.query().expect("query string present");
        assert!(query_string.contains("service=checkout"));
        assert!(query_string.contains("min_level=error"));
    }
}
