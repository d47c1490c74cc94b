// triage-providers/src/issue_tracker.rs
// ============================================================================
// Module: HTTP Issue Tracker
// Description: Searches, creates, comments on, and labels tracker issues over HTTP.
// Purpose: Concrete IssueTracker implementation for component §6.
// Dependencies: reqwest, serde_json, triage-config, triage-core
// ============================================================================

//! ## Overview
//! [`HttpIssueTracker`] maps the [`IssueTracker`] trait onto a small REST
//! surface: `GET {base_url}/issues?...` for [`IssueTracker::search`], `POST
//! {base_url}/issues` for [`IssueTracker::create`], and `POST
//! {base_url}/issues/{key}/comments` / `POST {base_url}/issues/{key}/labels`
//! for the remaining two operations. All four routes share the same
//! hardened transport and `project` scoping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use triage_config::IssueTrackerConfig;
use triage_core::Issue;
use triage_core::IssueKey;
use triage_core::IssueSearchQuery;
use triage_core::IssueTracker;
use triage_core::ProviderError;
use triage_core::TicketPayload;

use crate::net;

// ============================================================================
// SECTION: Wire Schema
// ============================================================================

/// Wire representation of a tracker issue.
#[derive(Debug, Deserialize)]
struct WireIssue {
    /// Tracker key.
    key: String,
    /// Issue title.
    title: String,
    /// Issue description.
    #[serde(default)]
    description: String,
    /// Labels currently attached.
    #[serde(default)]
    labels: Vec<String>,
    /// Current status.
    #[serde(default)]
    status: String,
}

/// Wire response wrapper for a search request.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Matching issues.
    #[serde(default)]
    issues: Vec<WireIssue>,
}

/// Wire response wrapper for a create request.
#[derive(Debug, Deserialize)]
struct CreateResponse {
    /// Key assigned to the newly created issue.
    key: String,
}

/// Wire payload for a create request.
#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    /// Project scope.
    project: &'a str,
    /// Ticket title.
    title: &'a str,
    /// Ticket description.
    description: &'a str,
    /// Labels to attach.
    labels: Vec<&'a str>,
    /// Tracker priority string.
    priority: &'a str,
}

/// Wire payload for a comment request.
#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    /// Comment body.
    body: &'a str,
}

/// Wire payload for a label request.
#[derive(Debug, Serialize)]
struct LabelRequest<'a> {
    /// Labels to ensure are present.
    labels: &'a [String],
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// HTTP-backed [`IssueTracker`] implementation.
pub struct HttpIssueTracker {
    /// Connection and hardening settings, plus the scoping project key.
    config: IssueTrackerConfig,
    /// Bearer token read once from `config.http.api_key_env`, if set.
    api_key: Option<String>,
}

impl HttpIssueTracker {
    /// Builds a new issue tracker from `config`, reading the API key from
    /// the environment variable it names, if any.
    #[must_use]
    pub fn new(config: IssueTrackerConfig) -> Self {
        let api_key = crate::read_api_key(&config.http.api_key_env);
        Self { config, api_key }
    }

    /// Sends a GET (`body` is `None`) or JSON POST (`body` is `Some`) to
    /// `url` through the hardened transport and reads the response body
    /// under the configured response size cap.
    fn request(&self, url: Url, body: Option<serde_json::Value>) -> Result<Vec<u8>, ProviderError> {
        let resolved = net::resolve_request_host(&url, &self.config.http)?;
        let api_key = self.api_key.clone();
        let request_url = url.clone();
        let mut response = net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = body
                .as_ref()
                .map_or_else(|| client.get(request_url.clone()), |body| client.post(request_url.clone()).json(body));
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        })?;
        if !response.status().is_success() {
            return Err(ProviderError::Permanent(format!("issue tracker returned status {}", response.status())));
        }
        net::read_body_limited(&mut response, self.config.http.max_response_bytes)
    }
}

impl IssueTracker for HttpIssueTracker {
    fn search(&self, query: &IssueSearchQuery) -> Result<Vec<Issue>, ProviderError> {
        let mut url = Url::parse(&self.config.http.base_url)
            .map_err(|err| ProviderError::Permanent(format!("invalid issue tracker base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Permanent("issue tracker base url cannot be a base".to_string()))?
            .push("issues");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("project", &self.config.project);
            pairs.append_pair("max_results", &query.max_results.to_string());
            pairs.append_pair("window_days", &query.window_days.to_string());
            for label in &query.labels {
                pairs.append_pair("label", label);
            }
            for token in &query.tokens {
                pairs.append_pair("token", token);
            }
        }
        let bytes = self.request(url, None)?;
        let parsed: SearchResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProviderError::MalformedResponse(format!("invalid issue search response: {err}")))?;
        Ok(parsed.issues.into_iter().map(to_issue).collect())
    }

    fn create(&self, payload: &TicketPayload) -> Result<IssueKey, ProviderError> {
        let mut url = Url::parse(&self.config.http.base_url)
            .map_err(|err| ProviderError::Permanent(format!("invalid issue tracker base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Permanent("issue tracker base url cannot be a base".to_string()))?
            .push("issues");
        let request_body = CreateRequest {
            project: &self.config.project,
            title: &payload.title,
            description: &payload.description,
            labels: payload.labels.iter().map(String::as_str).collect(),
            priority: payload.priority,
        };
        let body = serde_json::to_value(&request_body)
            .map_err(|err| ProviderError::Permanent(format!("failed to encode issue create payload: {err}")))?;
        let bytes = self.request(url, Some(body))?;
        let parsed: CreateResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProviderError::MalformedResponse(format!("invalid issue create response: {err}")))?;
        Ok(IssueKey::new(parsed.key))
    }

    fn add_comment(&self, issue_key: &IssueKey, body: &str) -> Result<(), ProviderError> {
        let mut url = Url::parse(&self.config.http.base_url)
            .map_err(|err| ProviderError::Permanent(format!("invalid issue tracker base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Permanent("issue tracker base url cannot be a base".to_string()))?
            .extend(["issues", issue_key.as_str(), "comments"]);
        let request_body = CommentRequest { body };
        let body = serde_json::to_value(&request_body)
            .map_err(|err| ProviderError::Permanent(format!("failed to encode comment payload: {err}")))?;
        self.request(url, Some(body))?;
        Ok(())
    }

    fn add_labels(&self, issue_key: &IssueKey, labels: &[String]) -> Result<(), ProviderError> {
        let mut url = Url::parse(&self.config.http.base_url)
            .map_err(|err| ProviderError::Permanent(format!("invalid issue tracker base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Permanent("issue tracker base url cannot be a base".to_string()))?
            .extend(["issues", issue_key.as_str(), "labels"]);
        let request_body = LabelRequest { labels };
        let body = serde_json::to_value(&request_body)
            .map_err(|err| ProviderError::Permanent(format!("failed to encode label payload: {err}")))?;
        self.request(url, Some(body))?;
        Ok(())
    }
}

/// Converts a wire issue into the shared [`Issue`] model type.
fn to_issue(wire: WireIssue) -> Issue {
    Issue {
        key: IssueKey::new(wire.key),
        title: wire.title,
        description: wire.description,
        labels: wire.labels.into_iter().collect(),
        status: wire.status,
    }
}

#[cfg(test)]
mod tests {
    use triage_config::IssueTrackerConfig;

    use super::HttpIssueTracker;

    #[test]
    fn new_without_api_key_env_has_no_key() {
        let config = IssueTrackerConfig { project: "TRIAGE".to_string(), ..IssueTrackerConfig::default() };
        let tracker = HttpIssueTracker::new(config);
        assert!(tracker.api_key.is_none());
    }
}
