// triage-providers/src/llm_client.rs
// ============================================================================
// Module: HTTP LLM Client
// Description: Completes classification prompts against a remote LLM endpoint.
// Purpose: Concrete LlmClient implementation for component §6 complete.
// Dependencies: reqwest, serde_json, triage-config, triage-core
// ============================================================================

//! ## Overview
//! [`HttpLlmClient`] posts `{model, prompt}` to the configured completion
//! endpoint and returns the raw JSON text of the response body, unparsed;
//! per [`LlmClient::complete`]'s contract, interpreting that JSON (including
//! treating malformed JSON as a schema-violation signal) is the analysis
//! node's job, not this provider's.

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::Url;
use serde::Serialize;
use triage_config::LlmConfig;
use triage_core::LlmClient;
use triage_core::ProviderError;

use crate::net;

// ============================================================================
// SECTION: Wire Schema
// ============================================================================

/// Wire payload for a completion request.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    /// Model identifier to request.
    model: &'a str,
    /// Prompt text.
    prompt: &'a str,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// HTTP-backed [`LlmClient`] implementation.
pub struct HttpLlmClient {
    /// Connection and hardening settings, plus the target model identifier.
    config: LlmConfig,
    /// Bearer token read once from `config.http.api_key_env`, if set.
    api_key: Option<String>,
}

impl HttpLlmClient {
    /// Builds a new LLM client from `config`, reading the API key from the
    /// environment variable it names, if any.
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        let api_key = crate::read_api_key(&config.http.api_key_env);
        Self { config, api_key }
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = Url::parse(&self.config.http.base_url)
            .map_err(|err| ProviderError::Permanent(format!("invalid llm base url: {err}")))?;
        let resolved = net::resolve_request_host(&url, &self.config.http)?;
        let request_body = CompletionRequest { model: &self.config.model, prompt };
        let api_key = self.api_key.clone();
        let request_url = url.clone();
        let mut response = net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = client.post(request_url.clone()).json(&request_body);
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        })?;
        if !response.status().is_success() {
            return Err(ProviderError::Permanent(format!("llm endpoint returned status {}", response.status())));
        }
        let bytes = net::read_body_limited(&mut response, self.config.http.max_response_bytes)?;
        String::from_utf8(bytes).map_err(|err| ProviderError::MalformedResponse(format!("llm response not utf-8: {err}")))
    }
}
