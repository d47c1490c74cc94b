// triage-providers/src/distributed_cache.rs
// ============================================================================
// Module: HTTP Distributed Cache Transport
// Description: Adapts a small REST key/value surface to triage-cache's
//              `DistributedKvClient` contract.
// Purpose: Give the `distributed` cache backend (component B) a concrete,
//          network-facing transport instead of leaving it permanently
//          unreachable behind the fallback chain.
// Dependencies: reqwest, serde_json, triage-cache, triage-config, triage-core
// ============================================================================

//! ## Overview
//! [`HttpDistributedCache`] maps [`DistributedKvClient`] onto `GET`/`PUT`/
//! `DELETE {base_url}/kv/{key}` and `DELETE {base_url}/kv` for `clear`,
//! sharing the same hardened transport as every other HTTP provider in this
//! crate. A 404 on `get` is a plain miss, not an error; per the distributed
//! backend's parity contract, any other transport failure is also folded
//! into a miss rather than propagated, so a flaky remote cache degrades the
//! hit rate instead of aborting the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use triage_cache::CacheError;
use triage_cache::DistributedKvClient;
use triage_config::DistributedCacheConfig;

use crate::net;

// ============================================================================
// SECTION: Wire Schema
// ============================================================================

/// Wire payload for a `PUT {base_url}/kv/{key}` write.
#[derive(Debug, Serialize)]
struct PutRequest {
    /// The value to store, opaque to the transport.
    value: Value,
    /// Remaining lifetime of the entry, in seconds.
    ttl_seconds: u64,
}

/// Wire response for a `GET {base_url}/kv/{key}` read.
#[derive(Debug, Deserialize)]
struct GetResponse {
    /// The stored value.
    value: Value,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// HTTP-backed [`DistributedKvClient`] implementation.
pub struct HttpDistributedCache {
    /// Connection and hardening settings.
    config: DistributedCacheConfig,
    /// Bearer token read once from `config.http.api_key_env`, if set.
    api_key: Option<String>,
}

impl HttpDistributedCache {
    /// Builds a new distributed cache transport from `config`, reading the
    /// API key from the environment variable it names, if any.
    #[must_use]
    pub fn new(config: DistributedCacheConfig) -> Self {
        let api_key = crate::read_api_key(&config.http.api_key_env);
        Self { config, api_key }
    }

    /// Builds the `{base_url}/kv/{key}` URL for a single-entry operation.
    fn key_url(&self, key: &str) -> Result<Url, CacheError> {
        let mut url = Url::parse(&self.config.http.base_url)
            .map_err(|err| CacheError::Io(format!("invalid distributed cache base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| CacheError::Io("distributed cache base url cannot be a base".to_string()))?
            .extend(["kv", key]);
        Ok(url)
    }

    /// Builds the `{base_url}/kv` URL for the namespace-wide `clear` operation.
    fn namespace_url(&self) -> Result<Url, CacheError> {
        let mut url = Url::parse(&self.config.http.base_url)
            .map_err(|err| CacheError::Io(format!("invalid distributed cache base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| CacheError::Io("distributed cache base url cannot be a base".to_string()))?
            .push("kv");
        Ok(url)
    }
}

impl DistributedKvClient for HttpDistributedCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let url = self.key_url(key)?;
        let resolved = match net::resolve_request_host(&url, &self.config.http) {
            Ok(resolved) => resolved,
            Err(_) => return Ok(None),
        };
        let api_key = self.api_key.clone();
        let request_url = url.clone();
        let response = net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = client.get(request_url.clone());
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        });
        let mut response = match response {
            Ok(response) => response,
            Err(_) => return Ok(None),
        };
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Ok(None);
        }
        let Ok(bytes) = net::read_body_limited(&mut response, self.config.http.max_response_bytes) else {
            return Ok(None);
        };
        let parsed: Result<GetResponse, _> = serde_json::from_slice(&bytes);
        Ok(parsed.ok().map(|body| body.value))
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let url = self.key_url(key)?;
        let resolved = net::resolve_request_host(&url, &self.config.http)
            .map_err(|err| CacheError::Transient(err.to_string()))?;
        let api_key = self.api_key.clone();
        let request_url = url.clone();
        let body = PutRequest { value, ttl_seconds: ttl.as_secs() };
        let payload = serde_json::to_value(&body).map_err(|err| CacheError::Serialize(err.to_string()))?;
        net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = client.put(request_url.clone()).json(&payload);
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        })
        .map_err(|err| CacheError::Transient(err.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let url = self.key_url(key)?;
        let resolved = net::resolve_request_host(&url, &self.config.http)
            .map_err(|err| CacheError::Transient(err.to_string()))?;
        let api_key = self.api_key.clone();
        let request_url = url.clone();
        net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = client.delete(request_url.clone());
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        })
        .map_err(|err| CacheError::Transient(err.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let url = self.namespace_url()?;
        let resolved = net::resolve_request_host(&url, &self.config.http)
            .map_err(|err| CacheError::Transient(err.to_string()))?;
        let api_key = self.api_key.clone();
        let request_url = url.clone();
        net::send_pinned_request(&self.config.http, &resolved, move |client| {
            let mut request = client.delete(request_url.clone());
            if let Some(key) = &api_key {
                request = request.bearer_auth(key);
            }
            request
        })
        .map_err(|err| CacheError::Transient(err.to_string()))?;
        Ok(())
    }
}
