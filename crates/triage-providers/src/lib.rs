// triage-providers/src/lib.rs
// ============================================================================
// Crate: triage-providers
// Description: SSRF-hardened `reqwest::blocking` implementations of the log
//              backend, issue tracker, LLM, and distributed cache consumer
//              contracts, plus a JSON-file persistent fingerprint store.
// Purpose: Give the pipeline concrete, network-facing collaborators without
//          any crate above this one depending on `reqwest` directly.
// Dependencies: reqwest, serde, serde_json, triage-cache, triage-config,
//               triage-core, url
// ============================================================================

//! ## Overview
//! Every type this crate exposes implements one of `triage_core`'s consumer
//! contracts (`LogBackend`, `IssueTracker`, `LlmClient`, `FingerprintStore`)
//! or `triage_cache`'s `DistributedKvClient` transport contract, and is
//! constructed from the matching plain config struct in `triage_config`.
//! Outbound HTTP requests all route through [`net`], which enforces scheme
//! allowlisting, DNS pinning, private-network rejection, and response size
//! caps before a byte of the body is read.

#![forbid(unsafe_code)]

mod distributed_cache;
mod fingerprint_store;
mod issue_tracker;
mod llm_client;
mod log_backend;
mod net;

pub use distributed_cache::HttpDistributedCache;
pub use fingerprint_store::JsonFileFingerprintStore;
pub use issue_tracker::HttpIssueTracker;
pub use llm_client::HttpLlmClient;
pub use log_backend::HttpLogBackend;

/// Reads an API key from the named environment variable, returning `None`
/// when the variable name is empty or the variable is unset or empty.
fn read_api_key(env_var: &str) -> Option<String> {
    if env_var.is_empty() {
        return None;
    }
    std::env::var(env_var).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::read_api_key;

    #[test]
    fn read_api_key_ignores_unset_env_var() {
        assert_eq!(read_api_key(""), None);
        assert_eq!(read_api_key("TRIAGE_PROVIDERS_TEST_UNSET_VAR_XYZ"), None);
    }
}
