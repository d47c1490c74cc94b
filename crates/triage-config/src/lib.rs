// triage-config/src/lib.rs
// ============================================================================
// Crate: triage-config
// Description: TOML configuration loading, validation, and defaulting for
//              the entire triage pipeline configuration surface.
// Purpose: Give every other crate one frozen, validated config object.
// Dependencies: serde, toml, thiserror, triage-cache
// ============================================================================

//! ## Overview
//! [`TriageConfig`] is the single entry point: it loads a TOML file,
//! defaults every field not present, and validates the result before any
//! pipeline component is constructed. Per spec §9, configuration is read
//! once and frozen; there are no module-level globals or mutable statics
//! here.

#![forbid(unsafe_code)]

mod audit;
mod cache;
mod circuit;
mod dedup;
mod error;
mod pipeline;
mod providers;
mod root;
mod ticket;

pub use audit::AuditBackendKind;
pub use audit::AuditConfig;
pub use cache::CacheConfig;
pub use circuit::CircuitBreakerConfig;
pub use dedup::DedupConfig;
pub use error::ConfigError;
pub use pipeline::PipelineConfig;
pub use providers::DistributedCacheConfig;
pub use providers::FingerprintStoreBackendKind;
pub use providers::FingerprintStoreConfig;
pub use providers::HttpEndpointConfig;
pub use providers::IssueTrackerConfig;
pub use providers::LlmConfig;
pub use providers::LogBackendConfig;
pub use providers::ProvidersConfig;
pub use root::DEFAULT_CONFIG_PATH;
pub use root::MAX_CONFIG_FILE_SIZE;
pub use root::TriageConfig;
pub use ticket::TicketConfig;
