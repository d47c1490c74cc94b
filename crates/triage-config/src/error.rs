// triage-config/src/error.rs
// ============================================================================
// Module: Config Errors
// Description: Failure modes for loading and validating the triage config.
// ============================================================================

use thiserror::Error;

/// Errors raised while loading or validating a [`crate::TriageConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error, stringified.
        source: String,
    },
    /// The config file exceeded [`crate::MAX_CONFIG_FILE_SIZE`].
    #[error("config file {path} is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge {
        /// Path that was read.
        path: String,
        /// Actual size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
    /// The file was not valid UTF-8.
    #[error("config file {path} is not valid UTF-8")]
    NotUtf8 {
        /// Path that was read.
        path: String,
    },
    /// The file's contents were not valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: String,
        /// Underlying parser error, stringified.
        source: String,
    },
    /// A field failed validation after parsing.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
