// triage-core/src/core/identifiers.rs
// ============================================================================
// Module: Triage Identifiers
// Description: Canonical opaque identifiers used throughout the triage pipeline.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! the triage pipeline. Identifiers are opaque and serialize as strings.
//! Validation (e.g. hex-length checks on fingerprints) is handled at
//! construction boundaries rather than within these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Stable 12-hex fingerprint identity of a log for in-run and cross-run dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Creates a new fingerprint from its 12-hex string form.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tracker label form, e.g. `fingerprint-<hex>`.
    #[must_use]
    pub fn as_label(&self) -> String {
        format!("fingerprint-{}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Stable 12-hex loghash used as an issue label for O(1) lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Loghash(String);

impl Loghash {
    /// Creates a new loghash from its 12-hex string form.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Returns the loghash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tracker label form, e.g. `loghash-<hex>`.
    #[must_use]
    pub fn as_label(&self) -> String {
        format!("loghash-{}", self.0)
    }
}

impl fmt::Display for Loghash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Loghash {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Loghash {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Issue tracker key, e.g. `T-100`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    /// Creates a new issue key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for IssueKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IssueKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Service name a log record originates from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new service name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the service name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ServiceName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Deployment environment a log record originates from (e.g. `production`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    /// Creates a new environment name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the environment name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EnvironmentName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EnvironmentName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Kebab-case error-type tag produced by classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorType(String);

impl ErrorType {
    /// Creates a new error type tag, without enforcing kebab-case here;
    /// callers normalize via [`crate::core::normalize::to_kebab_case`].
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the error type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tracker label form, e.g. `error_type-<tag>`.
    #[must_use]
    pub fn as_label(&self) -> String {
        format!("error_type-{}", self.0)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ErrorType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ErrorType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Stable name of a dedup strategy, used in audit records and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    /// In-process set of fingerprints seen earlier in the same run.
    InMemorySeenLogs,
    /// Persistent fingerprint store lookup.
    FingerprintCache,
    /// Tracker search by exact `loghash-<hex>` label.
    LoghashLabelSearch,
    /// Tracker search by `error_type-<tag>` label plus similarity scoring.
    ErrorTypeLabelSearch,
    /// Broad tracker search scored by the similarity engine.
    SimilaritySearch,
}

impl StrategyName {
    /// Returns the strategy name as a stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InMemorySeenLogs => "in_memory_seen_logs",
            Self::FingerprintCache => "fingerprint_cache",
            Self::LoghashLabelSearch => "loghash_label_search",
            Self::ErrorTypeLabelSearch => "error_type_label_search",
            Self::SimilaritySearch => "similarity_search",
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Fingerprint;
    use super::Loghash;

    #[test]
    fn fingerprint_label_format() {
        let fp = Fingerprint::new("abc123def456");
        assert_eq!(fp.as_label(), "fingerprint-abc123def456");
    }

    #[test]
    fn loghash_label_format() {
        let lh = Loghash::new("abc123def456");
        assert_eq!(lh.as_label(), "loghash-abc123def456");
    }
}
