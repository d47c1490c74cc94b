// triage-config/src/pipeline.rs
// ============================================================================
// Module: Pipeline Config
// Description: Worker pool sizing, rate limiting, and deadlines (component J).
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

/// Minimum allowed worker count (spec §6).
const MIN_WORKERS: usize = 1;
/// Maximum allowed worker count (spec §6).
const MAX_WORKERS: usize = 20;

/// Worker pool and resource-limit configuration (spec §4.J, §5, §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads in the bounded pool.
    pub workers: usize,
    /// Token-bucket refill rate, in tokens per second.
    pub rate_per_second: f64,
    /// Per-log task deadline, in seconds.
    pub task_timeout_seconds: u64,
    /// Optional pool-wide deadline, in seconds; absent by default.
    pub pool_deadline_seconds: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            rate_per_second: 10.0,
            task_timeout_seconds: 60,
            pool_deadline_seconds: None,
        }
    }
}

impl PipelineConfig {
    /// Validates worker count, rate, and timeout bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `workers` is outside
    /// `[1, 20]`, `rate_per_second` is not positive and finite, or
    /// `task_timeout_seconds` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.workers must be between {MIN_WORKERS} and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if !(self.rate_per_second.is_finite() && self.rate_per_second > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.rate_per_second must be a positive finite number, got \
                 {}",
                self.rate_per_second
            )));
        }
        if self.task_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.task_timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineConfig;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn zero_workers_rejected() {
        let config = PipelineConfig { workers: 0, ..PipelineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn too_many_workers_rejected() {
        let config = PipelineConfig { workers: 21, ..PipelineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_rate_rejected() {
        let config = PipelineConfig { rate_per_second: 0.0, ..PipelineConfig::default() };
        assert!(config.validate().is_err());
    }
}
