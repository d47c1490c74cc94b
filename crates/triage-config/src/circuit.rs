// triage-config/src/circuit.rs
// ============================================================================
// Module: Circuit Breaker Config
// Description: Thresholds and timing for the LLM-call circuit breaker (component F).
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

/// Circuit breaker thresholds and timing (spec §4.F).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` state before tripping to `Open`.
    pub failure_threshold: u32,
    /// Seconds spent in `Open` before transitioning to `HalfOpen`.
    pub timeout_seconds: u64,
    /// Probe calls permitted while `HalfOpen`.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 3, timeout_seconds: 30, half_open_max_calls: 2 }
    }
}

impl CircuitBreakerConfig {
    /// Validates that every field is at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if any field is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "circuit.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.half_open_max_calls == 0 {
            return Err(ConfigError::Invalid(
                "circuit.half_open_max_calls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
