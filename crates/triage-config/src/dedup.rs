// triage-config/src/dedup.rs
// ============================================================================
// Module: Dedup Config
// Description: Thresholds and search limits for the dedup cascade and the
//              similarity engine (component C/D).
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

/// Minimum similarity-threshold value accepted by [`DedupConfig::validate`].
const MIN_UNIT_INTERVAL: f64 = 0.0;
/// Maximum similarity-threshold value accepted by [`DedupConfig::validate`].
const MAX_UNIT_INTERVAL: f64 = 1.0;
/// Upper bound on `search_max_results`, matching the pipeline's resource limits.
const MAX_SEARCH_RESULTS: u32 = 2000;

/// Dedup cascade thresholds and tracker search limits (spec §4.C, §4.D, §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Minimum composite score to declare a similarity duplicate.
    pub similarity_threshold: f64,
    /// Certain-duplicate threshold for the direct-log shortcut.
    pub direct_log_threshold: f64,
    /// Gate for the partial-log-match bonus.
    pub partial_log_threshold: f64,
    /// Maximum number of results requested per tracker search.
    pub search_max_results: u32,
    /// Lookback window, in days, for tracker label and text searches.
    pub search_window_days: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.82,
            direct_log_threshold: 0.90,
            partial_log_threshold: 0.70,
            search_max_results: 200,
            search_window_days: 30,
        }
    }
}

impl DedupConfig {
    /// Validates threshold ranges and search limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a threshold is outside `[0, 1]`,
    /// `search_max_results` is zero or unreasonably large, or
    /// `search_window_days` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_unit_interval("similarity_threshold", self.similarity_threshold)?;
        validate_unit_interval("direct_log_threshold", self.direct_log_threshold)?;
        validate_unit_interval("partial_log_threshold", self.partial_log_threshold)?;
        if self.search_max_results == 0 || self.search_max_results > MAX_SEARCH_RESULTS {
            return Err(ConfigError::Invalid(format!(
                "dedup.search_max_results must be between 1 and {MAX_SEARCH_RESULTS}, got \
                 {}",
                self.search_max_results
            )));
        }
        if self.search_window_days == 0 {
            return Err(ConfigError::Invalid(
                "dedup.search_window_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validates that `value` lies within `[0, 1]`, naming `field` in any error.
fn validate_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(MIN_UNIT_INTERVAL..=MAX_UNIT_INTERVAL).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "dedup.{field} must be between {MIN_UNIT_INTERVAL} and {MAX_UNIT_INTERVAL}, got \
             {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DedupConfig;

    #[test]
    fn defaults_validate() {
        DedupConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let config = DedupConfig { similarity_threshold: 1.5, ..DedupConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_search_window_rejected() {
        let config = DedupConfig { search_window_days: 0, ..DedupConfig::default() };
        assert!(config.validate().is_err());
    }
}
