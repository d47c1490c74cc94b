// triage-similarity/src/engine.rs
// ============================================================================
// Module: Similarity Engine
// Description: Weighted title/description scoring with capped bonuses and a
//              cached best-match lookup over a candidate issue set.
// Purpose: Back the error-type and broad similarity dedup strategies.
// Dependencies: serde, serde_json, triage-cache, triage-core
// ============================================================================

//! ## Overview
//! `score` computes a single `[0, 1]` value for one candidate pair;
//! `find_best` runs it over every candidate, applies the configured
//! thresholds, and returns the highest-scoring match, breaking ties by the
//! lexicographically smallest issue key. `find_best` is the cached entry
//! point: results are keyed by the input log's `(title, error_type,
//! logger)` signature, since a repeated signature is expected to see the
//! same candidate set and resolve to the same outcome within the cache TTL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use triage_cache::Cache;
use triage_cache::CacheError;
use triage_core::ErrorType;
use triage_core::IssueKey;

use crate::ratio::jaccard;
use crate::ratio::token_set_ratio;
use crate::ratio::tokenize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while scoring or consulting the result cache.
#[derive(Debug, Error)]
pub enum SimilarityError {
    /// The underlying cache backend failed.
    #[error("similarity cache error: {0}")]
    Cache(#[from] CacheError),
    /// A cached entry could not be decoded.
    #[error("similarity cache entry corrupt: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Tunable weights, bonuses, and thresholds for [`SimilarityEngine`].
#[derive(Debug, Clone, Copy)]
pub struct SimilarityConfig {
    /// Weight applied to title similarity.
    pub title_weight: f64,
    /// Weight applied to description similarity.
    pub description_weight: f64,
    /// Bonus applied when both sides carry the same error type.
    pub error_type_bonus: f64,
    /// Bonus applied when both sides carry the same logger name.
    pub logger_bonus: f64,
    /// Bonus applied when normalized-token Jaccard overlap meets the threshold.
    pub token_overlap_bonus: f64,
    /// Minimum Jaccard overlap required for [`Self::token_overlap_bonus`].
    pub token_overlap_threshold: f64,
    /// Bonus applied when the current log fuzzy-matches text extracted from
    /// the candidate's description, at or above [`Self::partial_log_threshold`].
    pub partial_log_bonus: f64,
    /// Certain-duplicate threshold for the current log against an issue's
    /// extracted original log text.
    pub direct_log_threshold: f64,
    /// Minimum composite score to declare a similarity duplicate.
    pub similarity_threshold: f64,
    /// Gate for [`Self::partial_log_bonus`]: minimum fuzzy match between the
    /// current log and a candidate's extracted original log text.
    pub partial_log_threshold: f64,
    /// How long a cached `find_best` result remains valid.
    pub cache_ttl: Duration,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.60,
            description_weight: 0.30,
            error_type_bonus: 0.10,
            logger_bonus: 0.05,
            token_overlap_bonus: 0.05,
            token_overlap_threshold: 0.5,
            partial_log_bonus: 0.05,
            direct_log_threshold: 0.90,
            similarity_threshold: 0.82,
            partial_log_threshold: 0.70,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// The log side of a similarity comparison.
#[derive(Debug, Clone)]
pub struct SimilarityInput {
    /// Cleaned candidate ticket title for the current log.
    pub title: String,
    /// Candidate ticket description for the current log.
    pub description: String,
    /// Classified error type, if known.
    pub error_type: Option<ErrorType>,
    /// Logger name that emitted the current log, if known.
    pub logger: Option<String>,
    /// Normalized current log text, used for the direct-log and partial-log checks.
    pub normalized_current_log: Option<String>,
}

/// One existing tracker issue considered as a dedup candidate.
#[derive(Debug, Clone)]
pub struct CandidateIssue {
    /// Tracker key of the candidate.
    pub key: IssueKey,
    /// Candidate's current title.
    pub title: String,
    /// Candidate's current description.
    pub description: String,
    /// Error type tag carried by the candidate, if derivable from its labels.
    pub error_type: Option<ErrorType>,
    /// Logger name carried by the candidate, if present in its description.
    pub logger: Option<String>,
    /// Original log text extracted from the candidate's description, if any.
    pub original_log_extract: Option<String>,
}

/// Outcome of [`SimilarityEngine::find_best`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// Key of the matching issue.
    pub issue_key: IssueKey,
    /// Composite score that produced the match.
    pub score: f64,
    /// Matching issue's title, for audit/logging convenience.
    pub title: String,
    /// Whether this match was decided by the direct-log threshold rather
    /// than the composite similarity threshold.
    pub direct_log_hit: bool,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Scores log/issue pairs and caches the resolved best match per input signature.
pub struct SimilarityEngine {
    /// Weights, bonuses, and thresholds.
    config: SimilarityConfig,
    /// Result cache, keyed by the input's `(title, error_type, logger)` signature.
    cache: Arc<dyn Cache + Send + Sync>,
}

impl SimilarityEngine {
    /// Builds an engine over the given cache handle.
    #[must_use]
    pub fn new(config: SimilarityConfig, cache: Arc<dyn Cache + Send + Sync>) -> Self {
        Self { config, cache }
    }

    /// Scores `input` against a single `candidate`, applying all bonuses and
    /// capping the result at `1.0`.
    #[must_use]
    pub fn score(&self, input: &SimilarityInput, candidate: &CandidateIssue) -> f64 {
        let title_sim = token_set_ratio(&input.title, &candidate.title);
        let desc_sim = token_set_ratio(&input.description, &candidate.description);
        let mut score =
            self.config.title_weight * title_sim + self.config.description_weight * desc_sim;

        if let (Some(a), Some(b)) = (&input.error_type, &candidate.error_type) {
            if a == b {
                score += self.config.error_type_bonus;
            }
        }
        if let (Some(a), Some(b)) = (&input.logger, &candidate.logger) {
            if a == b {
                score += self.config.logger_bonus;
            }
        }
        let token_overlap =
            jaccard(&tokenize(&input.title), &tokenize(&candidate.title));
        if token_overlap >= self.config.token_overlap_threshold {
            score += self.config.token_overlap_bonus;
        }
        if let (Some(current_log), Some(extract)) =
            (&input.normalized_current_log, &candidate.original_log_extract)
        {
            if token_set_ratio(current_log, extract) >= self.config.partial_log_threshold {
                score += self.config.partial_log_bonus;
            }
        }
        score.min(1.0)
    }

    /// Checks whether `input`'s normalized current log certainly matches
    /// `candidate`'s extracted original log text (the direct-log shortcut).
    #[must_use]
    pub fn direct_log_hit(&self, input: &SimilarityInput, candidate: &CandidateIssue) -> bool {
        match (&input.normalized_current_log, &candidate.original_log_extract) {
            (Some(current_log), Some(extract)) => {
                token_set_ratio(current_log, extract) >= self.config.direct_log_threshold
            }
            _ => false,
        }
    }

    /// Finds the best-scoring candidate for `input`, consulting and
    /// populating the result cache first.
    ///
    /// Returns `None` if no candidate reaches [`SimilarityConfig::similarity_threshold`]
    /// (or the direct-log shortcut). Ties are broken by the lexicographically
    /// smallest issue key.
    ///
    /// # Errors
    ///
    /// Returns [`SimilarityError`] if the cache backend fails or a cached
    /// entry cannot be decoded.
    pub fn find_best(
        &self,
        input: &SimilarityInput,
        candidates: &[CandidateIssue],
    ) -> Result<Option<SimilarityMatch>, SimilarityError> {
        let cache_key = cache_key_for(input);
        if let Some(cached) = self.cache.get(&cache_key)? {
            return Self::decode_cached(cached);
        }

        let result = self.compute_best(input, candidates);
        let encoded = match &result {
            Some(found) => {
                serde_json::to_value(found).map_err(|err| SimilarityError::Corrupt(err.to_string()))?
            }
            None => serde_json::Value::Null,
        };
        self.cache.set(&cache_key, encoded, self.config.cache_ttl)?;
        Ok(result)
    }

    /// Computes the best match without touching the cache.
    fn compute_best(
        &self,
        input: &SimilarityInput,
        candidates: &[CandidateIssue],
    ) -> Option<SimilarityMatch> {
        let mut best: Option<SimilarityMatch> = None;
        for candidate in candidates {
            if self.direct_log_hit(input, candidate) {
                let found = SimilarityMatch {
                    issue_key: candidate.key.clone(),
                    score: 1.0,
                    title: candidate.title.clone(),
                    direct_log_hit: true,
                };
                best = Some(Self::better(best, found));
                continue;
            }
            let score = self.score(input, candidate);
            if score >= self.config.similarity_threshold {
                let found = SimilarityMatch {
                    issue_key: candidate.key.clone(),
                    score,
                    title: candidate.title.clone(),
                    direct_log_hit: false,
                };
                best = Some(Self::better(best, found));
            }
        }
        best
    }

    /// Returns whichever of `current`/`candidate` wins under score-then-key
    /// ordering: higher score wins; on a tie, the lexicographically smallest
    /// issue key wins.
    fn better(current: Option<SimilarityMatch>, candidate: SimilarityMatch) -> SimilarityMatch {
        match current {
            None => candidate,
            Some(existing) => {
                if candidate.score > existing.score {
                    candidate
                } else if candidate.score < existing.score {
                    existing
                } else if candidate.issue_key < existing.issue_key {
                    candidate
                } else {
                    existing
                }
            }
        }
    }

    /// Decodes a cached `find_best` result, tolerating the `null` no-match sentinel.
    fn decode_cached(
        value: serde_json::Value,
    ) -> Result<Option<SimilarityMatch>, SimilarityError> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| SimilarityError::Corrupt(err.to_string()))
    }
}

/// Builds the cache key for an input's `(title, error_type, logger)` signature.
fn cache_key_for(input: &SimilarityInput) -> String {
    let error_type = input.error_type.as_ref().map_or("", |value| value.as_str());
    let logger = input.logger.as_deref().unwrap_or("");
    format!("similarity:{}|{}|{}", input.title, error_type, logger)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use triage_cache::MemoryCache;
    use triage_core::ErrorType;
    use triage_core::IssueKey;

    use super::CandidateIssue;
    use super::SimilarityConfig;
    use super::SimilarityEngine;
    use super::SimilarityInput;

    fn input(title: &str, error_type: &str) -> SimilarityInput {
        SimilarityInput {
            title: title.to_string(),
            description: "connection refused while talking to the database pool".to_string(),
            error_type: Some(ErrorType::new(error_type)),
            logger: Some("db.pool".to_string()),
            normalized_current_log: Some("connection refused talking database pool".to_string()),
        }
    }

    fn candidate(key: &str, title: &str, error_type: &str) -> CandidateIssue {
        CandidateIssue {
            key: IssueKey::new(key),
            title: title.to_string(),
            description: "connection refused while talking to the database pool".to_string(),
            error_type: Some(ErrorType::new(error_type)),
            logger: Some("db.pool".to_string()),
            original_log_extract: Some(
                "connection refused talking database pool".to_string(),
            ),
        }
    }

    fn engine() -> SimilarityEngine {
        let cache = Arc::new(MemoryCache::new(100));
        SimilarityEngine::new(SimilarityConfig::default(), cache)
    }

    #[test]
    fn identical_pair_scores_at_or_above_one() {
        let engine = engine();
        let input = input("database connection timeout", "db-timeout");
        let candidate = candidate("T-1", "database connection timeout", "db-timeout");
        assert!((engine.score(&input, &candidate) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn direct_log_hit_wins_regardless_of_title_drift() {
        let engine = engine();
        let input = input("database connection timeout", "db-timeout");
        let candidate = candidate("T-1", "totally different title text", "other-type");
        assert!(engine.direct_log_hit(&input, &candidate));
    }

    #[test]
    fn find_best_breaks_ties_by_lexicographically_smallest_key() {
        let engine = engine();
        let input = input("database connection timeout", "db-timeout");
        let candidates = vec![
            candidate("T-9", "database connection timeout", "db-timeout"),
            candidate("T-2", "database connection timeout", "db-timeout"),
        ];
        let found = engine.find_best(&input, &candidates).expect("find_best succeeds");
        assert_eq!(found.expect("match found").issue_key, IssueKey::new("T-2"));
    }

    #[test]
    fn find_best_caches_result_across_calls() {
        let engine = engine();
        let input = input("database connection timeout", "db-timeout");
        let candidates = vec![candidate("T-1", "database connection timeout", "db-timeout")];
        let first = engine.find_best(&input, &candidates).expect("first call succeeds");
        let second = engine.find_best(&input, &[]).expect("second call succeeds");
        assert_eq!(first, second);
    }

    #[test]
    fn below_threshold_candidates_yield_no_match() {
        let engine = engine();
        let input = SimilarityInput {
            title: "database connection timeout".to_string(),
            description: "connection refused while talking to the database pool".to_string(),
            error_type: Some(ErrorType::new("db-timeout")),
            logger: Some("db.pool".to_string()),
            normalized_current_log: None,
        };
        let candidates = vec![CandidateIssue {
            key: IssueKey::new("T-1"),
            title: "completely unrelated ticket about billing exports".to_string(),
            description: "billing export job failed to write the nightly CSV".to_string(),
            error_type: Some(ErrorType::new("billing-export")),
            logger: Some("billing.export".to_string()),
            original_log_extract: None,
        }];
        let found = engine.find_best(&input, &candidates).expect("find_best succeeds");
        assert!(found.is_none());
    }
}
