//! Pipeline configuration.

use std::time::Duration;

/// Thresholds used by the validator.
#[derive(Debug, Clone, Copy)]
pub struct ValidationThresholds {
    /// Lineage confidence at or above which a finding may be auto-approved
    pub lineage_approve: f32,

    /// Lineage confidence below which a finding is rejected outright.
    /// This is a hard floor that overrides extraction confidence.
    pub lineage_reject_floor: f32,

    /// Any epistemic dimension below this flags the finding for review
    pub dimension_review: f32,

    /// Trigram similarity at or above which canonical keys count as
    /// near-matches
    pub similarity: f32,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            lineage_approve: 0.75,
            lineage_reject_floor: 0.5,
            dimension_review: 0.7,
            similarity: 0.3,
        }
    }
}

/// Configuration for the curation pipeline.
#[derive(Debug, Clone)]
pub struct CuratorConfig {
    pub thresholds: ValidationThresholds,

    /// Deadline per LLM call
    pub llm_timeout: Duration,

    /// Deadline per document fetch
    pub fetch_timeout: Duration,

    /// Fetch attempts before giving up (fetch failures are retryable)
    pub fetch_attempts: u32,

    /// Maximum characters per field on review-surface projections
    pub review_field_limit: usize,

    /// Cap on near-matches surfaced per finding
    pub max_near_matches: usize,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            thresholds: ValidationThresholds::default(),
            llm_timeout: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(30),
            fetch_attempts: 3,
            review_field_limit: 2000,
            max_near_matches: 5,
        }
    }
}

impl CuratorConfig {
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ValidationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}
