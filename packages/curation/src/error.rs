//! Typed errors for the curation library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Infrastructure failures (`CurationError`) and business-rule rejections
//! (`RejectReason`) are deliberately separate types: a rejected finding is a
//! normal pipeline outcome, while a storage or transport failure is not.

use thiserror::Error;

use crate::types::finding::FindingStatus;

/// Errors that can occur during curation operations.
#[derive(Debug, Error)]
pub enum CurationError {
    /// LLM service unavailable or failed
    #[error("LLM service error: {0}")]
    Llm(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Document source fetch failed
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// External call exceeded its deadline
    #[error("timeout after {seconds}s during {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Uniqueness constraint violation on the canonical store.
    ///
    /// Surfaced when two findings race to create the same canonical key;
    /// the promotion resolver re-classifies the loser as a merge.
    #[error("canonical entity already exists: {key} ({ecosystem})")]
    DuplicateKey { key: String, ecosystem: String },

    /// Finding not found in the staging store
    #[error("finding not found: {id}")]
    FindingNotFound { id: uuid::Uuid },

    /// Illegal finding lifecycle transition
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: FindingStatus,
        to: FindingStatus,
    },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Review surface publish failed
    #[error("review board error: {0}")]
    Board(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl CurationError {
    /// Whether the caller may safely retry the failed operation.
    ///
    /// Fetch and timeout failures commit no state. Promotion-side failures
    /// are terminal per finding; re-runs rely on the promoted-at guard,
    /// not blind retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Timeout { .. })
    }
}

/// A business-rule rejection of a candidate finding.
///
/// These are outcomes, not failures: they are recorded against the finding
/// with a structured reason and processing continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum RejectReason {
    /// Finding carries no evidence quote
    #[error("empty evidence: a finding with no raw evidence is invalid")]
    EmptyEvidence,

    /// Candidate type outside the fixed enumeration
    #[error("unknown candidate type: {0:?}")]
    UnknownCandidateType(String),

    /// Evidence type outside the fixed enumeration
    #[error("unknown evidence type: {0:?}")]
    UnknownEvidenceType(String),

    /// Epistemic dimension value outside its enumeration
    #[error("unknown {dimension} value: {value:?}")]
    UnknownDimensionValue { dimension: String, value: String },

    /// Relationship type outside the fixed enumeration
    #[error("invalid relationship type: {0:?}")]
    InvalidRelationshipType(String),

    /// Criticality outside the fixed enumeration
    #[error("invalid criticality: {0:?}")]
    InvalidCriticality(String),

    /// Evidence lineage could not be verified (hard floor)
    #[error("broken lineage: confidence {confidence:.2} below floor")]
    BrokenLineage { confidence: f32 },

    /// Exact duplicate of an existing canonical entity
    #[error("duplicate: {key} ({ecosystem}) already exists as entity {entity_id}")]
    Duplicate {
        key: String,
        ecosystem: String,
        entity_id: uuid::Uuid,
    },

    /// Identical relationship triple already recorded
    #[error("duplicate relationship: {source_key} --[{relationship}]--> {target}")]
    DuplicateRelationship {
        source_key: String,
        relationship: String,
        target: String,
    },

    /// A component relating to itself is never valid
    #[error("self-reference: {key} cannot relate to itself")]
    SelfReference { key: String },
}

/// Result type alias for curation operations.
pub type Result<T> = std::result::Result<T, CurationError>;
