//! The staged finding: a candidate fact pending human judgment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CurationError, RejectReason, Result};
use crate::types::dimensions::{EpistemicProfile, DIMENSION_REVIEW_THRESHOLD};
use crate::types::evidence::{EvidenceType, SourceRef};

/// The fixed candidate-type enumeration.
///
/// Anything outside this list is rejected at the extractor boundary, never
/// downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateType {
    Component,
    Connection,
    Port,
    Dependency,
    Command,
    Telemetry,
    Event,
    Parameter,
    DataType,
    Inheritance,
}

impl std::str::FromStr for CandidateType {
    type Err = RejectReason;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "component" => Ok(Self::Component),
            "connection" => Ok(Self::Connection),
            "port" => Ok(Self::Port),
            "dependency" => Ok(Self::Dependency),
            "command" => Ok(Self::Command),
            "telemetry" => Ok(Self::Telemetry),
            "event" => Ok(Self::Event),
            "parameter" => Ok(Self::Parameter),
            "data_type" => Ok(Self::DataType),
            "inheritance" => Ok(Self::Inheritance),
            other => Err(RejectReason::UnknownCandidateType(other.to_string())),
        }
    }
}

impl CandidateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::Connection => "connection",
            Self::Port => "port",
            Self::Dependency => "dependency",
            Self::Command => "command",
            Self::Telemetry => "telemetry",
            Self::Event => "event",
            Self::Parameter => "parameter",
            Self::DataType => "data_type",
            Self::Inheritance => "inheritance",
        }
    }
}

/// A namespace distinguishing which documentation corpus a term comes from.
///
/// Stored normalized to lowercase; `unknown` when the source cannot be
/// attributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ecosystem(String);

impl Ecosystem {
    pub fn new(name: impl AsRef<str>) -> Self {
        let normalized = name.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            Self::unknown()
        } else {
            Self(normalized)
        }
    }

    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ecosystem {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Fixed relationship vocabulary for relation-style candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    DependsOn,
    Requires,
    Enables,
    ConflictsWith,
    Mitigates,
    Causes,
}

impl std::str::FromStr for RelationshipType {
    type Err = RejectReason;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "depends_on" => Ok(Self::DependsOn),
            "requires" => Ok(Self::Requires),
            "enables" => Ok(Self::Enables),
            "conflicts_with" => Ok(Self::ConflictsWith),
            "mitigates" => Ok(Self::Mitigates),
            "causes" => Ok(Self::Causes),
            other => Err(RejectReason::InvalidRelationshipType(other.to_string())),
        }
    }
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::Requires => "requires",
            Self::Enables => "enables",
            Self::ConflictsWith => "conflicts_with",
            Self::Mitigates => "mitigates",
            Self::Causes => "causes",
        }
    }
}

/// Mission-impact weight of a relation. Assigned by humans, never by agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Criticality {
    High,
    Medium,
    Low,
}

impl std::str::FromStr for Criticality {
    type Err = RejectReason;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(RejectReason::InvalidCriticality(other.to_string())),
        }
    }
}

/// A relationship-style candidate: component A related to component B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationCandidate {
    pub source_key: String,
    pub relationship: RelationshipType,
    pub target_key: String,
    pub criticality: Option<Criticality>,
}

impl RelationCandidate {
    /// A component relating to itself is always invalid, regardless of
    /// relationship type.
    pub fn is_self_reference(&self) -> bool {
        normalize_key(&self.source_key) == normalize_key(&self.target_key)
    }
}

/// Lifecycle status of a staged finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Pending,
    Accepted,
    Rejected,
    NeedsContext,
    Merged,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::NeedsContext => "needs_context",
            Self::Merged => "merged",
        }
    }
}

impl std::str::FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "needs_context" => Ok(Self::NeedsContext),
            "merged" => Ok(Self::Merged),
            other => Err(format!("unknown finding status: {other}")),
        }
    }
}

/// The action the promotion resolver took for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionAction {
    /// Merged into an existing canonical entity
    Merged,
    /// Created a new canonical entity
    Created,
}

/// Promotion linkage, set exactly once per finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub promoted_at: DateTime<Utc>,
    pub entity_id: Uuid,
    pub action: PromotionAction,
}

/// A candidate fact pending human judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub candidate_type: CandidateType,
    /// Entity name; not required to be unique
    pub candidate_key: String,
    pub ecosystem: Ecosystem,
    /// Verbatim quote from the source; must be non-empty
    pub raw_evidence: String,
    pub evidence_type: EvidenceType,
    pub source: SourceRef,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub confidence_reasoning: String,
    pub dimensions: EpistemicProfile,
    /// Derived: true when any dimension confidence is below 0.7
    pub needs_human_review: bool,
    pub status: FindingStatus,
    /// Present only for relation-style candidates
    pub relation: Option<RelationCandidate>,
    /// Set exactly once by the promotion resolver
    pub promotion: Option<PromotionRecord>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    /// Build a new pending finding, deriving the review flag.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        candidate_type: CandidateType,
        candidate_key: impl Into<String>,
        ecosystem: Ecosystem,
        raw_evidence: impl Into<String>,
        evidence_type: EvidenceType,
        source: SourceRef,
        confidence: f32,
        confidence_reasoning: impl Into<String>,
        dimensions: EpistemicProfile,
    ) -> std::result::Result<Self, RejectReason> {
        let raw_evidence = raw_evidence.into();
        if raw_evidence.trim().is_empty() {
            return Err(RejectReason::EmptyEvidence);
        }

        let needs_human_review = dimensions.needs_review(DIMENSION_REVIEW_THRESHOLD);

        Ok(Self {
            id: Uuid::new_v4(),
            candidate_type,
            candidate_key: candidate_key.into(),
            ecosystem,
            raw_evidence,
            evidence_type,
            source,
            confidence,
            confidence_reasoning: confidence_reasoning.into(),
            dimensions,
            needs_human_review,
            status: FindingStatus::Pending,
            relation: None,
            promotion: None,
            created_at: Utc::now(),
        })
    }

    /// Attach a relation candidate (for dependency-style findings).
    pub fn with_relation(mut self, relation: RelationCandidate) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Candidate key normalized for matching.
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.candidate_key)
    }

    /// Apply a lifecycle transition, enforcing the allowed edges.
    ///
    /// Pending findings may move to accepted, rejected, or needs_context;
    /// needs_context may be resolved the same way once more context arrives.
    /// Merged is reserved for the promotion resolver.
    pub fn transition(&mut self, to: FindingStatus) -> Result<()> {
        use FindingStatus::*;
        let allowed = matches!(
            (self.status, to),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, NeedsContext)
                | (NeedsContext, Accepted)
                | (NeedsContext, Rejected)
        );
        if !allowed {
            return Err(CurationError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Record promotion linkage. Rejects re-promotion and promotion of
    /// anything that was never accepted.
    pub fn mark_promoted(&mut self, entity_id: Uuid, action: PromotionAction) -> Result<()> {
        if self.promotion.is_some() {
            return Err(CurationError::InvalidTransition {
                from: self.status,
                to: FindingStatus::Merged,
            });
        }
        if self.status != FindingStatus::Accepted {
            return Err(CurationError::InvalidTransition {
                from: self.status,
                to: FindingStatus::Merged,
            });
        }
        self.promotion = Some(PromotionRecord {
            promoted_at: Utc::now(),
            entity_id,
            action,
        });
        if action == PromotionAction::Merged {
            self.status = FindingStatus::Merged;
        }
        Ok(())
    }

    /// Whether the promotion resolver still owes this finding a decision.
    pub fn awaiting_promotion(&self) -> bool {
        self.status == FindingStatus::Accepted && self.promotion.is_none()
    }
}

/// Normalize a candidate key for identity matching: trimmed, lowercased.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
