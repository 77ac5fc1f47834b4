//! Validation decision audit records.
//!
//! One immutable record per judgment made about a finding. Corrections
//! append a new record; nothing is ever edited in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::evidence::EvidenceLocation;

/// Who made a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decider {
    /// A named human reviewer
    Human { name: String },
    /// A specific validator agent run
    Agent { run_id: String },
}

impl std::fmt::Display for Decider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human { name } => write!(f, "human:{name}"),
            Self::Agent { run_id } => write!(f, "agent:{run_id}"),
        }
    }
}

/// The judgment itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionValue {
    Accept,
    Reject,
    Merge,
    NeedsMoreEvidence,
    Defer,
}

impl DecisionValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Merge => "merge",
            Self::NeedsMoreEvidence => "needs_more_evidence",
            Self::Defer => "defer",
        }
    }
}

/// An audit record for one judgment about a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDecision {
    pub id: Uuid,
    pub finding_id: Uuid,
    pub decider: Decider,
    pub decision: DecisionValue,
    pub reasoning: String,
    /// Confidence at decision time; may override the finding's own score
    pub confidence: Option<f32>,
    /// The evidence text as it stood when the decision was made
    pub evidence_snapshot: String,
    /// SHA-256 of the evidence text, when lineage verification located it
    pub evidence_checksum: Option<String>,
    /// Byte offset and length of the evidence within the cited snapshot
    pub evidence_location: Option<EvidenceLocation>,
    pub decided_at: DateTime<Utc>,
}

impl ValidationDecision {
    pub fn new(
        finding_id: Uuid,
        decider: Decider,
        decision: DecisionValue,
        reasoning: impl Into<String>,
        evidence_snapshot: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            finding_id,
            decider,
            decision,
            reasoning: reasoning.into(),
            confidence: None,
            evidence_snapshot: evidence_snapshot.into(),
            evidence_checksum: None,
            evidence_location: None,
            decided_at: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach the checksum and byte location of the located evidence, for
    /// later citation against the snapshot.
    pub fn with_evidence_audit(
        mut self,
        checksum: Option<String>,
        location: Option<EvidenceLocation>,
    ) -> Self {
        self.evidence_checksum = checksum;
        self.evidence_location = location;
        self
    }
}
