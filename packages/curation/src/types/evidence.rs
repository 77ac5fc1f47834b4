//! Evidence provenance types: snapshots, source references, evidence tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RejectReason;

/// The fixed evidence-tagging vocabulary.
///
/// Candidates carrying any other tag are rejected at the extractor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    /// "System shall/must..." statements
    ExplicitRequirement,
    /// Safety-critical requirements, failure modes
    SafetyConstraint,
    /// Timing and resource limits
    PerformanceConstraint,
    /// Functional capabilities
    FeatureDescription,
    /// Port or API contracts, protocols
    InterfaceSpecification,
    /// State machines, event sequences, modes
    BehavioralContract,
    /// Code examples, usage patterns
    ExampleUsage,
    /// Why decisions were made, trade-offs
    DesignRationale,
    /// Explicit "depends on", "requires"
    DependencyDeclaration,
    /// Settings, modes, parameters
    ConfigurationParameter,
    /// Derived from context, not explicit
    Inferred,
}

impl std::str::FromStr for EvidenceType {
    type Err = RejectReason;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "explicit_requirement" => Ok(Self::ExplicitRequirement),
            "safety_constraint" => Ok(Self::SafetyConstraint),
            "performance_constraint" => Ok(Self::PerformanceConstraint),
            "feature_description" => Ok(Self::FeatureDescription),
            "interface_specification" => Ok(Self::InterfaceSpecification),
            "behavioral_contract" => Ok(Self::BehavioralContract),
            "example_usage" => Ok(Self::ExampleUsage),
            "design_rationale" => Ok(Self::DesignRationale),
            "dependency_declaration" => Ok(Self::DependencyDeclaration),
            "configuration_parameter" => Ok(Self::ConfigurationParameter),
            "inferred" => Ok(Self::Inferred),
            other => Err(RejectReason::UnknownEvidenceType(other.to_string())),
        }
    }
}

impl EvidenceType {
    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitRequirement => "explicit_requirement",
            Self::SafetyConstraint => "safety_constraint",
            Self::PerformanceConstraint => "performance_constraint",
            Self::FeatureDescription => "feature_description",
            Self::InterfaceSpecification => "interface_specification",
            Self::BehavioralContract => "behavioral_contract",
            Self::ExampleUsage => "example_usage",
            Self::DesignRationale => "design_rationale",
            Self::DependencyDeclaration => "dependency_declaration",
            Self::ConfigurationParameter => "configuration_parameter",
            Self::Inferred => "inferred",
        }
    }
}

/// Reference to the document version a piece of evidence was drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Full URL of the source document
    pub url: String,

    /// Content-addressed snapshot id of the document version
    pub snapshot_id: String,
}

impl SourceRef {
    pub fn new(url: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            snapshot_id: snapshot_id.into(),
        }
    }
}

/// A content-addressed capture of a source document.
///
/// The id is the SHA-256 of the payload, so the same snapshot id always
/// yields the same bytes. Lineage verification depends on this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Content-addressed id (SHA-256 hex of the payload)
    pub id: String,

    /// URL the document was fetched from
    pub source_url: String,

    /// Full text content at fetch time
    pub payload: String,

    /// Stored checksum for lineage comparison
    pub checksum: Option<String>,

    /// When the document was fetched
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture a snapshot of document content, content-addressing the id.
    pub fn capture(source_url: impl Into<String>, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        let checksum = Self::hash_content(&payload);
        Self {
            id: checksum.clone(),
            source_url: source_url.into(),
            payload,
            checksum: Some(checksum),
            fetched_at: Utc::now(),
        }
    }

    /// Calculate SHA-256 hash of content.
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Byte offset and length of `needle` within the payload, if present.
    pub fn locate(&self, needle: &str) -> Option<EvidenceLocation> {
        self.payload.find(needle).map(|offset| EvidenceLocation {
            offset,
            length: needle.len(),
        })
    }

    /// A source reference pointing at this snapshot.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.source_url.clone(), self.id.clone())
    }
}

/// Where within a snapshot payload an evidence quote was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLocation {
    /// Byte offset of the quote within the payload
    pub offset: usize,

    /// Byte length of the quote
    pub length: usize,
}
