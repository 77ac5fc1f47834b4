//! Canonical entities, aliases, and cross-ecosystem links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::finding::{normalize_key, CandidateType, Ecosystem};

/// The resolved, de-duplicated truth-graph record.
///
/// Within one (canonical_key, ecosystem, entity_type) triple, at most one
/// row has `is_current = true`; stores enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: Uuid,
    /// Normalized matching key
    pub canonical_key: String,
    pub entity_type: CandidateType,
    pub ecosystem: Ecosystem,
    /// Human-facing name, original casing preserved
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub enriched_at: Option<DateTime<Utc>>,
    /// Soft-supersession flag
    pub is_current: bool,
}

impl CanonicalEntity {
    pub fn new(
        display_name: impl Into<String>,
        entity_type: CandidateType,
        ecosystem: Ecosystem,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            id: Uuid::new_v4(),
            canonical_key: normalize_key(&display_name),
            entity_type,
            ecosystem,
            display_name,
            created_at: Utc::now(),
            enriched_at: None,
            is_current: true,
        }
    }
}

/// How an alias came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasType {
    Abbreviation,
    Rename,
    Spelling,
    /// A human-confirmed link between ecosystems. Records equivalence
    /// without merging the entities.
    CrossEcosystem,
}

impl AliasType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abbreviation => "abbreviation",
            Self::Rename => "rename",
            Self::Spelling => "spelling",
            Self::CrossEcosystem => "cross_ecosystem",
        }
    }
}

/// Whether an alias has been approved for auto-merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
}

/// A many-to-one mapping from an alternate name to a canonical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    /// Normalized alternate name
    pub alias_text: String,
    pub ecosystem: Ecosystem,
    pub entity_id: Uuid,
    pub alias_type: AliasType,
    pub resolution_status: ResolutionStatus,
}

impl Alias {
    pub fn resolved(
        alias_text: impl AsRef<str>,
        ecosystem: Ecosystem,
        entity_id: Uuid,
        alias_type: AliasType,
    ) -> Self {
        Self {
            alias_text: normalize_key(alias_text.as_ref()),
            ecosystem,
            entity_id,
            alias_type,
            resolution_status: ResolutionStatus::Resolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution_status == ResolutionStatus::Resolved
    }
}

/// A likely equivalent concept in another ecosystem, surfaced at promotion
/// time for later human linking. Never auto-merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceCandidate {
    pub id: Uuid,
    /// Finding whose promotion surfaced the match
    pub finding_id: Uuid,
    /// Entity created for the finding's own ecosystem
    pub entity_id: Uuid,
    /// The same-key, same-type entity in a different ecosystem
    pub matched_entity_id: Uuid,
    pub matched_ecosystem: Ecosystem,
    pub created_at: DateTime<Utc>,
}

impl EquivalenceCandidate {
    pub fn new(
        finding_id: Uuid,
        entity_id: Uuid,
        matched: &CanonicalEntity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            finding_id,
            entity_id,
            matched_entity_id: matched.id,
            matched_ecosystem: matched.ecosystem.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Per-source crawl bookkeeping, supporting incremental re-crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub source_url: String,
    pub ecosystem: Ecosystem,
    pub last_crawled_at: DateTime<Utc>,
    /// Number of times this source has been crawled
    pub crawl_count: u32,
    /// Cumulative findings extracted across crawls
    pub findings_extracted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_normalized_from_display_name() {
        let e = CanonicalEntity::new(
            "ImuManager",
            CandidateType::Component,
            Ecosystem::new("fprime"),
        );
        assert_eq!(e.canonical_key, "imumanager");
        assert_eq!(e.display_name, "ImuManager");
        assert!(e.is_current);
    }

    #[test]
    fn test_alias_normalizes_text() {
        let a = Alias::resolved(
            " TlmChan ",
            Ecosystem::new("fprime"),
            Uuid::new_v4(),
            AliasType::Abbreviation,
        );
        assert_eq!(a.alias_text, "tlmchan");
        assert!(a.is_resolved());
    }
}
