//! Duplicate and conflict detection against the canonical store.
//!
//! An autonomous extractor will rediscover the same facts forever; this
//! stage stops them from re-entering the graph. Exact duplicates reject,
//! near-matches only warn (merging similar names is human judgment), and
//! self-referential relations always reject.

use serde::{Deserialize, Serialize};

use crate::error::{RejectReason, Result};
use crate::traits::store::CanonicalStore;
use crate::types::config::CuratorConfig;
use crate::types::entity::CanonicalEntity;
use crate::types::finding::Finding;

/// A canonical entity whose key is similar but not identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearMatch {
    pub entity: CanonicalEntity,
    pub similarity: f32,
}

/// What duplicate detection found for one finding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupReport {
    /// An entity with identical (key, ecosystem, type), if one exists
    pub exact: Option<CanonicalEntity>,
    /// Similar keys ranked by similarity, surfaced as warnings
    pub near_matches: Vec<NearMatch>,
    /// Hard relation-level rejection, if any
    pub relation_reject: Option<RejectReason>,
}

impl DedupReport {
    /// The rejection this report demands, if any. Near-matches never
    /// reject on their own.
    pub fn rejection(&self, finding: &Finding) -> Option<RejectReason> {
        if let Some(reason) = &self.relation_reject {
            return Some(reason.clone());
        }
        self.exact.as_ref().map(|entity| RejectReason::Duplicate {
            key: finding.normalized_key(),
            ecosystem: finding.ecosystem.as_str().to_string(),
            entity_id: entity.id,
        })
    }
}

/// Run duplicate and conflict detection for a finding.
pub async fn detect<C: CanonicalStore + ?Sized>(
    store: &C,
    finding: &Finding,
    config: &CuratorConfig,
) -> Result<DedupReport> {
    let mut report = DedupReport::default();

    if let Some(relation) = &finding.relation {
        if relation.is_self_reference() {
            report.relation_reject = Some(RejectReason::SelfReference {
                key: relation.source_key.clone(),
            });
            return Ok(report);
        }
        if store
            .relationship_exists(
                &relation.source_key,
                relation.relationship,
                &relation.target_key,
                &finding.ecosystem,
            )
            .await?
        {
            report.relation_reject = Some(RejectReason::DuplicateRelationship {
                source_key: relation.source_key.clone(),
                relationship: relation.relationship.as_str().to_string(),
                target: relation.target_key.clone(),
            });
            return Ok(report);
        }
    }

    let key = finding.normalized_key();
    report.exact = store
        .find_exact(&key, &finding.ecosystem, finding.candidate_type)
        .await?;

    if report.exact.is_none() {
        report.near_matches = store
            .similar_keys(&key, config.thresholds.similarity, config.max_near_matches)
            .await?
            .into_iter()
            // The key itself may sit in another ecosystem or under another
            // type; that is the promotion stage's business, not a warning.
            .filter(|(entity, _)| entity.canonical_key != key)
            .map(|(entity, similarity)| NearMatch { entity, similarity })
            .collect();
    }

    Ok(report)
}
