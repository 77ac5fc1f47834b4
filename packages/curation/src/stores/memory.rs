//! In-memory store for tests and ephemeral runs.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CurationError, Result};
use crate::traits::store::{CanonicalStore, SnapshotStore, StagingStore};
use crate::types::{
    decision::ValidationDecision,
    entity::{Alias, CanonicalEntity, CrawlRecord, EquivalenceCandidate},
    evidence::Snapshot,
    finding::{normalize_key, CandidateType, Ecosystem, Finding, FindingStatus, RelationshipType},
};
use crate::validator::similarity::similarity;

use async_trait::async_trait;

#[derive(Debug, Clone)]
struct EnrichmentRow {
    entity_id: Uuid,
    finding_id: Uuid,
    note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RelationshipRow {
    source_key: String,
    relationship: RelationshipType,
    target_key: String,
    ecosystem: Ecosystem,
}

/// An in-memory implementation of the full storage surface.
///
/// Backed by `RwLock`-protected maps; cheap to construct per test. The
/// current-row uniqueness invariant on entities is enforced the same way
/// the SQLite backend enforces it, so promotion races behave identically.
#[derive(Default)]
pub struct MemoryStore {
    findings: RwLock<HashMap<Uuid, Finding>>,
    decisions: RwLock<Vec<ValidationDecision>>,
    crawls: RwLock<HashMap<String, CrawlRecord>>,
    snapshots: RwLock<HashMap<String, Snapshot>>,
    entities: RwLock<HashMap<Uuid, CanonicalEntity>>,
    aliases: RwLock<Vec<Alias>>,
    relationships: RwLock<Vec<RelationshipRow>>,
    enrichments: RwLock<Vec<EnrichmentRow>>,
    equivalences: RwLock<Vec<EquivalenceCandidate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrichment notes recorded against an entity, for assertions.
    pub async fn enrichment_notes(&self, entity_id: Uuid) -> Vec<String> {
        self.enrichments
            .read()
            .await
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| e.note.clone())
            .collect()
    }
}

#[async_trait]
impl StagingStore for MemoryStore {
    async fn store_finding(&self, finding: &Finding) -> Result<()> {
        self.findings
            .write()
            .await
            .insert(finding.id, finding.clone());
        Ok(())
    }

    async fn get_finding(&self, id: Uuid) -> Result<Option<Finding>> {
        Ok(self.findings.read().await.get(&id).cloned())
    }

    async fn update_finding(&self, finding: &Finding) -> Result<()> {
        let mut findings = self.findings.write().await;
        if !findings.contains_key(&finding.id) {
            return Err(CurationError::FindingNotFound { id: finding.id });
        }
        findings.insert(finding.id, finding.clone());
        Ok(())
    }

    async fn findings_by_status(&self, status: FindingStatus) -> Result<Vec<Finding>> {
        let mut out: Vec<Finding> = self
            .findings
            .read()
            .await
            .values()
            .filter(|f| f.status == status)
            .cloned()
            .collect();
        out.sort_by_key(|f| f.created_at);
        Ok(out)
    }

    async fn unpromoted_accepted(&self) -> Result<Vec<Finding>> {
        let mut out: Vec<Finding> = self
            .findings
            .read()
            .await
            .values()
            .filter(|f| f.awaiting_promotion())
            .cloned()
            .collect();
        out.sort_by_key(|f| f.created_at);
        Ok(out)
    }

    async fn record_decision(&self, decision: &ValidationDecision) -> Result<()> {
        self.decisions.write().await.push(decision.clone());
        Ok(())
    }

    async fn decisions_for(&self, finding_id: Uuid) -> Result<Vec<ValidationDecision>> {
        Ok(self
            .decisions
            .read()
            .await
            .iter()
            .filter(|d| d.finding_id == finding_id)
            .cloned()
            .collect())
    }

    async fn record_crawl(
        &self,
        source_url: &str,
        ecosystem: &Ecosystem,
        findings_extracted: u64,
    ) -> Result<CrawlRecord> {
        let mut crawls = self.crawls.write().await;
        let record = crawls
            .entry(source_url.to_string())
            .and_modify(|r| {
                r.last_crawled_at = Utc::now();
                r.crawl_count += 1;
                r.findings_extracted += findings_extracted;
            })
            .or_insert_with(|| CrawlRecord {
                source_url: source_url.to_string(),
                ecosystem: ecosystem.clone(),
                last_crawled_at: Utc::now(),
                crawl_count: 1,
                findings_extracted,
            });
        Ok(record.clone())
    }

    async fn crawl_record(&self, source_url: &str) -> Result<Option<CrawlRecord>> {
        Ok(self.crawls.read().await.get(source_url).cloned())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        // Content-addressed: same id means same bytes, re-store is a no-op.
        self.snapshots
            .write()
            .await
            .entry(snapshot.id.clone())
            .or_insert_with(|| snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(id).cloned())
    }
}

#[async_trait]
impl CanonicalStore for MemoryStore {
    async fn find_exact(
        &self,
        canonical_key: &str,
        ecosystem: &Ecosystem,
        entity_type: CandidateType,
    ) -> Result<Option<CanonicalEntity>> {
        Ok(self
            .entities
            .read()
            .await
            .values()
            .find(|e| {
                e.is_current
                    && e.canonical_key == canonical_key
                    && e.ecosystem == *ecosystem
                    && e.entity_type == entity_type
            })
            .cloned())
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<CanonicalEntity>> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn find_resolved_alias(
        &self,
        alias_text: &str,
        ecosystem: &Ecosystem,
    ) -> Result<Option<Alias>> {
        let normalized = normalize_key(alias_text);
        Ok(self
            .aliases
            .read()
            .await
            .iter()
            .find(|a| a.is_resolved() && a.alias_text == normalized && a.ecosystem == *ecosystem)
            .cloned())
    }

    async fn cross_ecosystem_matches(
        &self,
        canonical_key: &str,
        entity_type: CandidateType,
        ecosystem: &Ecosystem,
    ) -> Result<Vec<CanonicalEntity>> {
        let mut out: Vec<CanonicalEntity> = self
            .entities
            .read()
            .await
            .values()
            .filter(|e| {
                e.is_current
                    && e.canonical_key == canonical_key
                    && e.entity_type == entity_type
                    && e.ecosystem != *ecosystem
            })
            .cloned()
            .collect();
        out.sort_by_key(|e| e.created_at);
        Ok(out)
    }

    async fn similar_keys(
        &self,
        key: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(CanonicalEntity, f32)>> {
        let mut scored: Vec<(CanonicalEntity, f32)> = self
            .entities
            .read()
            .await
            .values()
            .filter(|e| e.is_current)
            .map(|e| (e.clone(), similarity(key, &e.canonical_key)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn insert_entity(&self, entity: &CanonicalEntity) -> Result<()> {
        let mut entities = self.entities.write().await;
        let clash = entities.values().any(|e| {
            e.is_current
                && entity.is_current
                && e.canonical_key == entity.canonical_key
                && e.ecosystem == entity.ecosystem
                && e.entity_type == entity.entity_type
        });
        if clash {
            return Err(CurationError::DuplicateKey {
                key: entity.canonical_key.clone(),
                ecosystem: entity.ecosystem.as_str().to_string(),
            });
        }
        entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn record_enrichment(
        &self,
        entity_id: Uuid,
        finding_id: Uuid,
        note: &str,
    ) -> Result<()> {
        if let Some(entity) = self.entities.write().await.get_mut(&entity_id) {
            entity.enriched_at = Some(Utc::now());
        }
        self.enrichments.write().await.push(EnrichmentRow {
            entity_id,
            finding_id,
            note: note.to_string(),
        });
        Ok(())
    }

    async fn insert_alias(&self, alias: &Alias) -> Result<()> {
        self.aliases.write().await.push(alias.clone());
        Ok(())
    }

    async fn relationship_exists(
        &self,
        source_key: &str,
        relationship: RelationshipType,
        target_key: &str,
        ecosystem: &Ecosystem,
    ) -> Result<bool> {
        let row = RelationshipRow {
            source_key: normalize_key(source_key),
            relationship,
            target_key: normalize_key(target_key),
            ecosystem: ecosystem.clone(),
        };
        Ok(self.relationships.read().await.contains(&row))
    }

    async fn insert_relationship(
        &self,
        source_key: &str,
        relationship: RelationshipType,
        target_key: &str,
        ecosystem: &Ecosystem,
    ) -> Result<()> {
        self.relationships.write().await.push(RelationshipRow {
            source_key: normalize_key(source_key),
            relationship,
            target_key: normalize_key(target_key),
            ecosystem: ecosystem.clone(),
        });
        Ok(())
    }

    async fn record_equivalence_candidate(&self, candidate: &EquivalenceCandidate) -> Result<()> {
        self.equivalences.write().await.push(candidate.clone());
        Ok(())
    }

    async fn equivalence_candidates(&self) -> Result<Vec<EquivalenceCandidate>> {
        Ok(self.equivalences.read().await.clone())
    }
}
