//! Promotion: move accepted findings into the canonical graph.
//!
//! Classification is a pure function of current store state, so a dry-run
//! analysis and the apply pass agree by construction. The match policy is
//! ordered: exact identity and pre-approved aliases are trusted to merge;
//! a same-key entity in another ecosystem only hints at equivalence and
//! never merges automatically.

pub mod report;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{CurationError, Result};
use crate::traits::store::{CanonicalStore, CurationStore};
use crate::types::entity::{CanonicalEntity, EquivalenceCandidate};
use crate::types::finding::{Finding, PromotionAction};

pub use report::{
    AnalysisReport, BatchReport, ItemOutcome, ItemReport, MergeBasis, PlannedAction,
};

/// The classification of one finding against current canonical state.
#[derive(Debug, Clone)]
pub enum Classification {
    /// Already promoted; never reprocess
    Skip,
    Merge {
        entity: CanonicalEntity,
        basis: MergeBasis,
    },
    Create {
        /// Same key and type in other ecosystems; recorded as equivalence
        /// candidates, never merged
        cross_ecosystem: Vec<CanonicalEntity>,
    },
}

/// Classify a finding. Pure with respect to the store: reads only.
///
/// Priority order, first match wins: idempotency skip, exact duplicate,
/// resolved alias, cross-ecosystem hint, default create.
pub async fn classify<C: CanonicalStore + ?Sized>(
    store: &C,
    finding: &Finding,
) -> Result<Classification> {
    if finding.promotion.is_some() {
        return Ok(Classification::Skip);
    }

    let key = finding.normalized_key();

    if let Some(entity) = store
        .find_exact(&key, &finding.ecosystem, finding.candidate_type)
        .await?
    {
        return Ok(Classification::Merge {
            entity,
            basis: MergeBasis::Exact,
        });
    }

    if let Some(alias) = store.find_resolved_alias(&key, &finding.ecosystem).await? {
        if let Some(entity) = store.get_entity(alias.entity_id).await? {
            return Ok(Classification::Merge {
                entity,
                basis: MergeBasis::ResolvedAlias,
            });
        }
        warn!(
            alias = %alias.alias_text,
            entity = %alias.entity_id,
            "resolved alias points at a missing entity, falling through to create"
        );
    }

    let cross_ecosystem = store
        .cross_ecosystem_matches(&key, finding.candidate_type, &finding.ecosystem)
        .await?;
    Ok(Classification::Create { cross_ecosystem })
}

/// Executes promotion batches over accepted, unpromoted findings.
pub struct Promoter<S> {
    store: Arc<S>,
}

impl<S: CurationStore> Promoter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Dry run: classify every accepted, unpromoted finding without
    /// mutating anything.
    pub async fn analyze(&self) -> Result<AnalysisReport> {
        let mut report = AnalysisReport::default();
        for finding in self.store.unpromoted_accepted().await? {
            let action = match classify(self.store.as_ref(), &finding).await? {
                Classification::Skip => PlannedAction::Skip,
                Classification::Merge { entity, basis } => PlannedAction::Merge {
                    entity_id: entity.id,
                    basis,
                },
                Classification::Create { cross_ecosystem } => PlannedAction::Create {
                    cross_ecosystem_matches: cross_ecosystem.len(),
                },
            };
            report.items.push(ItemReport {
                finding_id: finding.id,
                candidate_key: finding.candidate_key.clone(),
                ecosystem: finding.ecosystem.as_str().to_string(),
                action,
            });
        }
        Ok(report)
    }

    /// Apply pass: promote every accepted, unpromoted finding.
    ///
    /// Failures are per item; one bad finding never aborts the batch.
    /// Cancellation is honored between items only, so no finding is left
    /// half promoted.
    pub async fn promote(&self, cancel: &CancellationToken) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let batch = self.store.unpromoted_accepted().await?;
        info!(count = batch.len(), "starting promotion batch");

        for finding in batch {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!(remaining = report.items.len(), "promotion batch cancelled");
                break;
            }

            let outcome = match self.promote_one(finding.clone()).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(finding = %finding.id, error = %err, "promotion failed");
                    ItemOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            report.items.push(ItemReport {
                finding_id: finding.id,
                candidate_key: finding.candidate_key.clone(),
                ecosystem: finding.ecosystem.as_str().to_string(),
                action: outcome,
            });
        }

        info!(
            merged = report.merged(),
            created = report.created(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "promotion batch finished"
        );
        Ok(report)
    }

    async fn promote_one(&self, mut finding: Finding) -> Result<ItemOutcome> {
        match classify(self.store.as_ref(), &finding).await? {
            Classification::Skip => Ok(ItemOutcome::Skipped),
            Classification::Merge { entity, basis } => {
                self.merge(&mut finding, &entity, basis).await
            }
            Classification::Create { cross_ecosystem } => {
                self.create(&mut finding, cross_ecosystem).await
            }
        }
    }

    async fn merge(
        &self,
        finding: &mut Finding,
        entity: &CanonicalEntity,
        basis: MergeBasis,
    ) -> Result<ItemOutcome> {
        let note = format!(
            "merged finding {} ({}), evidence: {}",
            finding.id,
            finding.source.url,
            finding.raw_evidence.chars().take(200).collect::<String>()
        );
        self.store
            .record_enrichment(entity.id, finding.id, &note)
            .await?;
        self.record_relation(finding).await?;

        // The promoted-at write is last, so a crash before this point
        // leaves the finding eligible for an idempotent re-run.
        finding.mark_promoted(entity.id, PromotionAction::Merged)?;
        self.store.update_finding(finding).await?;
        info!(finding = %finding.id, entity = %entity.id, ?basis, "merged");
        Ok(ItemOutcome::Merged {
            entity_id: entity.id,
            basis,
        })
    }

    async fn create(
        &self,
        finding: &mut Finding,
        cross_ecosystem: Vec<CanonicalEntity>,
    ) -> Result<ItemOutcome> {
        let entity = CanonicalEntity::new(
            finding.candidate_key.clone(),
            finding.candidate_type,
            finding.ecosystem.clone(),
        );

        match self.store.insert_entity(&entity).await {
            Ok(()) => {}
            Err(CurationError::DuplicateKey { .. }) => {
                // Lost a create race within this batch or to a concurrent
                // run. The winner's row is the merge target.
                let existing = self
                    .store
                    .find_exact(
                        &entity.canonical_key,
                        &finding.ecosystem,
                        finding.candidate_type,
                    )
                    .await?
                    .ok_or(CurationError::DuplicateKey {
                        key: entity.canonical_key.clone(),
                        ecosystem: finding.ecosystem.as_str().to_string(),
                    })?;
                return self.merge(finding, &existing, MergeBasis::CreateRace).await;
            }
            Err(err) => return Err(err),
        }

        let mut equivalences = 0;
        for matched in &cross_ecosystem {
            self.store
                .record_equivalence_candidate(&EquivalenceCandidate::new(
                    finding.id, entity.id, matched,
                ))
                .await?;
            equivalences += 1;
        }
        self.record_relation(finding).await?;

        finding.mark_promoted(entity.id, PromotionAction::Created)?;
        self.store.update_finding(finding).await?;
        info!(finding = %finding.id, entity = %entity.id, "created");
        Ok(ItemOutcome::Created {
            entity_id: entity.id,
            equivalence_candidates: equivalences,
        })
    }

    async fn record_relation(&self, finding: &Finding) -> Result<()> {
        let Some(relation) = &finding.relation else {
            return Ok(());
        };
        let exists = self
            .store
            .relationship_exists(
                &relation.source_key,
                relation.relationship,
                &relation.target_key,
                &finding.ecosystem,
            )
            .await?;
        if !exists {
            self.store
                .insert_relationship(
                    &relation.source_key,
                    relation.relationship,
                    &relation.target_key,
                    &finding.ecosystem,
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use crate::traits::store::StagingStore;
    use crate::types::dimensions::{
        Assessment, Carrier, ContactLevel, Directionality, EpistemicProfile, Formalizability,
        KnowledgeForm, Temporality,
    };
    use crate::types::entity::{Alias, AliasType};
    use crate::types::evidence::{EvidenceType, SourceRef};
    use crate::types::finding::{CandidateType, Ecosystem, FindingStatus};

    fn profile() -> EpistemicProfile {
        EpistemicProfile {
            knowledge_form: Assessment::new(KnowledgeForm::Inferred, 0.9, "doc"),
            contact: Assessment::new(ContactLevel::Mediated, 0.9, "doc"),
            directionality: Assessment::new(Directionality::Forward, 0.9, "doc"),
            temporality: Assessment::new(Temporality::Snapshot, 0.9, "doc"),
            formalizability: Assessment::new(Formalizability::Portable, 0.9, "doc"),
            carrier: Assessment::new(Carrier::Artifact, 0.9, "doc"),
        }
    }

    async fn accepted(store: &MemoryStore, key: &str, ecosystem: &str) -> Finding {
        let mut finding = Finding::new(
            CandidateType::Component,
            key,
            Ecosystem::new(ecosystem),
            "evidence text",
            EvidenceType::FeatureDescription,
            SourceRef::new("https://docs.example.com", "snap"),
            0.9,
            "explicit",
            profile(),
        )
        .unwrap();
        finding.transition(FindingStatus::Accepted).unwrap();
        store.store_finding(&finding).await.unwrap();
        finding
    }

    #[tokio::test]
    async fn test_no_match_creates_entity() {
        let store = Arc::new(MemoryStore::new());
        let finding = accepted(&store, "ImuManager", "fprime").await;

        let promoter = Promoter::new(store.clone());
        let report = promoter.promote(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.created(), 1);
        let updated = store.get_finding(finding.id).await.unwrap().unwrap();
        assert_eq!(updated.status, FindingStatus::Accepted);
        let promotion = updated.promotion.unwrap();
        assert_eq!(promotion.action, PromotionAction::Created);
        let entity = store.get_entity(promotion.entity_id).await.unwrap().unwrap();
        assert_eq!(entity.canonical_key, "imumanager");
    }

    #[tokio::test]
    async fn test_exact_match_merges() {
        let store = Arc::new(MemoryStore::new());
        let existing = CanonicalEntity::new(
            "ImuManager",
            CandidateType::Component,
            Ecosystem::new("fprime"),
        );
        store.insert_entity(&existing).await.unwrap();
        let finding = accepted(&store, "imumanager", "fprime").await;

        let promoter = Promoter::new(store.clone());
        let report = promoter.promote(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.merged(), 1);
        let updated = store.get_finding(finding.id).await.unwrap().unwrap();
        assert_eq!(updated.status, FindingStatus::Merged);
        assert_eq!(updated.promotion.unwrap().entity_id, existing.id);
        assert_eq!(store.enrichment_notes(existing.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolved_alias_merges() {
        let store = Arc::new(MemoryStore::new());
        let eco = Ecosystem::new("fprime");
        let entity = CanonicalEntity::new("TelemetryChannel", CandidateType::Component, eco.clone());
        store.insert_entity(&entity).await.unwrap();
        store
            .insert_alias(&Alias::resolved(
                "TlmChan",
                eco.clone(),
                entity.id,
                AliasType::Abbreviation,
            ))
            .await
            .unwrap();
        accepted(&store, "TlmChan", "fprime").await;

        let promoter = Promoter::new(store.clone());
        let analysis = promoter.analyze().await.unwrap();
        assert!(matches!(
            analysis.items[0].action,
            PlannedAction::Merge {
                basis: MergeBasis::ResolvedAlias,
                ..
            }
        ));

        let report = promoter.promote(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.merged(), 1);
    }

    #[tokio::test]
    async fn test_cross_ecosystem_creates_with_equivalence() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_entity(&CanonicalEntity::new(
                "radio_manager",
                CandidateType::Component,
                Ecosystem::new("fprime"),
            ))
            .await
            .unwrap();
        let finding = accepted(&store, "radio_manager", "proveskit").await;

        let promoter = Promoter::new(store.clone());
        let report = promoter.promote(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.created(), 1);
        let candidates = store.equivalence_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].finding_id, finding.id);
        assert_eq!(candidates[0].matched_ecosystem, Ecosystem::new("fprime"));
    }

    #[tokio::test]
    async fn test_same_key_twice_in_batch_one_create_one_merge() {
        let store = Arc::new(MemoryStore::new());
        accepted(&store, "BatteryHeater", "proveskit").await;
        accepted(&store, "battery_heater ", "proveskit").await;

        let promoter = Promoter::new(store.clone());
        let report = promoter.promote(&CancellationToken::new()).await.unwrap();

        // Sequential batch: the second classifies as an exact merge.
        assert_eq!(report.created(), 1);
        assert_eq!(report.merged(), 1);
        assert_eq!(report.failed(), 0);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        accepted(&store, "ImuManager", "fprime").await;

        let promoter = Promoter::new(store.clone());
        let first = promoter.promote(&CancellationToken::new()).await.unwrap();
        assert_eq!(first.created(), 1);

        let second = promoter.promote(&CancellationToken::new()).await.unwrap();
        assert!(second.items.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_matches_apply() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_entity(&CanonicalEntity::new(
                "ImuManager",
                CandidateType::Component,
                Ecosystem::new("fprime"),
            ))
            .await
            .unwrap();
        accepted(&store, "ImuManager", "fprime").await;
        accepted(&store, "BatteryHeater", "fprime").await;

        let promoter = Promoter::new(store.clone());
        let analysis = promoter.analyze().await.unwrap();
        assert_eq!(analysis.merges(), 1);
        assert_eq!(analysis.creates(), 1);

        // Dry run mutated nothing.
        assert_eq!(store.unpromoted_accepted().await.unwrap().len(), 2);

        let report = promoter.promote(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.merged(), analysis.merges());
        assert_eq!(report.created(), analysis.creates());
    }

    #[tokio::test]
    async fn test_cancellation_between_items() {
        let store = Arc::new(MemoryStore::new());
        accepted(&store, "A", "fprime").await;
        accepted(&store, "B", "fprime").await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let promoter = Promoter::new(store.clone());
        let report = promoter.promote(&cancel).await.unwrap();

        assert!(report.cancelled);
        assert!(report.items.is_empty());
        // Nothing half promoted.
        assert_eq!(store.unpromoted_accepted().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_relation_recorded_once() {
        use crate::types::finding::{Criticality, RelationCandidate, RelationshipType};

        let store = Arc::new(MemoryStore::new());
        let mut finding = Finding::new(
            CandidateType::Dependency,
            "ImuManager",
            Ecosystem::new("fprime"),
            "evidence",
            EvidenceType::DependencyDeclaration,
            SourceRef::new("u", "s"),
            0.9,
            "explicit",
            profile(),
        )
        .unwrap()
        .with_relation(RelationCandidate {
            source_key: "ImuManager".into(),
            relationship: RelationshipType::DependsOn,
            target_key: "I2CDriver".into(),
            criticality: Some(Criticality::High),
        });
        finding.transition(FindingStatus::Accepted).unwrap();
        store.store_finding(&finding).await.unwrap();

        let promoter = Promoter::new(store.clone());
        promoter.promote(&CancellationToken::new()).await.unwrap();

        assert!(store
            .relationship_exists(
                "imumanager",
                RelationshipType::DependsOn,
                "i2cdriver",
                &Ecosystem::new("fprime"),
            )
            .await
            .unwrap());
    }

    mod create_race {
        use std::sync::Mutex;

        use async_trait::async_trait;
        use uuid::Uuid;

        use super::*;
        use crate::traits::store::{SnapshotStore, StagingStore};
        use crate::types::decision::ValidationDecision;
        use crate::types::entity::CrawlRecord;
        use crate::types::evidence::Snapshot;
        use crate::types::finding::RelationshipType;

        /// Delegates to a memory store, but slips a competing entity in
        /// ahead of the first delegated insert, so the insert itself hits
        /// the duplicate-key constraint the way a concurrent run would.
        struct ContendedStore {
            inner: MemoryStore,
            raced: Mutex<bool>,
            winner: Mutex<Option<Uuid>>,
        }

        impl ContendedStore {
            fn new() -> Self {
                Self {
                    inner: MemoryStore::new(),
                    raced: Mutex::new(false),
                    winner: Mutex::new(None),
                }
            }

            fn winner(&self) -> Uuid {
                self.winner.lock().unwrap().expect("no race was forced")
            }
        }

        #[async_trait]
        impl StagingStore for ContendedStore {
            async fn store_finding(&self, finding: &Finding) -> Result<()> {
                self.inner.store_finding(finding).await
            }

            async fn get_finding(&self, id: Uuid) -> Result<Option<Finding>> {
                self.inner.get_finding(id).await
            }

            async fn update_finding(&self, finding: &Finding) -> Result<()> {
                self.inner.update_finding(finding).await
            }

            async fn findings_by_status(&self, status: FindingStatus) -> Result<Vec<Finding>> {
                self.inner.findings_by_status(status).await
            }

            async fn unpromoted_accepted(&self) -> Result<Vec<Finding>> {
                self.inner.unpromoted_accepted().await
            }

            async fn record_decision(&self, decision: &ValidationDecision) -> Result<()> {
                self.inner.record_decision(decision).await
            }

            async fn decisions_for(&self, finding_id: Uuid) -> Result<Vec<ValidationDecision>> {
                self.inner.decisions_for(finding_id).await
            }

            async fn record_crawl(
                &self,
                source_url: &str,
                ecosystem: &Ecosystem,
                findings_extracted: u64,
            ) -> Result<CrawlRecord> {
                self.inner
                    .record_crawl(source_url, ecosystem, findings_extracted)
                    .await
            }

            async fn crawl_record(&self, source_url: &str) -> Result<Option<CrawlRecord>> {
                self.inner.crawl_record(source_url).await
            }
        }

        #[async_trait]
        impl SnapshotStore for ContendedStore {
            async fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
                self.inner.store_snapshot(snapshot).await
            }

            async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
                self.inner.get_snapshot(id).await
            }
        }

        #[async_trait]
        impl CanonicalStore for ContendedStore {
            async fn find_exact(
                &self,
                canonical_key: &str,
                ecosystem: &Ecosystem,
                entity_type: CandidateType,
            ) -> Result<Option<CanonicalEntity>> {
                self.inner
                    .find_exact(canonical_key, ecosystem, entity_type)
                    .await
            }

            async fn get_entity(&self, id: Uuid) -> Result<Option<CanonicalEntity>> {
                self.inner.get_entity(id).await
            }

            async fn find_resolved_alias(
                &self,
                alias_text: &str,
                ecosystem: &Ecosystem,
            ) -> Result<Option<Alias>> {
                self.inner.find_resolved_alias(alias_text, ecosystem).await
            }

            async fn cross_ecosystem_matches(
                &self,
                canonical_key: &str,
                entity_type: CandidateType,
                ecosystem: &Ecosystem,
            ) -> Result<Vec<CanonicalEntity>> {
                self.inner
                    .cross_ecosystem_matches(canonical_key, entity_type, ecosystem)
                    .await
            }

            async fn similar_keys(
                &self,
                key: &str,
                threshold: f32,
                limit: usize,
            ) -> Result<Vec<(CanonicalEntity, f32)>> {
                self.inner.similar_keys(key, threshold, limit).await
            }

            async fn insert_entity(&self, entity: &CanonicalEntity) -> Result<()> {
                let first = {
                    let mut raced = self.raced.lock().unwrap();
                    !std::mem::replace(&mut *raced, true)
                };
                if first {
                    let competitor = CanonicalEntity::new(
                        entity.display_name.clone(),
                        entity.entity_type,
                        entity.ecosystem.clone(),
                    );
                    self.inner.insert_entity(&competitor).await?;
                    *self.winner.lock().unwrap() = Some(competitor.id);
                }
                self.inner.insert_entity(entity).await
            }

            async fn record_enrichment(
                &self,
                entity_id: Uuid,
                finding_id: Uuid,
                note: &str,
            ) -> Result<()> {
                self.inner
                    .record_enrichment(entity_id, finding_id, note)
                    .await
            }

            async fn insert_alias(&self, alias: &Alias) -> Result<()> {
                self.inner.insert_alias(alias).await
            }

            async fn relationship_exists(
                &self,
                source_key: &str,
                relationship: RelationshipType,
                target_key: &str,
                ecosystem: &Ecosystem,
            ) -> Result<bool> {
                self.inner
                    .relationship_exists(source_key, relationship, target_key, ecosystem)
                    .await
            }

            async fn insert_relationship(
                &self,
                source_key: &str,
                relationship: RelationshipType,
                target_key: &str,
                ecosystem: &Ecosystem,
            ) -> Result<()> {
                self.inner
                    .insert_relationship(source_key, relationship, target_key, ecosystem)
                    .await
            }

            async fn record_equivalence_candidate(
                &self,
                candidate: &EquivalenceCandidate,
            ) -> Result<()> {
                self.inner.record_equivalence_candidate(candidate).await
            }

            async fn equivalence_candidates(&self) -> Result<Vec<EquivalenceCandidate>> {
                self.inner.equivalence_candidates().await
            }
        }

        #[tokio::test]
        async fn test_lost_create_race_merges_into_winner() {
            let store = Arc::new(ContendedStore::new());
            let finding = accepted(&store.inner, "ImuManager", "fprime").await;

            let promoter = Promoter::new(store.clone());
            let report = promoter.promote(&CancellationToken::new()).await.unwrap();

            // The losing insert recovers by merging into the winner's row.
            let winner = store.winner();
            assert_eq!(report.items.len(), 1);
            assert!(matches!(
                report.items[0].action,
                ItemOutcome::Merged {
                    entity_id,
                    basis: MergeBasis::CreateRace,
                } if entity_id == winner
            ));

            let updated = store.get_finding(finding.id).await.unwrap().unwrap();
            assert_eq!(updated.status, FindingStatus::Merged);
            assert_eq!(updated.promotion.unwrap().entity_id, winner);

            // Exactly one current row holds the key.
            let current = store
                .find_exact("imumanager", &Ecosystem::new("fprime"), CandidateType::Component)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(current.id, winner);
            assert_eq!(store.inner.enrichment_notes(winner).await.len(), 1);
        }
    }
}
