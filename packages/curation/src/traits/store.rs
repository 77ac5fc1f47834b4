//! Storage traits for staging, snapshots, and the canonical graph.
//!
//! The storage layer is split into focused traits:
//! - `StagingStore`: findings, decisions, crawl bookkeeping
//! - `SnapshotStore`: content-addressed document captures
//! - `CanonicalStore`: entities, aliases, relationships, enrichments
//! - `CurationStore`: composite trait combining all three
//!
//! Staging writes never require a pre-existing canonical entity: findings
//! may reference entities that do not yet exist in the canonical store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    decision::ValidationDecision,
    entity::{Alias, CanonicalEntity, CrawlRecord, EquivalenceCandidate},
    evidence::Snapshot,
    finding::{CandidateType, Ecosystem, Finding, FindingStatus, RelationshipType},
};

/// Append-mostly persistence for findings and their audit trail.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Stage a new finding.
    async fn store_finding(&self, finding: &Finding) -> Result<()>;

    /// Fetch a finding by id.
    async fn get_finding(&self, id: Uuid) -> Result<Option<Finding>>;

    /// Persist an updated finding (status, promotion linkage).
    async fn update_finding(&self, finding: &Finding) -> Result<()>;

    /// All findings with the given status, oldest first.
    async fn findings_by_status(&self, status: FindingStatus) -> Result<Vec<Finding>>;

    /// Accepted findings not yet promoted, oldest first.
    async fn unpromoted_accepted(&self) -> Result<Vec<Finding>>;

    /// Append a validation decision. Decisions are immutable; corrections
    /// append a new record.
    async fn record_decision(&self, decision: &ValidationDecision) -> Result<()>;

    /// All decisions recorded for a finding, oldest first.
    async fn decisions_for(&self, finding_id: Uuid) -> Result<Vec<ValidationDecision>>;

    /// Record a crawl of a source. Re-recording an already-seen source
    /// increments its counters rather than erroring.
    async fn record_crawl(
        &self,
        source_url: &str,
        ecosystem: &Ecosystem,
        findings_extracted: u64,
    ) -> Result<CrawlRecord>;

    /// Crawl bookkeeping for a source, if it has been seen.
    async fn crawl_record(&self, source_url: &str) -> Result<Option<CrawlRecord>>;
}

/// Content-addressed snapshot persistence.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Store a snapshot. Re-storing the same id is a no-op.
    async fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Fetch a snapshot by id.
    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>>;
}

/// The canonical truth-graph store.
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Exact match on (canonical_key, ecosystem, entity_type), current
    /// rows only.
    async fn find_exact(
        &self,
        canonical_key: &str,
        ecosystem: &Ecosystem,
        entity_type: CandidateType,
    ) -> Result<Option<CanonicalEntity>>;

    /// Fetch an entity by id.
    async fn get_entity(&self, id: Uuid) -> Result<Option<CanonicalEntity>>;

    /// A resolved alias for (alias_text, ecosystem), if one exists.
    async fn find_resolved_alias(
        &self,
        alias_text: &str,
        ecosystem: &Ecosystem,
    ) -> Result<Option<Alias>>;

    /// Current entities with the same key and type in a *different*
    /// ecosystem.
    async fn cross_ecosystem_matches(
        &self,
        canonical_key: &str,
        entity_type: CandidateType,
        ecosystem: &Ecosystem,
    ) -> Result<Vec<CanonicalEntity>>;

    /// Current entities whose keys are trigram-similar to `key`, ranked by
    /// similarity descending. Only matches at or above `threshold` are
    /// returned.
    async fn similar_keys(
        &self,
        key: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(CanonicalEntity, f32)>>;

    /// Insert a new canonical entity.
    ///
    /// Must enforce the current-row uniqueness invariant: a second current
    /// row for the same (key, ecosystem, type) fails with
    /// [`crate::error::CurationError::DuplicateKey`].
    async fn insert_entity(&self, entity: &CanonicalEntity) -> Result<()>;

    /// Record an enrichment note against an entity (tracks merges) and
    /// bump its enriched-at timestamp.
    async fn record_enrichment(&self, entity_id: Uuid, finding_id: Uuid, note: &str)
        -> Result<()>;

    /// Insert an alias.
    async fn insert_alias(&self, alias: &Alias) -> Result<()>;

    /// Whether an identical (source, relationship, target) triple already
    /// exists in the given ecosystem.
    async fn relationship_exists(
        &self,
        source_key: &str,
        relationship: RelationshipType,
        target_key: &str,
        ecosystem: &Ecosystem,
    ) -> Result<bool>;

    /// Record a relationship triple.
    async fn insert_relationship(
        &self,
        source_key: &str,
        relationship: RelationshipType,
        target_key: &str,
        ecosystem: &Ecosystem,
    ) -> Result<()>;

    /// Record a cross-ecosystem equivalence candidate for later human
    /// linking.
    async fn record_equivalence_candidate(
        &self,
        candidate: &EquivalenceCandidate,
    ) -> Result<()>;

    /// All recorded equivalence candidates, oldest first.
    async fn equivalence_candidates(&self) -> Result<Vec<EquivalenceCandidate>>;
}

/// Composite storage trait used by the pipeline.
pub trait CurationStore: StagingStore + SnapshotStore + CanonicalStore {}

// Blanket implementation: anything implementing all three is a CurationStore
impl<T: StagingStore + SnapshotStore + CanonicalStore> CurationStore for T {}
