//! SQLite storage implementation.
//!
//! File-based persistence for single-operator deployments and local
//! development. Timestamps are RFC 3339 TEXT; structured fields
//! (dimensions, relation, promotion, decider) are JSON TEXT columns.
//!
//! The current-row uniqueness invariant on entities is a partial unique
//! index, so a promotion create race surfaces as a constraint violation
//! and is re-classified by the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{CurationError, Result};
use crate::traits::store::{CanonicalStore, SnapshotStore, StagingStore};
use crate::types::{
    decision::{Decider, DecisionValue, ValidationDecision},
    dimensions::EpistemicProfile,
    entity::{Alias, AliasType, CanonicalEntity, CrawlRecord, EquivalenceCandidate,
        ResolutionStatus},
    evidence::{EvidenceType, Snapshot, SourceRef},
    finding::{
        normalize_key, CandidateType, Ecosystem, Finding, FindingStatus, PromotionRecord,
        RelationCandidate, RelationshipType,
    },
};
use crate::validator::similarity::similarity;

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> CurationError {
    CurationError::Storage(Box::new(e))
}

fn parse_rfc3339(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CurationError::Storage(format!("invalid date {text:?}: {e}").into()))
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text)
        .map_err(|e| CurationError::Storage(format!("invalid uuid {text:?}: {e}").into()))
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| CurationError::Storage(format!("invalid {what} JSON: {e}").into()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CurationError::Storage(Box::new(e)))
}

/// SQLite-backed implementation of the full storage surface.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and migrate.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - in-memory database (ephemeral)
    /// - `sqlite:./curator.db?mode=rwc` - file, created if missing
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(storage_err)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                source_url TEXT NOT NULL,
                payload TEXT NOT NULL,
                checksum TEXT,
                fetched_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_source_url ON snapshots(source_url);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS findings (
                id TEXT PRIMARY KEY,
                candidate_type TEXT NOT NULL,
                candidate_key TEXT NOT NULL,
                ecosystem TEXT NOT NULL,
                raw_evidence TEXT NOT NULL,
                evidence_type TEXT NOT NULL,
                source_url TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                confidence REAL NOT NULL,
                confidence_reasoning TEXT NOT NULL,
                dimensions TEXT NOT NULL,
                needs_human_review INTEGER NOT NULL,
                status TEXT NOT NULL,
                relation TEXT,
                promotion TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_findings_status ON findings(status);
            CREATE INDEX IF NOT EXISTS idx_findings_key ON findings(candidate_key, ecosystem);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                finding_id TEXT NOT NULL,
                decider TEXT NOT NULL,
                decision TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                confidence REAL,
                evidence_snapshot TEXT NOT NULL,
                evidence_checksum TEXT,
                evidence_location TEXT,
                decided_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_decisions_finding ON decisions(finding_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crawled_sources (
                source_url TEXT PRIMARY KEY,
                ecosystem TEXT NOT NULL,
                last_crawled_at TEXT NOT NULL,
                crawl_count INTEGER NOT NULL,
                findings_extracted INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                canonical_key TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                ecosystem TEXT NOT NULL,
                display_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                enriched_at TEXT,
                is_current INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_current_identity
                ON entities(canonical_key, ecosystem, entity_type)
                WHERE is_current = 1;
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS aliases (
                alias_text TEXT NOT NULL,
                ecosystem TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                alias_type TEXT NOT NULL,
                resolution_status TEXT NOT NULL,
                PRIMARY KEY (alias_text, ecosystem)
            );

            CREATE TABLE IF NOT EXISTS relationships (
                source_key TEXT NOT NULL,
                relationship TEXT NOT NULL,
                target_key TEXT NOT NULL,
                ecosystem TEXT NOT NULL,
                PRIMARY KEY (source_key, relationship, target_key, ecosystem)
            );

            CREATE TABLE IF NOT EXISTS enrichments (
                entity_id TEXT NOT NULL,
                finding_id TEXT NOT NULL,
                note TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_enrichments_entity ON enrichments(entity_id);

            CREATE TABLE IF NOT EXISTS equivalence_candidates (
                id TEXT PRIMARY KEY,
                finding_id TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                matched_entity_id TEXT NOT NULL,
                matched_ecosystem TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct FindingRow {
    id: String,
    candidate_type: String,
    candidate_key: String,
    ecosystem: String,
    raw_evidence: String,
    evidence_type: String,
    source_url: String,
    snapshot_id: String,
    confidence: f64,
    confidence_reasoning: String,
    dimensions: String,
    needs_human_review: i64,
    status: String,
    relation: Option<String>,
    promotion: Option<String>,
    created_at: String,
}

impl FindingRow {
    fn into_finding(self) -> Result<Finding> {
        let candidate_type: CandidateType = self
            .candidate_type
            .parse()
            .map_err(|e| CurationError::Storage(format!("bad candidate_type: {e}").into()))?;
        let evidence_type: EvidenceType = self
            .evidence_type
            .parse()
            .map_err(|e| CurationError::Storage(format!("bad evidence_type: {e}").into()))?;
        let status: FindingStatus = self
            .status
            .parse()
            .map_err(|e| CurationError::Storage(format!("bad status: {e}").into()))?;
        let dimensions: EpistemicProfile = parse_json(&self.dimensions, "dimensions")?;
        let relation: Option<RelationCandidate> = self
            .relation
            .as_deref()
            .map(|r| parse_json(r, "relation"))
            .transpose()?;
        let promotion: Option<PromotionRecord> = self
            .promotion
            .as_deref()
            .map(|p| parse_json(p, "promotion"))
            .transpose()?;

        Ok(Finding {
            id: parse_uuid(&self.id)?,
            candidate_type,
            candidate_key: self.candidate_key,
            ecosystem: Ecosystem::new(&self.ecosystem),
            raw_evidence: self.raw_evidence,
            evidence_type,
            source: SourceRef::new(self.source_url, self.snapshot_id),
            confidence: self.confidence as f32,
            confidence_reasoning: self.confidence_reasoning,
            dimensions,
            needs_human_review: self.needs_human_review != 0,
            status,
            relation,
            promotion,
            created_at: parse_rfc3339(&self.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct EntityRow {
    id: String,
    canonical_key: String,
    entity_type: String,
    ecosystem: String,
    display_name: String,
    created_at: String,
    enriched_at: Option<String>,
    is_current: i64,
}

impl EntityRow {
    fn into_entity(self) -> Result<CanonicalEntity> {
        Ok(CanonicalEntity {
            id: parse_uuid(&self.id)?,
            canonical_key: self.canonical_key,
            entity_type: self
                .entity_type
                .parse()
                .map_err(|e| CurationError::Storage(format!("bad entity_type: {e}").into()))?,
            ecosystem: Ecosystem::new(&self.ecosystem),
            display_name: self.display_name,
            created_at: parse_rfc3339(&self.created_at)?,
            enriched_at: self
                .enriched_at
                .as_deref()
                .map(parse_rfc3339)
                .transpose()?,
            is_current: self.is_current != 0,
        })
    }
}

#[derive(Debug, FromRow)]
struct DecisionRow {
    id: String,
    finding_id: String,
    decider: String,
    decision: String,
    reasoning: String,
    confidence: Option<f64>,
    evidence_snapshot: String,
    evidence_checksum: Option<String>,
    evidence_location: Option<String>,
    decided_at: String,
}

impl DecisionRow {
    fn into_decision(self) -> Result<ValidationDecision> {
        let decider: Decider = parse_json(&self.decider, "decider")?;
        let decision: DecisionValue = parse_json(&self.decision, "decision")?;
        Ok(ValidationDecision {
            id: parse_uuid(&self.id)?,
            finding_id: parse_uuid(&self.finding_id)?,
            decider,
            decision,
            reasoning: self.reasoning,
            confidence: self.confidence.map(|c| c as f32),
            evidence_snapshot: self.evidence_snapshot,
            evidence_checksum: self.evidence_checksum,
            evidence_location: self
                .evidence_location
                .as_deref()
                .map(|loc| parse_json(loc, "evidence_location"))
                .transpose()?,
            decided_at: parse_rfc3339(&self.decided_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct CrawlRow {
    source_url: String,
    ecosystem: String,
    last_crawled_at: String,
    crawl_count: i64,
    findings_extracted: i64,
}

impl CrawlRow {
    fn into_record(self) -> Result<CrawlRecord> {
        Ok(CrawlRecord {
            source_url: self.source_url,
            ecosystem: Ecosystem::new(&self.ecosystem),
            last_crawled_at: parse_rfc3339(&self.last_crawled_at)?,
            crawl_count: self.crawl_count as u32,
            findings_extracted: self.findings_extracted as u64,
        })
    }
}

const FINDING_COLUMNS: &str = "id, candidate_type, candidate_key, ecosystem, raw_evidence, \
     evidence_type, source_url, snapshot_id, confidence, confidence_reasoning, dimensions, \
     needs_human_review, status, relation, promotion, created_at";

const ENTITY_COLUMNS: &str =
    "id, canonical_key, entity_type, ecosystem, display_name, created_at, enriched_at, is_current";

impl SqliteStore {
    async fn upsert_finding(&self, finding: &Finding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO findings (id, candidate_type, candidate_key, ecosystem, raw_evidence,
                evidence_type, source_url, snapshot_id, confidence, confidence_reasoning,
                dimensions, needs_human_review, status, relation, promotion, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                relation = excluded.relation,
                promotion = excluded.promotion,
                needs_human_review = excluded.needs_human_review
            "#,
        )
        .bind(finding.id.to_string())
        .bind(finding.candidate_type.as_str())
        .bind(&finding.candidate_key)
        .bind(finding.ecosystem.as_str())
        .bind(&finding.raw_evidence)
        .bind(finding.evidence_type.as_str())
        .bind(&finding.source.url)
        .bind(&finding.source.snapshot_id)
        .bind(finding.confidence as f64)
        .bind(&finding.confidence_reasoning)
        .bind(to_json(&finding.dimensions)?)
        .bind(finding.needs_human_review as i64)
        .bind(finding.status.as_str())
        .bind(finding.relation.as_ref().map(to_json).transpose()?)
        .bind(finding.promotion.as_ref().map(to_json).transpose()?)
        .bind(finding.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl StagingStore for SqliteStore {
    async fn store_finding(&self, finding: &Finding) -> Result<()> {
        self.upsert_finding(finding).await
    }

    async fn get_finding(&self, id: Uuid) -> Result<Option<Finding>> {
        let row = sqlx::query_as::<_, FindingRow>(&format!(
            "SELECT {FINDING_COLUMNS} FROM findings WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(FindingRow::into_finding).transpose()
    }

    async fn update_finding(&self, finding: &Finding) -> Result<()> {
        if self.get_finding(finding.id).await?.is_none() {
            return Err(CurationError::FindingNotFound { id: finding.id });
        }
        self.upsert_finding(finding).await
    }

    async fn findings_by_status(&self, status: FindingStatus) -> Result<Vec<Finding>> {
        let rows = sqlx::query_as::<_, FindingRow>(&format!(
            "SELECT {FINDING_COLUMNS} FROM findings WHERE status = ? ORDER BY created_at"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(FindingRow::into_finding).collect()
    }

    async fn unpromoted_accepted(&self) -> Result<Vec<Finding>> {
        let rows = sqlx::query_as::<_, FindingRow>(&format!(
            "SELECT {FINDING_COLUMNS} FROM findings \
             WHERE status = 'accepted' AND promotion IS NULL ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(FindingRow::into_finding).collect()
    }

    async fn record_decision(&self, decision: &ValidationDecision) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO decisions (id, finding_id, decider, decision, reasoning, confidence,
                evidence_snapshot, evidence_checksum, evidence_location, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(decision.id.to_string())
        .bind(decision.finding_id.to_string())
        .bind(to_json(&decision.decider)?)
        .bind(to_json(&decision.decision)?)
        .bind(&decision.reasoning)
        .bind(decision.confidence.map(|c| c as f64))
        .bind(&decision.evidence_snapshot)
        .bind(&decision.evidence_checksum)
        .bind(
            decision
                .evidence_location
                .as_ref()
                .map(to_json)
                .transpose()?,
        )
        .bind(decision.decided_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn decisions_for(&self, finding_id: Uuid) -> Result<Vec<ValidationDecision>> {
        let rows = sqlx::query_as::<_, DecisionRow>(
            "SELECT id, finding_id, decider, decision, reasoning, confidence, \
             evidence_snapshot, evidence_checksum, evidence_location, decided_at \
             FROM decisions WHERE finding_id = ? ORDER BY decided_at",
        )
        .bind(finding_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(DecisionRow::into_decision).collect()
    }

    async fn record_crawl(
        &self,
        source_url: &str,
        ecosystem: &Ecosystem,
        findings_extracted: u64,
    ) -> Result<CrawlRecord> {
        sqlx::query(
            r#"
            INSERT INTO crawled_sources (source_url, ecosystem, last_crawled_at, crawl_count,
                findings_extracted)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(source_url) DO UPDATE SET
                last_crawled_at = excluded.last_crawled_at,
                crawl_count = crawl_count + 1,
                findings_extracted = findings_extracted + excluded.findings_extracted
            "#,
        )
        .bind(source_url)
        .bind(ecosystem.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(findings_extracted as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        self.crawl_record(source_url).await?.ok_or_else(|| {
            CurationError::Storage(format!("crawl record vanished for {source_url}").into())
        })
    }

    async fn crawl_record(&self, source_url: &str) -> Result<Option<CrawlRecord>> {
        let row = sqlx::query_as::<_, CrawlRow>(
            "SELECT source_url, ecosystem, last_crawled_at, crawl_count, findings_extracted \
             FROM crawled_sources WHERE source_url = ?",
        )
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(CrawlRow::into_record).transpose()
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        // Content-addressed: conflicts on id mean identical bytes.
        sqlx::query(
            r#"
            INSERT INTO snapshots (id, source_url, payload, checksum, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.source_url)
        .bind(&snapshot.payload)
        .bind(&snapshot.checksum)
        .bind(snapshot.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        let row: Option<(String, String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT id, source_url, payload, checksum, fetched_at FROM snapshots WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some((id, source_url, payload, checksum, fetched_at)) => Ok(Some(Snapshot {
                id,
                source_url,
                payload,
                checksum,
                fetched_at: parse_rfc3339(&fetched_at)?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CanonicalStore for SqliteStore {
    async fn find_exact(
        &self,
        canonical_key: &str,
        ecosystem: &Ecosystem,
        entity_type: CandidateType,
    ) -> Result<Option<CanonicalEntity>> {
        let row = sqlx::query_as::<_, EntityRow>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE canonical_key = ? AND ecosystem = ? AND entity_type = ? AND is_current = 1"
        ))
        .bind(canonical_key)
        .bind(ecosystem.as_str())
        .bind(entity_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(EntityRow::into_entity).transpose()
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<CanonicalEntity>> {
        let row = sqlx::query_as::<_, EntityRow>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(EntityRow::into_entity).transpose()
    }

    async fn find_resolved_alias(
        &self,
        alias_text: &str,
        ecosystem: &Ecosystem,
    ) -> Result<Option<Alias>> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT alias_text, ecosystem, entity_id, alias_type, resolution_status \
             FROM aliases WHERE alias_text = ? AND ecosystem = ? AND resolution_status = 'resolved'",
        )
        .bind(normalize_key(alias_text))
        .bind(ecosystem.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some((alias_text, ecosystem, entity_id, alias_type, _)) => {
                let alias_type = match alias_type.as_str() {
                    "abbreviation" => AliasType::Abbreviation,
                    "rename" => AliasType::Rename,
                    "spelling" => AliasType::Spelling,
                    "cross_ecosystem" => AliasType::CrossEcosystem,
                    other => {
                        return Err(CurationError::Storage(
                            format!("bad alias_type {other:?}").into(),
                        ))
                    }
                };
                Ok(Some(Alias {
                    alias_text,
                    ecosystem: Ecosystem::new(&ecosystem),
                    entity_id: parse_uuid(&entity_id)?,
                    alias_type,
                    resolution_status: ResolutionStatus::Resolved,
                }))
            }
            None => Ok(None),
        }
    }

    async fn cross_ecosystem_matches(
        &self,
        canonical_key: &str,
        entity_type: CandidateType,
        ecosystem: &Ecosystem,
    ) -> Result<Vec<CanonicalEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE canonical_key = ? AND entity_type = ? AND ecosystem != ? AND is_current = 1 \
             ORDER BY created_at"
        ))
        .bind(canonical_key)
        .bind(entity_type.as_str())
        .bind(ecosystem.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    async fn similar_keys(
        &self,
        key: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(CanonicalEntity, f32)>> {
        // SQLite has no trigram operator; score in-process over current rows.
        let rows = sqlx::query_as::<_, EntityRow>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE is_current = 1"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut scored = Vec::new();
        for row in rows {
            let entity = row.into_entity()?;
            let score = similarity(key, &entity.canonical_key);
            if score >= threshold {
                scored.push((entity, score));
            }
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn insert_entity(&self, entity: &CanonicalEntity) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO entities (id, canonical_key, entity_type, ecosystem, display_name,
                created_at, enriched_at, is_current)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entity.id.to_string())
        .bind(&entity.canonical_key)
        .bind(entity.entity_type.as_str())
        .bind(entity.ecosystem.as_str())
        .bind(&entity.display_name)
        .bind(entity.created_at.to_rfc3339())
        .bind(entity.enriched_at.map(|t| t.to_rfc3339()))
        .bind(entity.is_current as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(CurationError::DuplicateKey {
                    key: entity.canonical_key.clone(),
                    ecosystem: entity.ecosystem.as_str().to_string(),
                })
            }
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn record_enrichment(
        &self,
        entity_id: Uuid,
        finding_id: Uuid,
        note: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO enrichments (entity_id, finding_id, note, created_at) VALUES (?, ?, ?, ?)")
            .bind(entity_id.to_string())
            .bind(finding_id.to_string())
            .bind(note)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query("UPDATE entities SET enriched_at = ? WHERE id = ?")
            .bind(&now)
            .bind(entity_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn insert_alias(&self, alias: &Alias) -> Result<()> {
        let status = match alias.resolution_status {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::Unresolved => "unresolved",
        };
        sqlx::query(
            r#"
            INSERT INTO aliases (alias_text, ecosystem, entity_id, alias_type, resolution_status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(alias_text, ecosystem) DO UPDATE SET
                entity_id = excluded.entity_id,
                alias_type = excluded.alias_type,
                resolution_status = excluded.resolution_status
            "#,
        )
        .bind(&alias.alias_text)
        .bind(alias.ecosystem.as_str())
        .bind(alias.entity_id.to_string())
        .bind(alias.alias_type.as_str())
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn relationship_exists(
        &self,
        source_key: &str,
        relationship: RelationshipType,
        target_key: &str,
        ecosystem: &Ecosystem,
    ) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM relationships \
             WHERE source_key = ? AND relationship = ? AND target_key = ? AND ecosystem = ?",
        )
        .bind(normalize_key(source_key))
        .bind(relationship.as_str())
        .bind(normalize_key(target_key))
        .bind(ecosystem.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(count.0 > 0)
    }

    async fn insert_relationship(
        &self,
        source_key: &str,
        relationship: RelationshipType,
        target_key: &str,
        ecosystem: &Ecosystem,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO relationships (source_key, relationship, target_key, ecosystem) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(normalize_key(source_key))
        .bind(relationship.as_str())
        .bind(normalize_key(target_key))
        .bind(ecosystem.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn record_equivalence_candidate(&self, candidate: &EquivalenceCandidate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO equivalence_candidates (id, finding_id, entity_id, matched_entity_id,
                matched_ecosystem, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(candidate.id.to_string())
        .bind(candidate.finding_id.to_string())
        .bind(candidate.entity_id.to_string())
        .bind(candidate.matched_entity_id.to_string())
        .bind(candidate.matched_ecosystem.as_str())
        .bind(candidate.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn equivalence_candidates(&self) -> Result<Vec<EquivalenceCandidate>> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, finding_id, entity_id, matched_entity_id, matched_ecosystem, created_at \
             FROM equivalence_candidates ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(
                |(id, finding_id, entity_id, matched_entity_id, matched_ecosystem, created_at)| {
                    Ok(EquivalenceCandidate {
                        id: parse_uuid(&id)?,
                        finding_id: parse_uuid(&finding_id)?,
                        entity_id: parse_uuid(&entity_id)?,
                        matched_entity_id: parse_uuid(&matched_entity_id)?,
                        matched_ecosystem: Ecosystem::new(&matched_ecosystem),
                        created_at: parse_rfc3339(&created_at)?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::dimensions::{
        Assessment, Carrier, ContactLevel, Directionality, Formalizability, KnowledgeForm,
        Temporality,
    };
    use crate::types::evidence::EvidenceLocation;
    use crate::types::finding::PromotionAction;

    async fn test_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

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

    fn finding() -> Finding {
        Finding::new(
            CandidateType::Component,
            "ImuManager",
            Ecosystem::new("fprime"),
            "ImuManager polls every 100ms",
            EvidenceType::InterfaceSpecification,
            SourceRef::new("https://docs.example.com/imu", "snap1"),
            0.9,
            "explicit",
            profile(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_finding_round_trip() {
        let store = test_store().await;
        let mut f = finding();
        store.store_finding(&f).await.unwrap();

        let loaded = store.get_finding(f.id).await.unwrap().unwrap();
        assert_eq!(loaded.candidate_key, "ImuManager");
        assert_eq!(loaded.status, FindingStatus::Pending);
        assert_eq!(loaded.dimensions, f.dimensions);

        f.transition(FindingStatus::Accepted).unwrap();
        f.mark_promoted(Uuid::new_v4(), PromotionAction::Created)
            .unwrap();
        store.update_finding(&f).await.unwrap();

        let loaded = store.get_finding(f.id).await.unwrap().unwrap();
        assert!(loaded.promotion.is_some());
        assert!(store.unpromoted_accepted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_unique_index_maps_to_duplicate_key() {
        let store = test_store().await;
        let eco = Ecosystem::new("fprime");
        store
            .insert_entity(&CanonicalEntity::new(
                "ImuManager",
                CandidateType::Component,
                eco.clone(),
            ))
            .await
            .unwrap();

        let err = store
            .insert_entity(&CanonicalEntity::new(
                "imumanager",
                CandidateType::Component,
                eco,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CurationError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_crawl_counter_upsert() {
        let store = test_store().await;
        let eco = Ecosystem::new("fprime");
        let first = store.record_crawl("https://d/imu", &eco, 4).await.unwrap();
        let second = store.record_crawl("https://d/imu", &eco, 1).await.unwrap();
        assert_eq!(first.crawl_count, 1);
        assert_eq!(second.crawl_count, 2);
        assert_eq!(second.findings_extracted, 5);
    }

    #[tokio::test]
    async fn test_decision_append_only() {
        let store = test_store().await;
        let f = finding();
        store.store_finding(&f).await.unwrap();

        for decision in [DecisionValue::Defer, DecisionValue::Accept] {
            store
                .record_decision(
                    &ValidationDecision::new(
                        f.id,
                        Decider::Agent {
                            run_id: "run-1".into(),
                        },
                        decision,
                        "reasoning",
                        &f.raw_evidence,
                    )
                    .with_evidence_audit(
                        Some(Snapshot::hash_content(&f.raw_evidence)),
                        Some(EvidenceLocation {
                            offset: 12,
                            length: f.raw_evidence.len(),
                        }),
                    ),
                )
                .await
                .unwrap();
        }

        let decisions = store.decisions_for(f.id).await.unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].decision, DecisionValue::Defer);
        assert_eq!(decisions[1].decision, DecisionValue::Accept);
        // Audit fields survive the round trip.
        assert_eq!(
            decisions[1].evidence_checksum.as_deref(),
            Some(Snapshot::hash_content(&f.raw_evidence).as_str())
        );
        assert_eq!(decisions[1].evidence_location.unwrap().offset, 12);
    }

    #[tokio::test]
    async fn test_alias_and_relationship_queries() {
        let store = test_store().await;
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

        let hit = store.find_resolved_alias("tlmchan", &eco).await.unwrap();
        assert_eq!(hit.unwrap().entity_id, entity.id);

        store
            .insert_relationship("A", RelationshipType::DependsOn, "B", &eco)
            .await
            .unwrap();
        assert!(store
            .relationship_exists("a", RelationshipType::DependsOn, "b", &eco)
            .await
            .unwrap());
        assert!(!store
            .relationship_exists("a", RelationshipType::Requires, "b", &eco)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = test_store().await;
        let snapshot = Snapshot::capture("https://d/imu", "payload text");
        store.store_snapshot(&snapshot).await.unwrap();
        store.store_snapshot(&snapshot).await.unwrap(); // no-op

        let loaded = store.get_snapshot(&snapshot.id).await.unwrap().unwrap();
        assert_eq!(loaded.payload, "payload text");
        assert_eq!(loaded.checksum, snapshot.checksum);
    }

    #[tokio::test]
    async fn test_similar_keys_scored_in_process() {
        let store = test_store().await;
        let eco = Ecosystem::new("fprime");
        for name in ["radio_manager", "battery_heater"] {
            store
                .insert_entity(&CanonicalEntity::new(
                    name,
                    CandidateType::Component,
                    eco.clone(),
                ))
                .await
                .unwrap();
        }

        let hits = store.similar_keys("radio_mgr", 0.3, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.canonical_key, "radio_manager");
    }
}
