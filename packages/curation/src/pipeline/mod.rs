//! The curation pipeline: fetch, extract, validate, stage, promote.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RejectReason, Result};
use crate::extractor::Extractor;
use crate::promotion::{AnalysisReport, BatchReport, Promoter};
use crate::review::{HumanDecision, PendingApproval, ReviewBoard};
use crate::traits::llm::Llm;
use crate::traits::source::DocumentSource;
use crate::traits::store::CurationStore;
use crate::types::config::CuratorConfig;
use crate::types::entity::CrawlRecord;
use crate::types::finding::{Ecosystem, Finding};
use crate::validator::{ValidationOutcome, Validator};

/// What one ingest pass did with a source document.
#[derive(Debug)]
pub struct IngestReport {
    pub snapshot_id: String,
    /// Candidates that passed the extraction boundary
    pub extracted: usize,
    /// Candidates dropped at the boundary, with reasons
    pub boundary_rejects: Vec<RejectReason>,
    pub accepted: Vec<Finding>,
    pub rejected: Vec<Finding>,
    /// Findings suspended for human review
    pub pending: Vec<PendingApproval>,
    pub crawl: CrawlRecord,
}

/// The end-to-end curation agent.
///
/// Generic over its three external seams: storage, the LLM, and the
/// document source. A review board is optional; without one, suspended
/// findings are still staged and returned as pending approvals.
pub struct Curator<S, L: Llm, D> {
    store: Arc<S>,
    extractor: Extractor<L>,
    source: D,
    validator: Validator<S>,
    promoter: Promoter<S>,
    board: Option<Arc<dyn ReviewBoard>>,
    config: CuratorConfig,
}

impl<S, L, D> Curator<S, L, D>
where
    S: CurationStore,
    L: Llm,
    D: DocumentSource,
{
    pub fn new(store: Arc<S>, llm: L, source: D, config: CuratorConfig) -> Self {
        Self {
            extractor: Extractor::new(llm, config.clone()),
            validator: Validator::new(store.clone(), config.clone()),
            promoter: Promoter::new(store.clone()),
            store,
            source,
            board: None,
            config,
        }
    }

    pub fn with_board(mut self, board: Arc<dyn ReviewBoard>) -> Self {
        self.board = Some(board);
        self
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<crate::types::evidence::Snapshot> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.source.fetch(url).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_retryable() && attempt < self.config.fetch_attempts => {
                    warn!(url, attempt, error = %e, "fetch failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch one document, extract candidates, validate and stage them.
    ///
    /// Fetch failures retry up to the configured attempt count; everything
    /// past the snapshot write is per-candidate. The crawl record is
    /// updated last, so a crashed ingest does not count as a crawl.
    pub async fn ingest(&self, url: &str, ecosystem: &Ecosystem) -> Result<IngestReport> {
        let snapshot = self.fetch_with_retry(url).await?;
        self.store.store_snapshot(&snapshot).await?;

        let batch = self.extractor.extract(&snapshot).await?;
        let extracted = batch.findings.len();
        info!(
            url,
            extracted,
            boundary_rejects = batch.rejected.len(),
            "extraction finished"
        );

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut pending = Vec::new();

        for mut finding in batch.findings {
            self.store.store_finding(&finding).await?;
            match self.validator.validate(&mut finding).await? {
                ValidationOutcome::Accepted { .. } => accepted.push(finding),
                ValidationOutcome::Rejected { .. } => rejected.push(finding),
                ValidationOutcome::NeedsReview { pending: p, .. } => {
                    if let Some(board) = &self.board {
                        // Board publish is best-effort; the staging store
                        // already holds the suspended finding.
                        if let Err(e) = board.publish(&p.card).await {
                            warn!(finding = %p.finding_id, error = %e, "board publish failed");
                        }
                    }
                    pending.push(p);
                }
            }
        }

        let crawl = self
            .store
            .record_crawl(url, ecosystem, extracted as u64)
            .await?;

        Ok(IngestReport {
            snapshot_id: snapshot.id,
            extracted,
            boundary_rejects: batch.rejected.into_iter().map(|r| r.reason).collect(),
            accepted,
            rejected,
            pending,
            crawl,
        })
    }

    /// Dry-run promotion analysis. Mutates nothing.
    pub async fn analyze(&self) -> Result<AnalysisReport> {
        self.promoter.analyze().await
    }

    /// Promote all accepted, unpromoted findings.
    pub async fn promote(&self, cancel: &CancellationToken) -> Result<BatchReport> {
        self.promoter.promote(cancel).await
    }

    /// Apply a human verdict to a suspended finding.
    pub async fn resume(
        &self,
        approval: &PendingApproval,
        decision: HumanDecision,
    ) -> Result<Finding> {
        self.validator.resume(approval, decision).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::HumanVerdict;
    use crate::stores::memory::MemoryStore;
    use crate::testing::{MockBoard, MockLlm, MockSource};
    use crate::traits::store::{SnapshotStore, StagingStore};
    use crate::types::finding::FindingStatus;

    const DOC: &str = "ImuManager polls the IMU every 100ms over I2C.";

    fn extraction_response(evidence: &str) -> String {
        serde_json::json!({
            "findings": [{
                "candidate_type": "component",
                "candidate_key": "ImuManager",
                "ecosystem": "fprime",
                "raw_evidence": evidence,
                "evidence_type": "interface_specification",
                "confidence": 0.9,
                "confidence_reasoning": "explicit",
                "dimensions": {
                    "knowledge_form": {"value": "inferred", "confidence": 0.9, "reasoning": "doc"},
                    "contact": {"value": "mediated", "confidence": 0.9, "reasoning": "doc"},
                    "directionality": {"value": "forward", "confidence": 0.9, "reasoning": "doc"},
                    "temporality": {"value": "sequence", "confidence": 0.9, "reasoning": "doc"},
                    "formalizability": {"value": "portable", "confidence": 0.9, "reasoning": "doc"},
                    "carrier": {"value": "artifact", "confidence": 0.9, "reasoning": "doc"}
                }
            }]
        })
        .to_string()
    }

    fn curator(
        store: Arc<MemoryStore>,
        llm: MockLlm,
        source: MockSource,
    ) -> Curator<MemoryStore, MockLlm, MockSource> {
        Curator::new(store, llm, source, CuratorConfig::default())
    }

    #[tokio::test]
    async fn test_ingest_accepts_verbatim_evidence() {
        let store = Arc::new(MemoryStore::new());
        let c = curator(
            store.clone(),
            MockLlm::returning(extraction_response("polls the IMU every 100ms")),
            MockSource::new().with_page("https://d/imu", DOC),
        );

        let report = c.ingest("https://d/imu", &Ecosystem::new("fprime")).await.unwrap();

        assert_eq!(report.extracted, 1);
        assert_eq!(report.accepted.len(), 1);
        assert!(report.pending.is_empty());
        assert_eq!(report.crawl.crawl_count, 1);
        assert_eq!(report.crawl.findings_extracted, 1);
        assert!(store
            .get_snapshot(&report.snapshot_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_ingest_retries_fetch() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new()
            .with_page("https://d/imu", DOC)
            .failing_times(2);
        let c = curator(
            store,
            MockLlm::returning(extraction_response("polls the IMU every 100ms")),
            source,
        );

        let report = c.ingest("https://d/imu", &Ecosystem::new("fprime")).await.unwrap();
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(c.source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_ingest_gives_up_after_attempts() {
        let store = Arc::new(MemoryStore::new());
        let source = MockSource::new()
            .with_page("https://d/imu", DOC)
            .failing_times(10);
        let c = curator(store.clone(), MockLlm::returning("{}"), source);

        let err = c
            .ingest("https://d/imu", &Ecosystem::new("fprime"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(c.source.fetch_count(), 3); // default fetch_attempts
        assert!(store.crawl_record("https://d/imu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paraphrased_evidence_suspends_and_publishes() {
        let store = Arc::new(MemoryStore::new());
        let board = Arc::new(MockBoard::new());
        let c = curator(
            store.clone(),
            MockLlm::returning(extraction_response("the IMU is sampled ten times a second")),
            MockSource::new().with_page("https://d/imu", DOC),
        )
        .with_board(board.clone());

        let report = c.ingest("https://d/imu", &Ecosystem::new("fprime")).await.unwrap();

        assert_eq!(report.pending.len(), 1);
        assert_eq!(board.cards().len(), 1);

        let staged = store
            .get_finding(report.pending[0].finding_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staged.status, FindingStatus::NeedsContext);
    }

    #[tokio::test]
    async fn test_full_cycle_ingest_resume_promote() {
        let store = Arc::new(MemoryStore::new());
        let c = curator(
            store.clone(),
            MockLlm::returning(extraction_response("the IMU is sampled ten times a second")),
            MockSource::new().with_page("https://d/imu", DOC),
        );

        let report = c.ingest("https://d/imu", &Ecosystem::new("fprime")).await.unwrap();
        let pending = &report.pending[0];

        c.resume(
            pending,
            HumanDecision {
                reviewer: "mross".to_string(),
                verdict: HumanVerdict::Accept,
                reasoning: "verified manually".to_string(),
            },
        )
        .await
        .unwrap();

        let analysis = c.analyze().await.unwrap();
        assert_eq!(analysis.creates(), 1);

        let batch = c.promote(&CancellationToken::new()).await.unwrap();
        assert_eq!(batch.created(), 1);

        let promoted = store
            .get_finding(pending.finding_id)
            .await
            .unwrap()
            .unwrap();
        assert!(promoted.promotion.is_some());
    }
}
