//! Validation: lineage verification, duplicate detection, review routing.

pub mod dedup;
pub mod lineage;
pub mod similarity;

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CurationError, RejectReason, Result};
use crate::review::{HumanDecision, HumanVerdict, PendingApproval, ReviewCard};
use crate::traits::store::CurationStore;
use crate::types::config::CuratorConfig;
use crate::types::decision::{Decider, DecisionValue, ValidationDecision};
use crate::types::finding::{Finding, FindingStatus};

pub use dedup::{DedupReport, NearMatch};
pub use lineage::{LineageReport, LineageVerdict};
pub use similarity::similarity;

/// The outcome of validating one finding.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// Lineage verified, no duplicates, all dimensions confident
    Accepted { lineage: LineageReport },
    /// Failed a hard rule
    Rejected {
        reason: RejectReason,
        lineage: LineageReport,
    },
    /// Suspended for a human verdict
    NeedsReview {
        pending: PendingApproval,
        lineage: LineageReport,
    },
}

/// Validates staged findings against their sources and the canonical graph.
///
/// Every path appends an immutable [`ValidationDecision`] and persists the
/// status transition before returning, so a crash mid-batch never loses a
/// judgment that was reported.
pub struct Validator<S> {
    store: Arc<S>,
    config: CuratorConfig,
    run_id: String,
}

impl<S: CurationStore> Validator<S> {
    pub fn new(store: Arc<S>, config: CuratorConfig) -> Self {
        Self {
            store,
            config,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    fn agent(&self) -> Decider {
        Decider::Agent {
            run_id: self.run_id.clone(),
        }
    }

    async fn reject(
        &self,
        finding: &mut Finding,
        reason: RejectReason,
        lineage: LineageReport,
    ) -> Result<ValidationOutcome> {
        finding.transition(FindingStatus::Rejected)?;
        let decision = ValidationDecision::new(
            finding.id,
            self.agent(),
            DecisionValue::Reject,
            reason.to_string(),
            finding.raw_evidence.clone(),
        )
        .with_confidence(lineage.confidence)
        .with_evidence_audit(lineage.evidence_checksum.clone(), lineage.location);
        self.store.record_decision(&decision).await?;
        self.store.update_finding(finding).await?;
        info!(finding = %finding.id, %reason, "finding rejected");
        Ok(ValidationOutcome::Rejected { reason, lineage })
    }

    /// Validate a pending finding: lineage, duplicates, dimension flags.
    ///
    /// The lineage hard floor is checked first and overrides everything,
    /// including the extractor's own confidence. Near-matches and
    /// uncertain dimensions route to review rather than rejecting.
    pub async fn validate(&self, finding: &mut Finding) -> Result<ValidationOutcome> {
        let snapshot = self.store.get_snapshot(&finding.source.snapshot_id).await?;
        let report = lineage::evaluate(Some(finding), snapshot.as_ref());
        debug!(
            finding = %finding.id,
            confidence = report.confidence,
            "lineage evaluated"
        );

        if report.verdict(&self.config.thresholds) == LineageVerdict::Reject {
            let reason = RejectReason::BrokenLineage {
                confidence: report.confidence,
            };
            return self.reject(finding, reason, report).await;
        }

        let dedup = dedup::detect(self.store.as_ref(), finding, &self.config).await?;
        if let Some(reason) = dedup.rejection(finding) {
            return self.reject(finding, reason, report).await;
        }

        let mut review_reasons = Vec::new();
        if report.verdict(&self.config.thresholds) == LineageVerdict::Review {
            review_reasons.push(format!(
                "lineage confidence {:.2} below auto-approve threshold {:.2}",
                report.confidence, self.config.thresholds.lineage_approve
            ));
        }
        if let Some(reason) = finding
            .dimensions
            .review_reason(self.config.thresholds.dimension_review)
        {
            review_reasons.push(reason);
        }
        if !dedup.near_matches.is_empty() {
            review_reasons.push(format!(
                "{} similar canonical key(s) found",
                dedup.near_matches.len()
            ));
        }

        if !review_reasons.is_empty() {
            finding.transition(FindingStatus::NeedsContext)?;
            let decision = ValidationDecision::new(
                finding.id,
                self.agent(),
                DecisionValue::Defer,
                review_reasons.join("; "),
                finding.raw_evidence.clone(),
            )
            .with_confidence(report.confidence)
            .with_evidence_audit(report.evidence_checksum.clone(), report.location);
            self.store.record_decision(&decision).await?;
            self.store.update_finding(finding).await?;

            let card = ReviewCard::from_finding(
                finding,
                review_reasons,
                &dedup.near_matches,
                self.config.review_field_limit,
            );
            info!(finding = %finding.id, "finding suspended for review");
            return Ok(ValidationOutcome::NeedsReview {
                pending: PendingApproval::new(finding.id, card),
                lineage: report,
            });
        }

        finding.transition(FindingStatus::Accepted)?;
        let decision = ValidationDecision::new(
            finding.id,
            self.agent(),
            DecisionValue::Accept,
            "lineage verified, no duplicates, all dimensions confident",
            finding.raw_evidence.clone(),
        )
        .with_confidence(report.confidence)
        .with_evidence_audit(report.evidence_checksum.clone(), report.location);
        self.store.record_decision(&decision).await?;
        self.store.update_finding(finding).await?;
        info!(finding = %finding.id, "finding accepted");
        Ok(ValidationOutcome::Accepted { lineage: report })
    }

    /// Apply a human verdict to a suspended finding.
    ///
    /// Goes through the normal transition rules; a verdict for a finding
    /// that has since moved on surfaces as an invalid-transition error.
    pub async fn resume(
        &self,
        approval: &PendingApproval,
        decision: HumanDecision,
    ) -> Result<Finding> {
        let mut finding = self
            .store
            .get_finding(approval.finding_id)
            .await?
            .ok_or(CurationError::FindingNotFound {
                id: approval.finding_id,
            })?;

        let value = match decision.verdict {
            HumanVerdict::Accept => DecisionValue::Accept,
            HumanVerdict::Reject => DecisionValue::Reject,
            HumanVerdict::NeedsMoreEvidence => DecisionValue::NeedsMoreEvidence,
        };
        let record = ValidationDecision::new(
            finding.id,
            Decider::Human {
                name: decision.reviewer.clone(),
            },
            value,
            decision.reasoning.clone(),
            finding.raw_evidence.clone(),
        );
        self.store.record_decision(&record).await?;

        if let Some(status) = PendingApproval::status_for(&decision.verdict) {
            finding.transition(status)?;
            self.store.update_finding(&finding).await?;
        }
        info!(
            finding = %finding.id,
            reviewer = %decision.reviewer,
            verdict = ?decision.verdict,
            "human verdict applied"
        );
        Ok(finding)
    }
}
