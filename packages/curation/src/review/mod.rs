//! Human review surface: flattened projections and suspended approvals.
//!
//! The board is a display and intake boundary only. It never becomes the
//! system of record; lineage and promotion state live in the stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::finding::{Finding, FindingStatus};
use crate::validator::dedup::NearMatch;

/// Truncate to at most `limit` characters, on a character boundary.
fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    s.chars().take(limit).collect()
}

/// A flattened, size-bounded projection of a finding for human review.
///
/// Every text field is truncated to the configured limit so oversized
/// evidence cannot break the board's intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCard {
    pub finding_id: Uuid,
    pub title: String,
    pub candidate_type: String,
    pub ecosystem: String,
    pub evidence: String,
    pub source_url: String,
    pub confidence: f32,
    pub reasoning: String,
    /// Why this finding needs a human: low dimensions, review-band
    /// lineage, near-matches
    pub review_reasons: Vec<String>,
    /// Similar canonical keys, formatted for display
    pub near_matches: Vec<String>,
}

impl ReviewCard {
    pub fn from_finding(
        finding: &Finding,
        review_reasons: Vec<String>,
        near_matches: &[NearMatch],
        field_limit: usize,
    ) -> Self {
        Self {
            finding_id: finding.id,
            title: truncate_chars(
                &format!(
                    "[{}] {}",
                    finding.candidate_type.as_str(),
                    finding.candidate_key
                ),
                field_limit,
            ),
            candidate_type: finding.candidate_type.as_str().to_string(),
            ecosystem: finding.ecosystem.as_str().to_string(),
            evidence: truncate_chars(&finding.raw_evidence, field_limit),
            source_url: truncate_chars(&finding.source.url, field_limit),
            confidence: finding.confidence,
            reasoning: truncate_chars(&finding.confidence_reasoning, field_limit),
            review_reasons: review_reasons
                .into_iter()
                .map(|r| truncate_chars(&r, field_limit))
                .collect(),
            near_matches: near_matches
                .iter()
                .map(|m| {
                    truncate_chars(
                        &format!(
                            "{} ({}) similarity {:.2}",
                            m.entity.display_name,
                            m.entity.ecosystem.as_str(),
                            m.similarity
                        ),
                        field_limit,
                    )
                })
                .collect(),
        }
    }
}

/// Where review cards are published.
#[async_trait]
pub trait ReviewBoard: Send + Sync {
    /// Publish a card for human attention.
    async fn publish(&self, card: &ReviewCard) -> Result<()>;
}

/// The verdict a human hands back for a suspended finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanVerdict {
    Accept,
    Reject,
    NeedsMoreEvidence,
}

/// A human decision on a pending approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanDecision {
    pub reviewer: String,
    pub verdict: HumanVerdict,
    pub reasoning: String,
}

/// A suspended finding awaiting a human verdict.
///
/// Suspension is a value, not global state: the pipeline keeps no
/// interrupt flag, and any number of approvals can be pending at once.
/// Resuming applies the human decision through the normal transition
/// rules, so a resumed finding cannot skip lifecycle checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub finding_id: Uuid,
    pub card: ReviewCard,
    pub suspended_at: DateTime<Utc>,
}

impl PendingApproval {
    pub fn new(finding_id: Uuid, card: ReviewCard) -> Self {
        Self {
            finding_id,
            card,
            suspended_at: Utc::now(),
        }
    }

    /// The status a verdict maps to. `NeedsMoreEvidence` keeps the
    /// finding in needs-context.
    pub fn status_for(verdict: &HumanVerdict) -> Option<FindingStatus> {
        match verdict {
            HumanVerdict::Accept => Some(FindingStatus::Accepted),
            HumanVerdict::Reject => Some(FindingStatus::Rejected),
            HumanVerdict::NeedsMoreEvidence => None,
        }
    }
}
