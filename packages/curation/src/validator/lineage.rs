//! Lineage verification: is the evidence really in the cited source?
//!
//! Six boolean checks produce a composite confidence of `passed / 6`.
//! The confidence bands are policy: at or above `lineage_approve` the
//! finding may be auto-approved; between the reject floor and approve it
//! is flagged for human review; below the floor it is rejected no matter
//! how confident the extraction claimed to be.

use serde::{Deserialize, Serialize};

use crate::types::config::ValidationThresholds;
use crate::types::evidence::{EvidenceLocation, Snapshot};
use crate::types::finding::Finding;

/// Outcome band of a lineage evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageVerdict {
    /// Confidence at or above the approve threshold
    ApproveEligible,
    /// Between the reject floor and the approve threshold
    Review,
    /// Below the hard floor. Overrides extraction confidence.
    Reject,
}

/// The six checks, individually reported for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageChecks {
    /// 1. The finding record exists
    pub finding_exists: bool,
    /// 2. The referenced snapshot exists and is linked to the finding
    pub snapshot_linked: bool,
    /// 3. The raw evidence text is non-empty
    pub evidence_nonempty: bool,
    /// 4. The evidence appears verbatim in the snapshot payload
    pub evidence_located: bool,
    /// 5. A checksum of the located evidence could be computed
    pub evidence_checksummed: bool,
    /// 6. The snapshot carries a stored checksum for comparison
    pub snapshot_checksummed: bool,
}

impl LineageChecks {
    pub fn passed(&self) -> u32 {
        [
            self.finding_exists,
            self.snapshot_linked,
            self.evidence_nonempty,
            self.evidence_located,
            self.evidence_checksummed,
            self.snapshot_checksummed,
        ]
        .into_iter()
        .filter(|&c| c)
        .count() as u32
    }
}

/// The full result of a lineage evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageReport {
    pub checks: LineageChecks,
    /// `checks passed / 6`
    pub confidence: f32,
    /// SHA-256 of the evidence text, when it was located
    pub evidence_checksum: Option<String>,
    /// Byte offset and length of the evidence within the payload
    pub location: Option<EvidenceLocation>,
}

impl LineageReport {
    /// Apply the confidence bands.
    pub fn verdict(&self, thresholds: &ValidationThresholds) -> LineageVerdict {
        if self.confidence < thresholds.lineage_reject_floor {
            LineageVerdict::Reject
        } else if self.confidence >= thresholds.lineage_approve {
            LineageVerdict::ApproveEligible
        } else {
            LineageVerdict::Review
        }
    }
}

/// Evaluate evidence lineage for a finding against its snapshot.
///
/// Pure: no storage access, the caller resolves the finding and snapshot.
/// Either may be absent, which fails the corresponding checks rather than
/// erroring. The evidence checksum is computed over the *located* payload
/// slice, so an absent quote fails both the location and checksum checks.
pub fn evaluate(finding: Option<&Finding>, snapshot: Option<&Snapshot>) -> LineageReport {
    let finding_exists = finding.is_some();

    let snapshot_linked = match (finding, snapshot) {
        (Some(f), Some(s)) => f.source.snapshot_id == s.id,
        _ => false,
    };

    let evidence_nonempty = finding
        .map(|f| !f.raw_evidence.trim().is_empty())
        .unwrap_or(false);

    let location = match (finding, snapshot) {
        (Some(f), Some(s)) if snapshot_linked && evidence_nonempty => s.locate(&f.raw_evidence),
        _ => None,
    };
    let evidence_located = location.is_some();

    let evidence_checksum = match (finding, location) {
        (Some(f), Some(_)) => Some(Snapshot::hash_content(&f.raw_evidence)),
        _ => None,
    };
    let evidence_checksummed = evidence_checksum.is_some();

    let snapshot_checksummed = snapshot
        .map(|s| s.checksum.is_some())
        .unwrap_or(false);

    let checks = LineageChecks {
        finding_exists,
        snapshot_linked,
        evidence_nonempty,
        evidence_located,
        evidence_checksummed,
        snapshot_checksummed,
    };
    let confidence = checks.passed() as f32 / 6.0;

    LineageReport {
        checks,
        confidence,
        evidence_checksum,
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::dimensions::{
        Assessment, Carrier, ContactLevel, Directionality, EpistemicProfile, Formalizability,
        KnowledgeForm, Temporality,
    };
    use crate::types::evidence::EvidenceType;
    use crate::types::finding::{CandidateType, Ecosystem};

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

    fn finding_for(snapshot: &Snapshot, evidence: &str) -> Finding {
        Finding::new(
            CandidateType::Parameter,
            "i2c_address",
            Ecosystem::new("proveskit"),
            evidence,
            EvidenceType::ConfigurationParameter,
            snapshot.source_ref(),
            0.9,
            "explicit",
            profile(),
        )
        .unwrap()
    }

    #[test]
    fn test_all_checks_pass_when_evidence_present() {
        let snapshot = Snapshot::capture("u", "The sensor I2C address 0x48 is fixed at boot.");
        let finding = finding_for(&snapshot, "I2C address 0x48");

        let report = evaluate(Some(&finding), Some(&snapshot));
        assert_eq!(report.checks.passed(), 6);
        assert!((report.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(
            report.verdict(&ValidationThresholds::default()),
            LineageVerdict::ApproveEligible
        );
        assert!(report.location.is_some());
        assert_eq!(report.evidence_checksum.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn test_absent_evidence_lands_in_review_band() {
        // Scenario: the quote is not in the snapshot. Location and checksum
        // both fail, so confidence is 4/6, inside the review band.
        let snapshot = Snapshot::capture("u", "This page documents the radio, not the sensor.");
        let finding = finding_for(&snapshot, "I2C address 0x48");

        let report = evaluate(Some(&finding), Some(&snapshot));
        assert!(!report.checks.evidence_located);
        assert!(!report.checks.evidence_checksummed);
        assert_eq!(report.checks.passed(), 4);
        assert!((report.confidence - 4.0 / 6.0).abs() < 1e-6);
        assert_eq!(
            report.verdict(&ValidationThresholds::default()),
            LineageVerdict::Review
        );
    }

    #[test]
    fn test_missing_snapshot_rejects() {
        let snapshot = Snapshot::capture("u", "some content");
        let finding = finding_for(&snapshot, "some content");

        let report = evaluate(Some(&finding), None);
        // Only finding-exists and evidence-nonempty pass: 2/6.
        assert_eq!(report.checks.passed(), 2);
        assert_eq!(
            report.verdict(&ValidationThresholds::default()),
            LineageVerdict::Reject
        );
    }

    #[test]
    fn test_unlinked_snapshot_fails_link_check() {
        let cited = Snapshot::capture("u", "v1 text with I2C address 0x48");
        let other = Snapshot::capture("u", "v2 text with I2C address 0x48");
        let finding = finding_for(&cited, "I2C address 0x48");

        let report = evaluate(Some(&finding), Some(&other));
        assert!(!report.checks.snapshot_linked);
        // Location is not attempted against an unlinked snapshot.
        assert!(!report.checks.evidence_located);
    }

    #[test]
    fn test_missing_finding_rejects() {
        let snapshot = Snapshot::capture("u", "content");
        let report = evaluate(None, Some(&snapshot));
        assert_eq!(report.checks.passed(), 1); // snapshot checksum only
        assert_eq!(
            report.verdict(&ValidationThresholds::default()),
            LineageVerdict::Reject
        );
    }
}
