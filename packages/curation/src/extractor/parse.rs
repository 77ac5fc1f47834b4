//! Defensive parsing of LLM output into typed findings.
//!
//! The model returns free-form text. This module locates the JSON body,
//! deserializes it into loosely-typed raw structs, then converts each
//! candidate through the strict enumerations. Candidates that fail any
//! check are returned as rejections, never silently dropped.

use serde::{Deserialize, Serialize};

use crate::error::RejectReason;
use crate::types::dimensions::{
    Assessment, Carrier, ContactLevel, Directionality, EpistemicProfile, Formalizability,
    KnowledgeForm, Temporality,
};
use crate::types::evidence::{EvidenceType, SourceRef};
use crate::types::finding::{
    CandidateType, Criticality, Ecosystem, Finding, RelationCandidate, RelationshipType,
};

/// Top-level model response (before strict conversion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExtractionResponse {
    #[serde(default)]
    pub findings: Vec<RawFinding>,
}

/// A candidate as the model emitted it. All enums are still strings here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub candidate_type: String,
    pub candidate_key: String,
    #[serde(default)]
    pub ecosystem: Option<String>,
    #[serde(default)]
    pub raw_evidence: String,
    pub evidence_type: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub confidence_reasoning: String,
    #[serde(default)]
    pub relation: Option<RawRelation>,
    pub dimensions: RawDimensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelation {
    pub source_key: String,
    pub relationship: String,
    pub target_key: String,
    #[serde(default)]
    pub criticality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDimensions {
    pub knowledge_form: RawAssessment,
    pub contact: RawAssessment,
    pub directionality: RawAssessment,
    pub temporality: RawAssessment,
    pub formalizability: RawAssessment,
    pub carrier: RawAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAssessment {
    pub value: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

/// Parse the model's text output into raw candidates.
///
/// Tolerates a Markdown code fence around the JSON body.
pub fn parse_extraction_response(
    text: &str,
) -> Result<RawExtractionResponse, serde_json::Error> {
    serde_json::from_str(strip_code_fence(text))
}

/// Strip a surrounding ```/```json fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn parse_assessment<T>(raw: &RawAssessment) -> Result<Assessment<T>, RejectReason>
where
    T: std::str::FromStr<Err = RejectReason>,
{
    Ok(Assessment::new(
        raw.value.parse::<T>()?,
        raw.confidence,
        raw.reasoning.clone(),
    ))
}

/// Convert one raw candidate through the strict enumerations.
///
/// This is the extractor boundary: unrecognized candidate types, evidence
/// types, dimension values, relationship types, or criticalities are
/// rejected here, not downstream.
pub fn convert_candidate(raw: &RawFinding, source: &SourceRef) -> Result<Finding, RejectReason> {
    let candidate_type = raw.candidate_type.parse::<CandidateType>()?;
    let evidence_type = raw.evidence_type.parse::<EvidenceType>()?;

    let dimensions = EpistemicProfile {
        knowledge_form: parse_assessment::<KnowledgeForm>(&raw.dimensions.knowledge_form)?,
        contact: parse_assessment::<ContactLevel>(&raw.dimensions.contact)?,
        directionality: parse_assessment::<Directionality>(&raw.dimensions.directionality)?,
        temporality: parse_assessment::<Temporality>(&raw.dimensions.temporality)?,
        formalizability: parse_assessment::<Formalizability>(&raw.dimensions.formalizability)?,
        carrier: parse_assessment::<Carrier>(&raw.dimensions.carrier)?,
    };

    let ecosystem = raw
        .ecosystem
        .as_deref()
        .map(Ecosystem::new)
        .unwrap_or_else(Ecosystem::unknown);

    let mut finding = Finding::new(
        candidate_type,
        raw.candidate_key.clone(),
        ecosystem,
        raw.raw_evidence.clone(),
        evidence_type,
        source.clone(),
        raw.confidence.clamp(0.0, 1.0),
        raw.confidence_reasoning.clone(),
        dimensions,
    )?;

    if let Some(rel) = &raw.relation {
        let relationship = rel.relationship.parse::<RelationshipType>()?;
        let criticality = match rel.criticality.as_deref() {
            None | Some("") => None,
            Some(c) => Some(c.parse::<Criticality>()?),
        };
        finding = finding.with_relation(RelationCandidate {
            source_key: rel.source_key.clone(),
            relationship,
            target_key: rel.target_key.clone(),
            criticality,
        });
    }

    Ok(finding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_assessment(value: &str) -> RawAssessment {
        RawAssessment {
            value: value.to_string(),
            confidence: 0.9,
            reasoning: "test".to_string(),
        }
    }

    fn raw_dimensions() -> RawDimensions {
        RawDimensions {
            knowledge_form: raw_assessment("inferred"),
            contact: raw_assessment("mediated"),
            directionality: raw_assessment("forward"),
            temporality: raw_assessment("sequence"),
            formalizability: raw_assessment("portable"),
            carrier: raw_assessment("artifact"),
        }
    }

    fn raw_finding() -> RawFinding {
        RawFinding {
            candidate_type: "component".to_string(),
            candidate_key: "ImuManager".to_string(),
            ecosystem: Some("fprime".to_string()),
            raw_evidence: "ImuManager polls the IMU every 100ms".to_string(),
            evidence_type: "interface_specification".to_string(),
            confidence: 0.9,
            confidence_reasoning: "explicit".to_string(),
            relation: None,
            dimensions: raw_dimensions(),
        }
    }

    fn source() -> SourceRef {
        SourceRef::new("https://docs.example.com/imu", "snap1")
    }

    #[test]
    fn test_parse_plain_json() {
        let json = r#"{"findings": []}"#;
        let parsed = parse_extraction_response(json).unwrap();
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"findings\": []}\n```";
        let parsed = parse_extraction_response(text).unwrap();
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_convert_valid_candidate() {
        let f = convert_candidate(&raw_finding(), &source()).unwrap();
        assert_eq!(f.candidate_type, CandidateType::Component);
        assert_eq!(f.ecosystem.as_str(), "fprime");
        assert!(!f.needs_human_review);
    }

    #[test]
    fn test_free_form_type_rejected_at_boundary() {
        let mut raw = raw_finding();
        raw.candidate_type = "organizational_coupling".to_string();
        let err = convert_candidate(&raw, &source()).unwrap_err();
        assert!(matches!(err, RejectReason::UnknownCandidateType(_)));
    }

    #[test]
    fn test_missing_evidence_rejected() {
        let mut raw = raw_finding();
        raw.raw_evidence = String::new();
        let err = convert_candidate(&raw, &source()).unwrap_err();
        assert_eq!(err, RejectReason::EmptyEvidence);
    }

    #[test]
    fn test_bad_dimension_value_rejected() {
        let mut raw = raw_finding();
        raw.dimensions.temporality.value = "eternal".to_string();
        let err = convert_candidate(&raw, &source()).unwrap_err();
        assert!(matches!(err, RejectReason::UnknownDimensionValue { .. }));
    }

    #[test]
    fn test_relation_enums_validated() {
        let mut raw = raw_finding();
        raw.candidate_type = "dependency".to_string();
        raw.relation = Some(RawRelation {
            source_key: "ImuManager".to_string(),
            relationship: "talks_to".to_string(),
            target_key: "I2CDriver".to_string(),
            criticality: None,
        });
        let err = convert_candidate(&raw, &source()).unwrap_err();
        assert!(matches!(err, RejectReason::InvalidRelationshipType(_)));
    }

    #[test]
    fn test_bad_criticality_rejected() {
        let mut raw = raw_finding();
        raw.relation = Some(RawRelation {
            source_key: "ImuManager".to_string(),
            relationship: "depends_on".to_string(),
            target_key: "I2CDriver".to_string(),
            criticality: Some("CRITICAL".to_string()),
        });
        let err = convert_candidate(&raw, &source()).unwrap_err();
        assert!(matches!(err, RejectReason::InvalidCriticality(_)));
    }

    #[test]
    fn test_missing_ecosystem_defaults_to_unknown() {
        let mut raw = raw_finding();
        raw.ecosystem = None;
        let f = convert_candidate(&raw, &source()).unwrap();
        assert_eq!(f.ecosystem.as_str(), "unknown");
    }
}
