//! Extraction: turn a document snapshot into typed candidate findings.
//!
//! The extractor is generic over the [`Llm`] seam, so tests drive it with a
//! scripted mock and production wires in a real client. The LLM proposes;
//! the parse boundary disposes: anything outside the closed vocabularies
//! comes back in the batch's `rejected` list.

pub mod parse;
pub mod prompts;

use tracing::{debug, warn};

use crate::error::{CurationError, RejectReason, Result};
use crate::traits::llm::Llm;
use crate::types::config::CuratorConfig;
use crate::types::evidence::Snapshot;
use crate::types::finding::Finding;

pub use parse::{parse_extraction_response, RawFinding};
pub use prompts::{format_extract_prompt, EXTRACT_PROMPT};

/// A candidate the parse boundary refused, kept for the audit trail.
#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub raw: RawFinding,
    pub reason: RejectReason,
}

/// The outcome of extracting one snapshot.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    /// Candidates that passed boundary validation, status pending
    pub findings: Vec<Finding>,
    /// Candidates refused at the boundary, with structured reasons
    pub rejected: Vec<RejectedCandidate>,
}

impl ExtractionBatch {
    fn empty() -> Self {
        Self::default()
    }
}

/// Extracts candidate findings from captured documents.
pub struct Extractor<L: Llm> {
    llm: L,
    config: CuratorConfig,
}

impl<L: Llm> Extractor<L> {
    pub fn new(llm: L, config: CuratorConfig) -> Self {
        Self { llm, config }
    }

    /// Extract candidate findings from a snapshot.
    ///
    /// Empty or whitespace-only documents short-circuit to an empty batch
    /// without an LLM call. The LLM call runs under the configured
    /// deadline; malformed JSON surfaces as
    /// [`CurationError::JsonParse`].
    pub async fn extract(&self, snapshot: &Snapshot) -> Result<ExtractionBatch> {
        if snapshot.payload.trim().is_empty() {
            debug!(source = %snapshot.source_url, "empty document, skipping extraction");
            return Ok(ExtractionBatch::empty());
        }

        let prompt = format_extract_prompt(&snapshot.payload, &snapshot.source_url);
        let response = tokio::time::timeout(self.config.llm_timeout, self.llm.complete(&prompt))
            .await
            .map_err(|_| CurationError::Timeout {
                operation: "llm extraction".to_string(),
                seconds: self.config.llm_timeout.as_secs(),
            })??;

        let raw = parse_extraction_response(&response)?;
        let source = snapshot.source_ref();

        let mut batch = ExtractionBatch::empty();
        for candidate in raw.findings {
            match parse::convert_candidate(&candidate, &source) {
                Ok(finding) => batch.findings.push(finding),
                Err(reason) => {
                    warn!(
                        key = %candidate.candidate_key,
                        %reason,
                        "dropping candidate at parse boundary"
                    );
                    batch.rejected.push(RejectedCandidate {
                        raw: candidate,
                        reason,
                    });
                }
            }
        }

        debug!(
            source = %snapshot.source_url,
            accepted = batch.findings.len(),
            rejected = batch.rejected.len(),
            "extraction complete"
        );
        Ok(batch)
    }
}
