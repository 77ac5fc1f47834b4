//! Extraction prompt text and formatting.

/// System prompt for architecture extraction.
///
/// The candidate-type and evidence-type vocabularies listed here are closed;
/// model output using any other value is dropped at the parse boundary.
pub const EXTRACT_PROMPT: &str = r#"You extract flight-software architecture facts from documentation.

Read the excerpt below and return candidate facts as JSON:

{
  "findings": [
    {
      "candidate_type": "<see vocabulary>",
      "candidate_key": "<entity name>",
      "ecosystem": "<fprime | proveskit | pysquared | cubesat_general | unknown>",
      "raw_evidence": "<EXACT quote copied verbatim from the excerpt>",
      "evidence_type": "<see vocabulary>",
      "confidence": 0.0,
      "confidence_reasoning": "<why>",
      "relation": {
        "source_key": "<component>",
        "relationship": "<depends_on | requires | enables | conflicts_with | mitigates | causes>",
        "target_key": "<component>",
        "criticality": null
      },
      "dimensions": {
        "knowledge_form": {"value": "embodied | inferred", "confidence": 0.0, "reasoning": "..."},
        "contact": {"value": "direct | mediated | indirect | derived", "confidence": 0.0, "reasoning": "..."},
        "directionality": {"value": "forward | backward | bidirectional", "confidence": 0.0, "reasoning": "..."},
        "temporality": {"value": "snapshot | sequence | history | lifecycle", "confidence": 0.0, "reasoning": "..."},
        "formalizability": {"value": "portable | conditional | local | tacit", "confidence": 0.0, "reasoning": "..."},
        "carrier": {"value": "body | instrument | artifact | community | machine", "confidence": 0.0, "reasoning": "..."}
      }
    }
  ]
}

Candidate types (use ONLY these values):
component, connection, port, dependency, command, telemetry, event,
parameter, data_type, inheritance

Any coupling between components (digital, physical, organizational) is a
"dependency". Do not invent types.

Evidence types (use ONLY these values):
explicit_requirement, safety_constraint, performance_constraint,
feature_description, interface_specification, behavioral_contract,
example_usage, design_rationale, dependency_declaration,
configuration_parameter, inferred

Rules:
- raw_evidence must be an exact substring of the excerpt, never a paraphrase.
- "relation" only for dependency-style candidates; omit it otherwise.
- Leave "criticality" null. Humans assign mission impact, not you.
- Populate all six dimensions for every finding, each with its own
  confidence and reasoning.
- If the excerpt contains nothing extractable, return {"findings": []}.
"#;

/// Format the full extraction prompt for a document excerpt.
pub fn format_extract_prompt(excerpt: &str, source_url: &str) -> String {
    format!(
        "{EXTRACT_PROMPT}\nSource URL: {source_url}\n\nExcerpt:\n---\n{excerpt}\n---\n"
    )
}
