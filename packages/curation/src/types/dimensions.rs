//! Epistemic dimension metadata attached to every finding.
//!
//! Each finding carries six categorical dimensions describing how the fact
//! was known. Every dimension is independently confidence-scored; any
//! dimension below the review threshold flags the whole finding for a
//! human pass.

use serde::{Deserialize, Serialize};

use crate::error::RejectReason;

/// Default confidence threshold below which a dimension flags review.
pub const DIMENSION_REVIEW_THRESHOLD: f32 = 0.7;

/// Whether knowledge was embodied (experiential) or inferred (symbolic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeForm {
    /// Learned through direct experience or tacit patterns
    Embodied,
    /// Documented or derived symbolically
    Inferred,
}

/// How the knowledge touched reality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactLevel {
    /// Physical or experiential observation
    Direct,
    /// Instrumented observation (sensor, telemetry)
    Mediated,
    /// Effect-only inference
    Indirect,
    /// Model or simulation only
    Derived,
}

/// The epistemic operation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directionality {
    /// Prediction: if X then Y
    Forward,
    /// Diagnosis: Y, therefore X
    Backward,
    /// Both directions documented
    Bidirectional,
}

/// Dependence of the fact on history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temporality {
    /// Instantaneous state
    Snapshot,
    /// Ordering matters
    Sequence,
    /// Accumulated past affects present
    History,
    /// Long-term evolution
    Lifecycle,
}

/// Capacity for symbolic transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formalizability {
    /// Fully documented, moves intact into code or specs
    Portable,
    /// Formalizable if context is preserved
    Conditional,
    /// Resists formalization outside its setting
    Local,
    /// Embodied, cannot be fully symbolized
    Tacit,
}

/// What carries the knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    /// Human embodied knowledge
    Body,
    /// Sensor or measurement device
    Instrument,
    /// Documentation, code, specifications
    Artifact,
    /// Organizational practice
    Community,
    /// Learned model
    Machine,
}

/// A categorical dimension value with its own confidence and reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment<T> {
    pub value: T,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub reasoning: String,
}

impl<T> Assessment<T> {
    pub fn new(value: T, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            reasoning: reasoning.into(),
        }
    }

    /// Whether this dimension falls below the review threshold.
    pub fn is_uncertain(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }
}

/// The six-dimensional epistemic profile of a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpistemicProfile {
    pub knowledge_form: Assessment<KnowledgeForm>,
    pub contact: Assessment<ContactLevel>,
    pub directionality: Assessment<Directionality>,
    pub temporality: Assessment<Temporality>,
    pub formalizability: Assessment<Formalizability>,
    pub carrier: Assessment<Carrier>,
}

impl EpistemicProfile {
    /// The lowest confidence across all six dimensions.
    pub fn min_confidence(&self) -> f32 {
        [
            self.knowledge_form.confidence,
            self.contact.confidence,
            self.directionality.confidence,
            self.temporality.confidence,
            self.formalizability.confidence,
            self.carrier.confidence,
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
    }

    /// True when any dimension's confidence is below `threshold`.
    pub fn needs_review(&self, threshold: f32) -> bool {
        self.min_confidence() < threshold
    }

    /// Names of dimensions below `threshold`, for review reasons.
    pub fn uncertain_dimensions(&self, threshold: f32) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.knowledge_form.is_uncertain(threshold) {
            out.push("knowledge_form");
        }
        if self.contact.is_uncertain(threshold) {
            out.push("contact");
        }
        if self.directionality.is_uncertain(threshold) {
            out.push("directionality");
        }
        if self.temporality.is_uncertain(threshold) {
            out.push("temporality");
        }
        if self.formalizability.is_uncertain(threshold) {
            out.push("formalizability");
        }
        if self.carrier.is_uncertain(threshold) {
            out.push("carrier");
        }
        out
    }

    /// Human-readable explanation for a review flag, if any.
    pub fn review_reason(&self, threshold: f32) -> Option<String> {
        let uncertain = self.uncertain_dimensions(threshold);
        if uncertain.is_empty() {
            return None;
        }
        Some(format!(
            "dimension confidence below {:.2}: {}",
            threshold,
            uncertain.join(", ")
        ))
    }
}

macro_rules! dimension_from_str {
    ($ty:ident, $dim_name:literal, { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl std::str::FromStr for $ty {
            type Err = RejectReason;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(RejectReason::UnknownDimensionValue {
                        dimension: $dim_name.to_string(),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl $ty {
            /// Stable lowercase name, matching the serde representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }
    };
}

dimension_from_str!(KnowledgeForm, "knowledge_form", {
    "embodied" => Embodied,
    "inferred" => Inferred,
});

dimension_from_str!(ContactLevel, "contact", {
    "direct" => Direct,
    "mediated" => Mediated,
    "indirect" => Indirect,
    "derived" => Derived,
});

dimension_from_str!(Directionality, "directionality", {
    "forward" => Forward,
    "backward" => Backward,
    "bidirectional" => Bidirectional,
});

dimension_from_str!(Temporality, "temporality", {
    "snapshot" => Snapshot,
    "sequence" => Sequence,
    "history" => History,
    "lifecycle" => Lifecycle,
});

dimension_from_str!(Formalizability, "formalizability", {
    "portable" => Portable,
    "conditional" => Conditional,
    "local" => Local,
    "tacit" => Tacit,
});

dimension_from_str!(Carrier, "carrier", {
    "body" => Body,
    "instrument" => Instrument,
    "artifact" => Artifact,
    "community" => Community,
    "machine" => Machine,
});
