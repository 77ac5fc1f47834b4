//! Documentation Curation Pipeline
//!
//! A pipeline that turns flight-software documentation into a curated
//! knowledge graph:
//!
//! 1. **Extract**: an LLM proposes candidate facts (findings) from a
//!    captured document, each with a verbatim evidence quote and
//!    six-dimensional epistemic metadata.
//! 2. **Validate**: evidence lineage is verified against the content-
//!    addressed snapshot, duplicates are detected against the canonical
//!    store, and uncertain findings are suspended for human review.
//! 3. **Stage**: findings and every decision about them are persisted
//!    append-mostly, independent of promotion state.
//! 4. **Promote**: accepted findings merge into existing canonical
//!    entities or create new ones, idempotently, with a dry-run analysis
//!    pass that matches the apply pass by construction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use curation::{Curator, CuratorConfig, Ecosystem, HttpSource, MemoryStore};
//! use curation::testing::MockLlm;
//!
//! let store = Arc::new(MemoryStore::new());
//! let config = CuratorConfig::default();
//! let source = HttpSource::new(&config)?;
//! let curator = Curator::new(store, MockLlm::returning("{\"findings\": []}"), source, config);
//!
//! let report = curator.ingest("https://docs.example.com/imu", &Ecosystem::new("fprime")).await?;
//! let batch = curator.promote(&Default::default()).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (Llm, DocumentSource, stores)
//! - [`types`] - The typed data model (findings, entities, decisions)
//! - [`extractor`] - LLM-backed candidate extraction
//! - [`validator`] - Lineage verification and duplicate detection
//! - [`promotion`] - Canonical-graph promotion with dry-run analysis
//! - [`review`] - Human review cards and suspended approvals
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`sources`] - Document source implementations
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod extractor;
pub mod llm;
pub mod pipeline;
pub mod promotion;
pub mod review;
pub mod sources;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod validator;

// Re-export core types at crate root
pub use error::{CurationError, RejectReason, Result};
pub use traits::{llm::Llm, source::DocumentSource, store::CurationStore};
pub use types::{
    config::{CuratorConfig, ValidationThresholds},
    decision::{Decider, DecisionValue, ValidationDecision},
    dimensions::EpistemicProfile,
    entity::{Alias, AliasType, CanonicalEntity, CrawlRecord, EquivalenceCandidate},
    evidence::{EvidenceType, Snapshot, SourceRef},
    finding::{
        CandidateType, Criticality, Ecosystem, Finding, FindingStatus, PromotionAction,
        RelationCandidate, RelationshipType,
    },
};

// Re-export the pipeline entry point
pub use pipeline::{Curator, IngestReport};

// Re-export pipeline stages
pub use extractor::{ExtractionBatch, Extractor};
pub use promotion::{AnalysisReport, BatchReport, Classification, Promoter};
pub use review::{HumanDecision, HumanVerdict, PendingApproval, ReviewBoard, ReviewCard};
pub use validator::{LineageReport, LineageVerdict, ValidationOutcome, Validator};

// Re-export stores and sources
pub use sources::HttpSource;
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

#[cfg(feature = "openai")]
pub use llm::OpenAiClient;
