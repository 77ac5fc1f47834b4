//! Per-item and batch-level promotion reports.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a merge target was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeBasis {
    /// Identical (key, ecosystem, type) already canonical
    Exact,
    /// A resolved alias pointed at the target
    ResolvedAlias,
    /// Lost a create race; the winner became the merge target
    CreateRace,
}

/// What a dry-run analysis plans for one finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum PlannedAction {
    /// Already promoted; the idempotency guard will skip it
    Skip,
    Merge {
        entity_id: Uuid,
        basis: MergeBasis,
    },
    Create {
        /// Same-key, same-type entities in other ecosystems
        cross_ecosystem_matches: usize,
    },
}

/// What actually happened to one finding during an apply pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ItemOutcome {
    Skipped,
    Merged {
        entity_id: Uuid,
        basis: MergeBasis,
    },
    Created {
        entity_id: Uuid,
        equivalence_candidates: usize,
    },
    /// Terminal for this finding in this run; the batch continues
    Failed { error: String },
}

/// One line of a batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport<A> {
    pub finding_id: Uuid,
    pub candidate_key: String,
    pub ecosystem: String,
    pub action: A,
}

/// Dry-run output: planned classifications, no state touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub items: Vec<ItemReport<PlannedAction>>,
}

impl AnalysisReport {
    pub fn merges(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.action, PlannedAction::Merge { .. }))
            .count()
    }

    pub fn creates(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.action, PlannedAction::Create { .. }))
            .count()
    }
}

/// Apply-pass output: one outcome per finding, plus whether the run was
/// cancelled before draining the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<ItemReport<ItemOutcome>>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn merged(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.action, ItemOutcome::Merged { .. }))
            .count()
    }

    pub fn created(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.action, ItemOutcome::Created { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.action, ItemOutcome::Skipped))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.action, ItemOutcome::Failed { .. }))
            .count()
    }
}
