//
// models.rs
// Seg-Relabel-rs
//
// Defines serializable data structures for relabel reports, label inventories, validation, and batch runs.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::labels::Label;

/// Outcome of splitting the corpus callosum for one volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusCallosumSummary {
    pub voxels: usize,
    pub tie_voxels: usize,
    pub columns: usize,
    pub left_voxels: usize,
    pub right_voxels: usize,
    pub labels_seen: Vec<Label>,
}

/// Why an out-of-vocabulary label received its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemapRule {
    LeftCortex,
    RightCortex,
    Unused,
}

impl RemapRule {
    pub fn description(self) -> &'static str {
        match self {
            RemapRule::LeftCortex => "Left cortex",
            RemapRule::RightCortex => "Right cortex",
            RemapRule::Unused => "Unused label",
        }
    }
}

/// One distinct label value replaced across the whole volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChange {
    pub from: Label,
    pub to: Label,
    pub rule: RemapRule,
    pub voxels: usize,
}

/// Full record of a single relabel run, suitable for a JSON sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelabelReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: String,
    pub shape: [usize; 3],
    pub unique_labels: usize,
    pub corpus_callosum: CorpusCallosumSummary,
    pub remapped: Vec<LabelChange>,
    pub unmapped: Vec<Label>,
    pub tie_break: String,
    pub seed: u64,
    pub color_lut: Option<PathBuf>,
    pub processed_at: String,
}

impl RelabelReport {
    /// Distinct label values rewritten by a remap rule. Unmapped labels and
    /// the per-voxel corpus callosum split are not counted.
    pub fn relabeled_count(&self) -> usize {
        self.remapped.len()
    }
}

/// One row of a label inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: Label,
    pub name: Option<String>,
    pub voxels: usize,
    pub valid: bool,
}

/// High-level validation report for the label vocabulary of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub valid: bool,
    pub invalid_labels: Vec<Label>,
    pub corpus_callosum_present: bool,
    pub total_voxels: usize,
}

/// Per-directory tally of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}
