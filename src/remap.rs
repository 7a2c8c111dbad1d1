//
// remap.rs
// Seg-Relabel-rs
//
// Builds the table that collapses out-of-vocabulary labels onto the standardized set and applies it volume-wide.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array3;
use thiserror::Error;
use tracing::{info, warn};

use crate::labels::{Label, LabelCatalogue};
use crate::models::{LabelChange, RemapRule};
use crate::stats::label_histogram;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemapError {
    /// The corpus callosum must be resolved per voxel before remapping.
    #[error("corpus callosum label {0} reached the remapper unresolved")]
    UnresolvedCorpusCallosum(Label),
}

/// Replacement decided for each out-of-vocabulary label present in a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    changes: BTreeMap<Label, LabelChange>,
    unmapped: BTreeSet<Label>,
}

impl RemapTable {
    /// Decide a replacement for every label of `histogram` outside the vocabulary.
    pub fn build(
        catalogue: &LabelCatalogue,
        histogram: &BTreeMap<Label, usize>,
    ) -> Result<Self, RemapError> {
        let mut table = RemapTable::default();

        for (&label, &voxels) in histogram {
            if label == catalogue.background || catalogue.is_valid(label) {
                continue;
            }

            let (to, rule) = if catalogue.left_cortex_range.contains(&label) {
                (catalogue.left_cortex, RemapRule::LeftCortex)
            } else if label >= catalogue.right_cortex_start {
                (catalogue.right_cortex, RemapRule::RightCortex)
            } else if catalogue.is_corpus_callosum(label) {
                return Err(RemapError::UnresolvedCorpusCallosum(label));
            } else if catalogue.is_unused(label) {
                (catalogue.background, RemapRule::Unused)
            } else {
                warn!(label, voxels, "leaving unlisted label as is");
                table.unmapped.insert(label);
                continue;
            };

            info!(
                "Remapping label {} -> {} ({})",
                label,
                to,
                rule.description()
            );
            table.changes.insert(
                label,
                LabelChange {
                    from: label,
                    to,
                    rule,
                    voxels,
                },
            );
        }

        Ok(table)
    }

    pub fn lookup(&self, label: Label) -> Option<Label> {
        self.changes.get(&label).map(|c| c.to)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Rewrite every voxel whose label has a replacement.
    pub fn apply(&self, labels: &mut Array3<Label>) {
        if self.is_empty() {
            return;
        }
        labels.mapv_inplace(|label| self.lookup(label).unwrap_or(label));
    }

    pub fn changes(&self) -> impl Iterator<Item = &LabelChange> {
        self.changes.values()
    }

    pub fn unmapped(&self) -> impl Iterator<Item = Label> + '_ {
        self.unmapped.iter().copied()
    }
}

/// What the remapper did to one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapSummary {
    pub unique_labels: usize,
    pub remapped: Vec<LabelChange>,
    pub unmapped: Vec<Label>,
}

/// Collapse out-of-vocabulary labels of an already CC-resolved volume.
pub fn remap_labels(
    labels: &mut Array3<Label>,
    catalogue: &LabelCatalogue,
) -> Result<RemapSummary, RemapError> {
    let histogram = label_histogram(labels);
    let invalid = histogram
        .keys()
        .filter(|&&l| !catalogue.is_valid(l))
        .count();
    info!("Found {} unique labels", histogram.len());
    info!("Found {} labels to remap", invalid);

    let table = RemapTable::build(catalogue, &histogram)?;
    table.apply(labels);

    Ok(RemapSummary {
        unique_labels: histogram.len(),
        remapped: table.changes().cloned().collect(),
        unmapped: table.unmapped().collect(),
    })
}
