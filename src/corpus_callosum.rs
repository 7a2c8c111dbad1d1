//
// corpus_callosum.rs
// Seg-Relabel-rs
//
// Splits corpus callosum voxels into left and right cerebral white matter around a per-column midline.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeSet;
use std::fmt;

use ndarray::{Array2, Array3};
use rand::Rng;
use tracing::debug;

use crate::labels::{Label, LabelCatalogue};
use crate::models::CorpusCallosumSummary;

/// What to do with a corpus callosum voxel sitting exactly on its column midline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Always left white matter.
    Left,
    /// Always right white matter.
    Right,
    /// Independent fair coin for every midline voxel.
    #[default]
    RandomPerVoxel,
    /// One fair coin per volume, shared by every midline voxel.
    RandomPerRun,
}

impl TieBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            TieBreak::Left => "left",
            TieBreak::Right => "right",
            TieBreak::RandomPerVoxel => "random-per-voxel",
            TieBreak::RandomPerRun => "random-per-run",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Midline x for every (y, z) column holding corpus callosum voxels.
///
/// The midline is the truncated mean of the smallest and largest x of the
/// column's corpus callosum voxels. Columns without any are `None`.
pub fn midline_map(labels: &Array3<Label>, catalogue: &LabelCatalogue) -> Array2<Option<usize>> {
    let (_, ny, nz) = labels.dim();
    let mut extents: Array2<Option<(usize, usize)>> = Array2::from_elem((ny, nz), None);

    for ((x, y, z), &label) in labels.indexed_iter() {
        if !catalogue.is_corpus_callosum(label) {
            continue;
        }
        let slot = &mut extents[(y, z)];
        *slot = Some(match *slot {
            Some((lo, hi)) => (lo.min(x), hi.max(x)),
            None => (x, x),
        });
    }

    extents.mapv(|extent| extent.map(|(lo, hi)| (lo + hi) / 2))
}

pub struct CorpusCallosumResolver<'a> {
    catalogue: &'a LabelCatalogue,
    tie_break: TieBreak,
}

impl<'a> CorpusCallosumResolver<'a> {
    pub fn new(catalogue: &'a LabelCatalogue, tie_break: TieBreak) -> Self {
        Self {
            catalogue,
            tie_break,
        }
    }

    /// Replace every corpus callosum voxel by left or right white matter.
    ///
    /// Voxels right of the midline (larger x) become left white matter,
    /// voxels left of it become right white matter, matching the
    /// radiological x axis of FreeSurfer volumes.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        labels: &mut Array3<Label>,
        rng: &mut R,
    ) -> CorpusCallosumSummary {
        let midlines = midline_map(labels, self.catalogue);
        let mut summary = CorpusCallosumSummary {
            columns: midlines.iter().filter(|m| m.is_some()).count(),
            ..Default::default()
        };
        if summary.columns == 0 {
            return summary;
        }

        let left = self.catalogue.left_white_matter;
        let right = self.catalogue.right_white_matter;
        let mut run_choice: Option<bool> = None;
        let mut seen = BTreeSet::new();

        for ((x, y, z), label) in labels.indexed_iter_mut() {
            if !self.catalogue.is_corpus_callosum(*label) {
                continue;
            }
            // Every corpus callosum voxel has a midline for its column.
            let Some(midline) = midlines[(y, z)] else {
                continue;
            };
            seen.insert(*label);
            summary.voxels += 1;

            let goes_left = if x > midline {
                true
            } else if x < midline {
                false
            } else {
                summary.tie_voxels += 1;
                match self.tie_break {
                    TieBreak::Left => true,
                    TieBreak::Right => false,
                    TieBreak::RandomPerVoxel => rng.gen_bool(0.5),
                    TieBreak::RandomPerRun => *run_choice.get_or_insert_with(|| rng.gen_bool(0.5)),
                }
            };

            if goes_left {
                *label = left;
                summary.left_voxels += 1;
            } else {
                *label = right;
                summary.right_voxels += 1;
            }
        }

        summary.labels_seen = seen.into_iter().collect();
        debug!(
            voxels = summary.voxels,
            columns = summary.columns,
            ties = summary.tie_voxels,
            policy = %self.tie_break,
            "corpus callosum resolved"
        );
        summary
    }
}
