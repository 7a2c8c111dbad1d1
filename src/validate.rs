use anyhow::{bail, Context, Result};
use ndarray::Array3;
use std::path::Path;

use crate::labels::{Label, LabelCatalogue};
use crate::models::ValidationSummary;
use crate::stats::label_histogram;
use crate::volume::LabelVolume;

/// Check that every voxel carries a label of the vocabulary.
pub fn validate_labels(labels: &Array3<Label>, catalogue: &LabelCatalogue) -> ValidationSummary {
    let histogram = label_histogram(labels);
    let invalid_labels: Vec<Label> = histogram
        .keys()
        .copied()
        .filter(|&l| !catalogue.is_valid(l))
        .collect();
    let corpus_callosum_present = invalid_labels
        .iter()
        .any(|&l| catalogue.is_corpus_callosum(l));

    ValidationSummary {
        valid: invalid_labels.is_empty(),
        invalid_labels,
        corpus_callosum_present,
        total_voxels: labels.len(),
    }
}

/// Validates a label volume file and prints a brief summary. Fails if any label is out of vocabulary.
pub fn check_file(path: &Path, catalogue: &LabelCatalogue) -> Result<ValidationSummary> {
    let volume = LabelVolume::open(path)
        .with_context(|| format!("Failed to open label volume {:?}", path))?;
    let summary = validate_labels(&volume.labels, catalogue);

    if !summary.valid {
        bail!(
            "{}: {} label(s) outside the {} vocabulary: {:?}",
            path.display(),
            summary.invalid_labels.len(),
            catalogue.name,
            summary.invalid_labels
        );
    }

    println!("Valid label volume: {}", path.display());
    println!("  Shape:  {:?}", volume.shape());
    println!("  Voxels: {}", summary.total_voxels);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::FREESURFER_ASEG;

    #[test]
    fn flags_invalid_and_corpus_callosum_labels() {
        let labels = Array3::from_shape_vec((4, 1, 1), vec![0, 2, 255, 1001]).expect("shape");
        let summary = validate_labels(&labels, &FREESURFER_ASEG);
        assert!(!summary.valid);
        assert_eq!(summary.invalid_labels, vec![255, 1001]);
        assert!(summary.corpus_callosum_present);
        assert_eq!(summary.total_voxels, 4);
    }
}
