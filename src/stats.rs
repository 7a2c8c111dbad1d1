use anyhow::{Context, Result};
use ndarray::Array3;
use std::collections::BTreeMap;
use std::path::Path;

use crate::labels::{Label, LabelCatalogue};
use crate::models::LabelCount;
use crate::volume::LabelVolume;

/// Voxel count of every label present in the volume.
pub fn label_histogram(labels: &Array3<Label>) -> BTreeMap<Label, usize> {
    let mut histogram = BTreeMap::new();
    for &label in labels.iter() {
        *histogram.entry(label).or_insert(0) += 1;
    }
    histogram
}

/// Label inventory with structure names and vocabulary membership.
pub fn label_inventory(labels: &Array3<Label>, catalogue: &LabelCatalogue) -> Vec<LabelCount> {
    label_histogram(labels)
        .into_iter()
        .map(|(label, voxels)| LabelCount {
            label,
            name: catalogue.name_of(label).map(str::to_string),
            voxels,
            valid: catalogue.is_valid(label),
        })
        .collect()
}

/// Print the label inventory of a volume file.
pub fn print_labels(input: &Path, catalogue: &LabelCatalogue) -> Result<()> {
    let volume = LabelVolume::open(input)
        .with_context(|| format!("Failed to open label volume {:?}", input))?;
    let inventory = label_inventory(&volume.labels, catalogue);
    let total = volume.labels.len();

    println!("Labels for {:?}", input);
    println!("  Shape:  {:?}", volume.labels.shape());
    println!("  Unique: {}", inventory.len());
    for row in &inventory {
        let share = 100.0 * row.voxels as f64 / total as f64;
        let marker = if row.valid { ' ' } else { '*' };
        println!(
            " {}{:>6}  {:<32} {:>10} ({:.2}%)",
            marker,
            row.label,
            row.name.as_deref().unwrap_or("-"),
            row.voxels,
            share
        );
    }
    let invalid = inventory.iter().filter(|r| !r.valid).count();
    if invalid > 0 {
        println!("  * {} label(s) outside the {} vocabulary", invalid, catalogue.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::FREESURFER_ASEG;

    #[test]
    fn inventory_flags_out_of_vocabulary_labels() {
        let labels = Array3::from_shape_vec((4, 1, 1), vec![0, 41, 41, 1028]).expect("shape");
        let inventory = label_inventory(&labels, &FREESURFER_ASEG);

        assert_eq!(inventory.len(), 3);
        assert_eq!(inventory[1].label, 41);
        assert_eq!(inventory[1].voxels, 2);
        assert_eq!(inventory[1].name.as_deref(), Some("Right-Cerebral-White-Matter"));
        assert!(!inventory[2].valid);
        assert_eq!(inventory[2].name, None);
    }
}
