//
// relabel.rs
// Seg-Relabel-rs
//
// Runs the corpus callosum split and the label remap over a volume file and records what changed.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::corpus_callosum::{CorpusCallosumResolver, TieBreak};
use crate::labels::{Label, LabelCatalogue};
use crate::lut::{self, ColorTableApplier, ExternalTool};
use crate::models::{CorpusCallosumSummary, RelabelReport};
use crate::remap::{remap_labels, RemapError, RemapSummary};
use crate::volume::{LabelVolume, VolumeFormat};

pub const RELABELED_SUFFIX: &str = "_relabeled";

/// Knobs for a relabel run.
#[derive(Debug, Clone, Default)]
pub struct RelabelOptions {
    pub catalogue: LabelCatalogue,
    pub tie_break: TieBreak,
    /// Seed for midline tie-breaks; drawn from entropy and reported when absent.
    pub seed: Option<u64>,
    /// Where to write a JSON report of the run.
    pub report: Option<PathBuf>,
    /// Where to write the color lookup table.
    pub lut: Option<PathBuf>,
    /// Try to color the output with the FreeSurfer tool.
    pub apply_lut: bool,
}

#[derive(Debug, Clone)]
pub struct RelabelOutcome {
    pub corpus_callosum: CorpusCallosumSummary,
    pub remap: RemapSummary,
}

/// Split the corpus callosum, then collapse out-of-vocabulary labels.
pub fn relabel_labels<R: Rng + ?Sized>(
    labels: &mut Array3<Label>,
    catalogue: &LabelCatalogue,
    tie_break: TieBreak,
    rng: &mut R,
) -> Result<RelabelOutcome, RemapError> {
    let corpus_callosum = CorpusCallosumResolver::new(catalogue, tie_break).resolve(labels, rng);
    let remap = remap_labels(labels, catalogue)?;
    Ok(RelabelOutcome {
        corpus_callosum,
        remap,
    })
}

/// `aseg.mgz` becomes `aseg_relabeled.mgz`; `.nii.gz` is kept as one extension.
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let split = match VolumeFormat::from_path(input) {
        Some(format) => name.len() - format.extension().len(),
        None => name.rfind('.').filter(|&i| i > 0).unwrap_or(name.len()),
    };
    let (stem, ext) = name.split_at(split);
    input.with_file_name(format!("{}{}{}", stem, RELABELED_SUFFIX, ext))
}

/// Relabel `input` and write the result to `output` (or the default sibling path).
pub fn relabel_file(
    input: &Path,
    output: Option<PathBuf>,
    options: &RelabelOptions,
) -> Result<RelabelReport> {
    let output = output.unwrap_or_else(|| default_output_path(input));
    let format = VolumeFormat::from_path(input)
        .with_context(|| format!("Unsupported volume format: {:?}", input))?;
    let seed = options.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut volume = LabelVolume::open(input)
        .with_context(|| format!("Failed to open label volume {:?}", input))?;
    let outcome = relabel_labels(
        &mut volume.labels,
        &options.catalogue,
        options.tie_break,
        &mut rng,
    )
    .with_context(|| format!("Failed to relabel {:?}", input))?;

    let lut_path = options.lut.clone().or_else(|| {
        options
            .apply_lut
            .then(|| output.with_file_name(lut::DEFAULT_LUT_NAME))
    });
    match (&lut_path, options.apply_lut) {
        (Some(lut_path), true) => {
            let staged = staging_path(&output);
            if let Err(e) = volume.save(&staged) {
                let _ = fs::remove_file(&staged);
                return Err(e).with_context(|| format!("Failed to write {:?}", output));
            }
            // mri_vol2vol reads the table from disk.
            if let Err(e) = lut::write_color_lut(&options.catalogue, lut_path) {
                let _ = fs::remove_file(&staged);
                return Err(e);
            }
            let tool = ExternalTool::discover();
            let applied = lut::apply_or_copy(
                tool.as_ref().map(|t| t as &dyn ColorTableApplier),
                &staged,
                lut_path,
                &output,
            );
            if let Err(e) = fs::remove_file(&staged) {
                warn!("Could not remove intermediate file {:?}: {}", staged, e);
            }
            if let Err(e) = applied {
                let _ = fs::remove_file(lut_path);
                return Err(e);
            }
        }
        _ => {
            save_atomically(&volume, &output)?;
            if let Some(path) = &lut_path {
                lut::write_color_lut(&options.catalogue, path)?;
            }
        }
    }

    let report = RelabelReport {
        input: input.to_path_buf(),
        output: output.clone(),
        format: format.to_string(),
        shape: volume.shape(),
        unique_labels: outcome.remap.unique_labels,
        corpus_callosum: outcome.corpus_callosum,
        remapped: outcome.remap.remapped,
        unmapped: outcome.remap.unmapped,
        tie_break: options.tie_break.to_string(),
        seed,
        color_lut: lut_path,
        processed_at: chrono::Local::now().to_rfc3339(),
    };

    if let Some(path) = &options.report {
        write_report(&report, path)?;
    }
    info!(
        "Relabeled {:?}: {} label type(s) remapped, {} left as is",
        input,
        report.relabeled_count(),
        report.unmapped.len()
    );
    Ok(report)
}

pub fn write_report(report: &RelabelReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write report {:?}", path))?;
    Ok(())
}

/// Hidden sibling of `output` keeping its extension, so format detection still works.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".partial-{}-{}", std::process::id(), name))
}

fn save_atomically(volume: &LabelVolume, output: &Path) -> Result<()> {
    let staged = staging_path(output);
    if let Err(e) = volume.save(&staged) {
        let _ = fs::remove_file(&staged);
        return Err(e).with_context(|| format!("Failed to write {:?}", output));
    }
    fs::rename(&staged, output)
        .with_context(|| format!("Failed to move {:?} into place", output))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::FREESURFER_ASEG;

    #[test]
    fn default_output_inserts_suffix_before_extension() {
        assert_eq!(
            default_output_path(Path::new("/data/sub-01_aseg.nii.gz")),
            PathBuf::from("/data/sub-01_aseg_relabeled.nii.gz")
        );
        assert_eq!(
            default_output_path(Path::new("aseg.mgz")),
            PathBuf::from("aseg_relabeled.mgz")
        );
        assert_eq!(
            default_output_path(Path::new("labels.raw")),
            PathBuf::from("labels_relabeled.raw")
        );
        assert_eq!(
            default_output_path(Path::new("labels")),
            PathBuf::from("labels_relabeled")
        );
    }

    #[test]
    fn staging_keeps_extension() {
        let staged = staging_path(Path::new("/tmp/out/aseg_relabeled.nii.gz"));
        assert_eq!(staged.parent(), Some(Path::new("/tmp/out")));
        assert_eq!(VolumeFormat::from_path(&staged), Some(VolumeFormat::NiftiGz));
    }

    #[test]
    fn pipeline_leaves_only_valid_or_reported_labels() {
        let mut labels = Array3::zeros((6, 2, 1));
        for (x, value) in [251, 252, 1017, 2024, 72, 500].into_iter().enumerate() {
            labels[(x, 0, 0)] = value;
        }
        labels[(3, 1, 0)] = 254;

        let mut rng = StdRng::seed_from_u64(3);
        let outcome = relabel_labels(&mut labels, &FREESURFER_ASEG, TieBreak::Left, &mut rng)
            .expect("relabel");

        assert!(labels
            .iter()
            .all(|&l| FREESURFER_ASEG.is_valid(l) || outcome.remap.unmapped.contains(&l)));
        assert_eq!(outcome.remap.unmapped, vec![500]);
        assert_eq!(outcome.corpus_callosum.voxels, 3);
        assert_eq!(outcome.remap.remapped.len(), 3);
        // Row y=0: CC at x=0,1 gives midline 0; x=1 lies right of it.
        assert_eq!(labels[(0, 0, 0)], 2);
        assert_eq!(labels[(1, 0, 0)], 2);
        assert_eq!(labels[(3, 1, 0)], 2);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let mut labels = Array3::from_shape_fn((5, 5, 5), |(x, y, z)| match (x + y + z) % 4 {
            0 => 253,
            1 => 1030,
            2 => 2030,
            _ => 17,
        });
        let mut rng = StdRng::seed_from_u64(11);
        relabel_labels(&mut labels, &FREESURFER_ASEG, TieBreak::RandomPerVoxel, &mut rng)
            .expect("first pass");
        let once = labels.clone();

        let again = relabel_labels(&mut labels, &FREESURFER_ASEG, TieBreak::RandomPerVoxel, &mut rng)
            .expect("second pass");
        assert_eq!(labels, once);
        assert!(again.remap.remapped.is_empty());
        assert_eq!(again.corpus_callosum.voxels, 0);
    }
}
