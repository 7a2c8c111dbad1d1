use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::models::BatchSummary;
use crate::relabel::{self, RelabelOptions, RELABELED_SUFFIX};
use crate::validate;
use crate::volume::VolumeFormat;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BatchOperation {
    Relabel,
    Validate,
}

/// Label volumes under `dir`, sorted, skipping outputs of earlier runs.
pub fn collect_volumes(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| VolumeFormat::from_path(p).is_some())
        .filter(|p| !is_relabeled_output(p))
        .collect();
    files.sort();
    files
}

fn is_relabeled_output(path: &Path) -> bool {
    let Some(format) = VolumeFormat::from_path(path) else {
        return false;
    };
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .map_or(false, |name| {
            name[..name.len() - format.extension().len()].ends_with(RELABELED_SUFFIX)
        })
}

pub fn process_directory(
    dir: &Path,
    operation: BatchOperation,
    options: &RelabelOptions,
) -> Result<BatchSummary> {
    info!("Processing directory: {:?} | Operation: {:?}", dir, operation);

    let files = collect_volumes(dir);
    info!("Found {} label volumes.", files.len());

    let summary = Mutex::new(BatchSummary {
        processed: files.len(),
        ..Default::default()
    });

    files.par_iter().enumerate().for_each(|(idx, path)| {
        let res = match operation {
            BatchOperation::Relabel => {
                // Each file gets its own reproducible stream.
                let file_options = RelabelOptions {
                    seed: options.seed.map(|s| s.wrapping_add(idx as u64)),
                    report: None,
                    ..options.clone()
                };
                relabel::relabel_file(path, None, &file_options).map(|_| ())
            }
            BatchOperation::Validate => {
                validate::check_file(path, &options.catalogue).map(|_| ())
            }
        };

        let mut summary = summary.lock().unwrap_or_else(|p| p.into_inner());
        match res {
            Ok(()) => {
                info!("Success: {:?}", path.file_name().unwrap_or_default());
                summary.succeeded.push(path.clone());
            }
            Err(e) => {
                error!("Error in {:?}: {:#}", path, e);
                summary.failed.push((path.clone(), format!("{:#}", e)));
            }
        }
    });

    let mut summary = summary.into_inner().unwrap_or_else(|p| p.into_inner());
    summary.succeeded.sort();
    summary.failed.sort();
    println!(
        "Batch complete: {} processed, {} succeeded, {} failed.",
        summary.processed,
        summary.succeeded.len(),
        summary.failed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_outputs_are_recognized() {
        assert!(is_relabeled_output(Path::new("a/sub-01_relabeled.nii.gz")));
        assert!(is_relabeled_output(Path::new("aseg_relabeled.mgz")));
        assert!(!is_relabeled_output(Path::new("aseg.mgz")));
        assert!(!is_relabeled_output(Path::new("notes_relabeled.txt")));
    }
}
