//
// lut.rs
// Seg-Relabel-rs
//
// Writes FreeSurfer color lookup tables for the standardized vocabulary and hands volumes to an optional coloring tool.
//
// Thales Matheus Mendonça Santos - November 2025

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::labels::LabelCatalogue;

pub const DEFAULT_LUT_NAME: &str = "custom_segmentation_lut.txt";

/// FreeSurfer tool used to attach a color table to a volume.
pub const COLOR_TOOL: &str = "mri_vol2vol";

/// Render the catalogue as a FreeSurfer color table (`label name r g b a` per line).
pub fn format_color_lut(catalogue: &LabelCatalogue) -> String {
    let mut out = String::new();
    out.push_str("# FreeSurfer color lookup table for segmentation\n");
    out.push_str("# Label Name R G B A\n");
    for entry in catalogue.valid {
        let [r, g, b] = entry.rgb;
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{} {} {} {} {} 0", entry.value, entry.name, r, g, b);
    }
    out
}

pub fn write_color_lut(catalogue: &LabelCatalogue, path: &Path) -> Result<PathBuf> {
    fs::write(path, format_color_lut(catalogue))
        .with_context(|| format!("Failed to write color table {:?}", path))?;
    info!("Created color lookup table: {}", path.display());
    Ok(path.to_path_buf())
}

/// Something able to produce a colored copy of a label volume.
pub trait ColorTableApplier {
    fn apply(&self, volume: &Path, lut: &Path, output: &Path) -> Result<PathBuf>;
}

/// Copies the volume unchanged; the color table stays a sidecar file.
pub struct PassThrough;

impl ColorTableApplier for PassThrough {
    fn apply(&self, volume: &Path, _lut: &Path, output: &Path) -> Result<PathBuf> {
        if volume != output {
            fs::copy(volume, output)
                .with_context(|| format!("Failed to copy {:?} to {:?}", volume, output))?;
        }
        Ok(output.to_path_buf())
    }
}

/// Runs `mri_vol2vol --lut <lut> <volume> <output>`.
pub struct ExternalTool {
    program: PathBuf,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Look for the FreeSurfer tool on `PATH`.
    pub fn discover() -> Option<Self> {
        let paths = env::var_os("PATH")?;
        env::split_paths(&paths)
            .map(|dir| dir.join(COLOR_TOOL))
            .find(|candidate| candidate.is_file())
            .map(Self::new)
    }
}

impl ColorTableApplier for ExternalTool {
    fn apply(&self, volume: &Path, lut: &Path, output: &Path) -> Result<PathBuf> {
        info!(
            "Applying color LUT: {} --lut {} {} {}",
            self.program.display(),
            lut.display(),
            volume.display(),
            output.display()
        );
        let status = Command::new(&self.program)
            .arg("--lut")
            .arg(lut)
            .arg(volume)
            .arg(output)
            .status()
            .with_context(|| format!("Failed to launch {:?}", self.program))?;
        if !status.success() {
            bail!("{:?} exited with {}", self.program, status);
        }
        Ok(output.to_path_buf())
    }
}

/// Use `applier` when available, falling back to a plain copy on absence or failure.
pub fn apply_or_copy(
    applier: Option<&dyn ColorTableApplier>,
    volume: &Path,
    lut: &Path,
    output: &Path,
) -> Result<PathBuf> {
    match applier {
        Some(tool) => match tool.apply(volume, lut, output) {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!("Could not apply color LUT: {:#}; using intermediate file as output", e);
                PassThrough.apply(volume, lut, output)
            }
        },
        None => {
            warn!("{} not found; copying relabeled volume without color table", COLOR_TOOL);
            PassThrough.apply(volume, lut, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::FREESURFER_ASEG;
    use tempfile::tempdir;

    struct Failing;

    impl ColorTableApplier for Failing {
        fn apply(&self, _volume: &Path, _lut: &Path, _output: &Path) -> Result<PathBuf> {
            bail!("tool crashed")
        }
    }

    #[test]
    fn lut_lists_every_valid_label() {
        let text = format_color_lut(&FREESURFER_ASEG);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 + FREESURFER_ASEG.valid.len());
        assert_eq!(lines[2], "0 Unknown 0 0 0 0");
        assert!(lines.contains(&"41 Right-Cerebral-White-Matter 0 225 0 0"));
        assert_eq!(lines.last(), Some(&"172 Vermis 119 100 176 0"));
    }

    #[test]
    fn failing_tool_degrades_to_copy() {
        let dir = tempdir().expect("tmpdir");
        let volume = dir.path().join("staged.mgz");
        let output = dir.path().join("final.mgz");
        let lut = dir.path().join("lut.txt");
        fs::write(&volume, b"volume bytes").expect("write staged");

        let result = apply_or_copy(Some(&Failing), &volume, &lut, &output).expect("fallback");
        assert_eq!(result, output);
        assert_eq!(fs::read(&output).expect("read output"), b"volume bytes");

        fs::remove_file(&output).expect("cleanup");
        apply_or_copy(None, &volume, &lut, &output).expect("no tool");
        assert!(output.exists());
    }
}
