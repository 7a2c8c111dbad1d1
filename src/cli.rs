//
// cli.rs
// Seg-Relabel-rs
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::corpus_callosum::TieBreak;
use crate::labels::FREESURFER_ASEG;
use crate::relabel::RelabelOptions;
use crate::{batch, lut, relabel, stats, validate};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "seg-relabel")]
#[command(about = "Relabel brain MRI segmentations to a standardized label set", long_about = None)]
pub struct Cli {
    /// Log debug details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Relabel a segmentation file (.mgz, .mgh, .nii or .nii.gz)
    Relabel {
        input: PathBuf,
        /// Output filename (default: adds "_relabeled" to the input filename)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = TieBreakArg::RandomPerVoxel)]
        tie_break: TieBreakArg,
        /// Seed for midline tie-breaks
        #[arg(long)]
        seed: Option<u64>,
        /// Write a JSON report of the run
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write a FreeSurfer color lookup table
        #[arg(long)]
        lut: Option<PathBuf>,
        /// Color the output with mri_vol2vol when available
        #[arg(long)]
        apply_lut: bool,
    },
    /// List the labels of a volume with voxel counts
    Labels { file: PathBuf },
    /// Check that every label belongs to the standardized set
    Validate { file: PathBuf },
    /// Write the color lookup table of the standardized set
    Lut {
        #[arg(short, long, default_value = lut::DEFAULT_LUT_NAME)]
        output: PathBuf,
    },
    /// Batch processing over a directory
    Batch {
        #[arg(short, long)]
        directory: PathBuf,
        #[arg(short, long, value_enum)]
        operation: BatchOperationArg,
        #[arg(long, value_enum, default_value_t = TieBreakArg::RandomPerVoxel)]
        tie_break: TieBreakArg,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum BatchOperationArg {
    Relabel,
    Validate,
}

impl From<BatchOperationArg> for batch::BatchOperation {
    fn from(value: BatchOperationArg) -> Self {
        match value {
            BatchOperationArg::Relabel => batch::BatchOperation::Relabel,
            BatchOperationArg::Validate => batch::BatchOperation::Validate,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TieBreakArg {
    Left,
    Right,
    RandomPerVoxel,
    RandomPerRun,
}

impl From<TieBreakArg> for TieBreak {
    fn from(value: TieBreakArg) -> Self {
        match value {
            TieBreakArg::Left => TieBreak::Left,
            TieBreakArg::Right => TieBreak::Right,
            TieBreakArg::RandomPerVoxel => TieBreak::RandomPerVoxel,
            TieBreakArg::RandomPerRun => TieBreak::RandomPerRun,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Relabel {
            input,
            output,
            tie_break,
            seed,
            report,
            lut,
            apply_lut,
        } => {
            let options = RelabelOptions {
                catalogue: FREESURFER_ASEG,
                tie_break: tie_break.into(),
                seed,
                report,
                lut,
                apply_lut,
            };
            let report = relabel::relabel_file(&input, output, &options)?;
            println!(
                "Relabeling complete. Modified {} label types.",
                report.relabeled_count()
            );
            if !report.unmapped.is_empty() {
                println!("Labels left as is: {:?}", report.unmapped);
            }
            println!("Output: {}", report.output.display());
            if let Some(lut_path) = &report.color_lut {
                println!("Custom color LUT created: {}", lut_path.display());
                println!("To visualize with correct colors in FreeSurfer, use:");
                println!(
                    "  freeview {}:colormap=lut:{}",
                    report.output.display(),
                    lut_path.display()
                );
            }
        }
        Commands::Labels { file } => stats::print_labels(&file, &FREESURFER_ASEG)?,
        Commands::Validate { file } => {
            validate::check_file(&file, &FREESURFER_ASEG)?;
        }
        Commands::Lut { output } => {
            let path = lut::write_color_lut(&FREESURFER_ASEG, &output)
                .with_context(|| format!("Failed to create {:?}", output))?;
            println!("Color lookup table saved to: {}", path.display());
        }
        Commands::Batch {
            directory,
            operation,
            tie_break,
            seed,
        } => {
            let options = RelabelOptions {
                tie_break: tie_break.into(),
                seed,
                ..RelabelOptions::default()
            };
            let summary = batch::process_directory(&directory, operation.into(), &options)?;
            for (path, message) in &summary.failed {
                eprintln!("Error in {:?}: {}", path, message);
            }
        }
    }

    Ok(())
}
