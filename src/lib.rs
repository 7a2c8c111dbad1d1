//
// lib.rs
// Seg-Relabel-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: each module mirrors a CLI verb or shared utility.
pub mod batch;
pub mod cli;
pub mod corpus_callosum;
pub mod labels;
pub mod lut;
pub mod mgh;
pub mod models;
pub mod relabel;
pub mod remap;
pub mod stats;
pub mod validate;
pub mod volume;

pub use cli::{run as run_cli, Cli, Commands};
pub use relabel::{relabel_file, relabel_labels, RelabelOptions};
