//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Strata world-generation hook CLI
///
/// Drive the hook layer with a synthetic host and inspect extension packs.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synthetic host loop through the hook points
    Simulate(SimulateArgs),

    /// List script packs found in a directory
    Packs {
        /// Packs directory (default: from config)
        dir: Option<PathBuf>,
    },

    /// Custom dimension configs
    Dimensions(DimensionsCommand),

    /// Print the effective configuration
    Config,

    /// Run diagnostics
    Doctor,

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Server ticks to run
    #[arg(short, long, default_value = "100")]
    pub ticks: u64,

    /// Chunks to generate
    #[arg(short, long, default_value = "16")]
    pub chunks: u32,

    /// Load extension callbacks from script packs in this directory
    #[arg(short, long)]
    pub packs: Option<PathBuf>,

    /// World seed
    #[arg(short, long, default_value = "0")]
    pub seed: u64,

    /// Print stats as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DimensionsCommand {
    #[command(subcommand)]
    pub action: DimensionsAction,
}

#[derive(Subcommand, Debug)]
pub enum DimensionsAction {
    /// Validate a TOML file of `[[dimension]]` tables
    Validate {
        /// File to validate
        file: PathBuf,
    },
}
