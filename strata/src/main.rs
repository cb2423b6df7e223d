//! strata - World-generation hook CLI
//!
//! Runs a synthetic host against the hook layer and inspects extension packs
//! and dimension configs.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands, DimensionsAction};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("strata=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Simulate(args) => commands::simulate::execute(args, &config).await,
        Commands::Packs { dir } => commands::packs::execute(dir, &config).await,
        Commands::Dimensions(cmd) => match cmd.action {
            DimensionsAction::Validate { file } => commands::dimensions::validate(&file).await,
        },
        Commands::Config => commands::config::execute(&config),
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Version => {
            println!("strata {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
