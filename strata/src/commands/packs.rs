//! Script pack listing.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use strata_sdk::extensions::discover_packs;

use crate::config::Config;

pub async fn execute(dir: Option<PathBuf>, config: &Config) -> Result<()> {
    let root = dir.unwrap_or_else(|| config.paths.packs_dir.clone());
    let packs = discover_packs(&root)
        .await
        .with_context(|| format!("Failed to scan packs directory {}", root.display()))?;

    if packs.is_empty() {
        println!("{} {}", "No script packs found in".yellow(), root.display());
        return Ok(());
    }

    println!("{}", "Script Packs".bold());
    println!("{}", "═".repeat(60));

    for pack in &packs {
        println!(
            "{} {} {} {}",
            "●".green(),
            pack.name().bold(),
            format!("v{}", pack.version()).dimmed(),
            format!("[{}]", pack.namespace).cyan()
        );
        println!("  {} {}", "Priority:".cyan(), pack.priority());
        println!("  {} {}", "Entry:".cyan(), pack.manifest.scripts.entry);
        if !pack.manifest.pack.authors.is_empty() {
            println!("  {} {}", "Authors:".cyan(), pack.manifest.pack.authors.join(", "));
        }
        if !pack.manifest.pack.description.is_empty() {
            println!("  {}", pack.manifest.pack.description);
        }
    }

    println!();
    println!("{} pack(s) in load order", packs.len());
    Ok(())
}
