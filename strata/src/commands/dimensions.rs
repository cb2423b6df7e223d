//! Dimension config validation.
//!
//! Files hold an array of `[[dimension]]` tables:
//!
//! ```toml
//! [[dimension]]
//! id = "mypack:caverns"
//! generator_type = "noise"
//!
//! [dimension.dimension_type]
//! min_y = -128
//! height = 512
//! logical_height = 256
//! ```

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use strata_core::DimensionConfigData;

#[derive(Debug, Deserialize)]
struct DimensionFile {
    #[serde(default)]
    dimension: Vec<DimensionConfigData>,
}

/// Outcome for one entry of the file.
#[derive(Debug, PartialEq)]
enum Check {
    Valid,
    Invalid(String),
    Duplicate,
}

fn check_all(configs: &[DimensionConfigData]) -> Vec<Check> {
    let mut seen = HashSet::new();
    configs
        .iter()
        .map(|config| match config.validate() {
            Err(e) => Check::Invalid(e.to_string()),
            Ok(()) if !seen.insert(config.id.as_str()) => Check::Duplicate,
            Ok(()) => Check::Valid,
        })
        .collect()
}

pub async fn validate(file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let parsed: DimensionFile = toml::from_str(&content).context("Failed to parse dimension file")?;

    if parsed.dimension.is_empty() {
        println!("{}", "No [[dimension]] entries found.".yellow());
        return Ok(());
    }

    let checks = check_all(&parsed.dimension);
    for (config, check) in parsed.dimension.iter().zip(&checks) {
        match check {
            Check::Valid => println!("  {} {}", "✓".green(), config.id),
            Check::Invalid(reason) => println!("  {} {}: {}", "✗".red(), config.id, reason),
            Check::Duplicate => println!("  {} {}: {}", "✗".red(), config.id, "duplicate id"),
        }
    }

    let failed = checks.iter().filter(|c| **c != Check::Valid).count();
    println!();
    if failed > 0 {
        bail!("{} of {} dimension(s) invalid", failed, checks.len());
    }
    println!("{}", format!("✓ {} dimension(s) valid", checks.len()).green().bold());
    Ok(())
}
