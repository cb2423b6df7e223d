//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use strata_sdk::Strata;
use strata_sdk::extensions::{NativeRuntime, discover_packs};

use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "strata Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check runtime configuration
    print!("  Runtime config: ");
    match Strata::new(config.runtime.clone(), NativeRuntime::new()) {
        Ok(strata) => {
            println!("{}", "✓ valid".green());
            strata.shutdown()?;
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Runtime configuration is invalid");
        }
    }

    // Check packs directory
    print!("  Packs directory: ");
    let packs_dir = &config.paths.packs_dir;
    if !packs_dir.exists() {
        println!("{}", format!("○ {} not found", packs_dir.display()).yellow());
    } else {
        match discover_packs(packs_dir).await {
            Ok(packs) => println!("{}", format!("✓ {} pack(s)", packs.len()).green()),
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Packs directory is not readable");
            }
        }
    }

    // Check script runtime
    print!("  Script runtime: ");
    if cfg!(feature = "scripting") {
        println!("{}", "✓ rhai".green());
    } else {
        println!("{}", "○ not built (enable the `scripting` feature)".yellow());
    }

    // Wiring overview
    let dispatch = &config.runtime.dispatch;
    println!();
    println!("  {}", "Wiring:".cyan());
    for (name, wired) in [
        ("biome select", dispatch.wire_biome_select),
        ("noise fill", dispatch.wire_noise_fill),
    ] {
        print!("    {}: ", name);
        if wired {
            println!("{}", "✓ wired".green());
        } else {
            println!("{}", "○ not dispatched".yellow());
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
