//! Effective configuration.

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;

pub fn execute(config: &Config) -> Result<()> {
    let path = Config::config_path();
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };

    println!("{} {}", "#".dimmed(), source.dimmed());
    print!("{}", config.to_toml()?);
    Ok(())
}
