//! Configuration management for strata.
//!
//! Configuration is loaded with precedence:
//! 1. `$STRATA_CONFIG` (path to a config file)
//! 2. Config file in the platform data dir (`config.toml`)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_sdk::StrataConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hook layer settings
    #[serde(default)]
    pub runtime: StrataConfig,

    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for strata data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Script packs directory
    #[serde(default = "default_packs_dir")]
    pub packs_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "strata", "strata") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".strata")
    }
}

fn default_packs_dir() -> PathBuf {
    default_data_dir().join("packs")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            packs_dir: default_packs_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: StrataConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config
            .runtime
            .validate()
            .context("Invalid runtime configuration")?;
        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("STRATA_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.runtime, StrataConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [runtime.events]
            tick_interval = 5

            [runtime.executor]
            default_timeout_ms = 20

            [paths]
            packs_dir = "/srv/strata/packs"
            "#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.runtime.events.tick_interval, 5);
        assert_eq!(config.runtime.executor.default_timeout_ms, 20);
        assert_eq!(config.runtime.executor.core_threads, 4);
        assert_eq!(config.paths.packs_dir, PathBuf::from("/srv/strata/packs"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[runtime.events]\ntick_interval = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("tick_interval"));
    }

    #[test]
    fn test_defaults_serialize() {
        let rendered = Config::default().to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.runtime, StrataConfig::default());
    }
}
