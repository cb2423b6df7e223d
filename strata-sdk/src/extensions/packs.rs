//! Script Packs
//!
//! A pack is a directory under the packs root whose name is its namespace:
//!
//! ```text
//! packs/
//! └── caverns/
//!     ├── pack.toml        (optional)
//!     └── data/
//!         └── main.rhai    (entry script)
//! ```
//!
//! `pack.toml` is optional; every field has a default:
//!
//! ```toml
//! [pack]
//! name = "Caverns"
//! version = "1.2.0"
//! authors = ["alice"]
//!
//! [loading]
//! enabled = true
//! priority = 50
//!
//! [scripts]
//! entry = "data/main.rhai"
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{SdkError, SdkResult};

/// Manifest file name inside a pack directory.
pub const MANIFEST_FILE: &str = "pack.toml";

/// Entry script used when the manifest names none.
pub const DEFAULT_ENTRY: &str = "data/main.rhai";

/// Priority used when the manifest names none.
pub const DEFAULT_PRIORITY: i32 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Manifest
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed `pack.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackManifest {
    pub pack: PackInfo,
    pub loading: LoadingSection,
    pub scripts: ScriptsSection,
}

/// `[pack]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackInfo {
    /// Display name (default: the namespace)
    pub name: Option<String>,
    pub version: String,
    pub authors: Vec<String>,
    pub description: String,
    pub dependencies: Vec<String>,
}

impl Default for PackInfo {
    fn default() -> Self {
        Self {
            name: None,
            version: "1.0.0".to_string(),
            authors: Vec::new(),
            description: String::new(),
            dependencies: Vec::new(),
        }
    }
}

/// `[loading]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingSection {
    pub enabled: bool,
    /// Lower loads first
    pub priority: i32,
}

impl Default for LoadingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// `[scripts]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsSection {
    /// Entry script, relative to the pack directory
    pub entry: String,
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
        }
    }
}

impl PackManifest {
    pub fn parse(content: &str) -> SdkResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Script Pack
// ─────────────────────────────────────────────────────────────────────────────

/// A pack found on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptPack {
    pub namespace: String,
    pub dir: PathBuf,
    pub manifest: PackManifest,
    pub discovered_at: DateTime<Utc>,
}

impl ScriptPack {
    /// Read a pack directory. A missing `pack.toml` yields the defaults.
    pub async fn load(dir: &Path) -> SdkResult<Self> {
        let namespace = dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| SdkError::pack(dir.display().to_string(), "directory name is not a valid namespace"))?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if fs::try_exists(&manifest_path).await? {
            let content = fs::read_to_string(&manifest_path).await?;
            PackManifest::parse(&content).map_err(|e| SdkError::pack(&namespace, e.to_string()))?
        } else {
            PackManifest::default()
        };

        let pack = Self {
            namespace,
            dir: dir.to_path_buf(),
            manifest,
            discovered_at: Utc::now(),
        };
        pack.validate()?;
        Ok(pack)
    }

    pub fn name(&self) -> &str {
        self.manifest.pack.name.as_deref().unwrap_or(&self.namespace)
    }

    pub fn version(&self) -> &str {
        &self.manifest.pack.version
    }

    pub fn priority(&self) -> i32 {
        self.manifest.loading.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.manifest.loading.enabled
    }

    pub fn entry_path(&self) -> PathBuf {
        self.dir.join(&self.manifest.scripts.entry)
    }

    /// Read the entry script.
    pub async fn read_entry(&self) -> SdkResult<String> {
        fs::read_to_string(self.entry_path())
            .await
            .map_err(|e| SdkError::pack(&self.namespace, format!("cannot read entry script: {}", e)))
    }

    fn validate(&self) -> SdkResult<()> {
        let entry = Path::new(&self.manifest.scripts.entry);
        if entry.as_os_str().is_empty() {
            return Err(SdkError::pack(&self.namespace, "entry script path is empty"));
        }
        let escapes = entry
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SdkError::pack(
                &self.namespace,
                format!("entry script must stay inside the pack: {}", entry.display()),
            ));
        }
        if self.manifest.pack.version.split('.').count() < 2 {
            return Err(SdkError::pack(
                &self.namespace,
                "version must be semver format (e.g., 1.0.0)",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ScriptPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} [{}]", self.name(), self.version(), self.namespace)
    }
}

/// Find every loadable pack under `root`, in load order.
///
/// Disabled packs, packs without an entry script and packs with a broken
/// manifest are skipped with a log line. A missing root yields no packs.
pub async fn discover_packs(root: &Path) -> SdkResult<Vec<ScriptPack>> {
    if !fs::try_exists(root).await? {
        tracing::debug!(root = %root.display(), "Packs directory does not exist");
        return Ok(Vec::new());
    }

    let mut packs = Vec::new();
    let mut entries = fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        let pack = match ScriptPack::load(&path).await {
            Ok(pack) => pack,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping invalid script pack");
                continue;
            }
        };

        if !pack.is_enabled() {
            tracing::info!(pack = %pack.namespace, "Script pack disabled");
            continue;
        }
        if !fs::try_exists(pack.entry_path()).await? {
            tracing::warn!(
                pack = %pack.namespace,
                entry = %pack.manifest.scripts.entry,
                "Script pack has no entry script"
            );
            continue;
        }

        packs.push(pack);
    }

    packs.sort_by(|a, b| {
        a.priority()
            .cmp(&b.priority())
            .then_with(|| a.namespace.cmp(&b.namespace))
    });

    tracing::info!(count = packs.len(), root = %root.display(), "Discovered script packs");
    Ok(packs)
}
