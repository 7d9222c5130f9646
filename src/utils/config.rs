use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::DocumentSource;

pub const DATABASE_FILE: &str = "clidms.sqlite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the documents to index.
    pub document_path: PathBuf,
    /// Directory holding the catalog database.
    pub data_path: PathBuf,
    #[serde(default = "default_filetypes")]
    pub supported_filetypes: Vec<String>,
}

pub fn default_filetypes() -> Vec<String> {
    ["pdf", "txt", "md", "doc", "docx", "odt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Settings {
    pub fn storage_location(&self) -> PathBuf {
        self.data_path.join(DATABASE_FILE)
    }

    pub fn source(&self) -> DocumentSource {
        DocumentSource {
            directory: self.document_path.clone(),
            extensions: self.supported_filetypes.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }
}

/// `$XDG_CONFIG_HOME/clidms/config.toml`, falling back to the platform
/// config directory.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("clidms").join("config.toml"))
        .ok_or_else(|| anyhow!("Could not determine the config directory"))
}

pub fn load(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "There is no config file at {}. Run `clidms init` first",
            path.display()
        )
    })?;
    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    info!("Loaded configuration from {:?}", path);
    Ok(settings)
}

pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(settings).context("Failed to serialize config")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
