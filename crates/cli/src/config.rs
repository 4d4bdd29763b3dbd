//! CLI configuration file.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shelf_progress::LibraryConfig;

/// Default library location, relative to the working directory.
pub const DEFAULT_LIBRARY_PATH: &str = ".shelf/library.json";

/// Settings read from `--config`; command-line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Library file
    pub library_path: PathBuf,

    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,

    /// Library service settings
    pub library: LibraryConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
            log_level: "info".to_string(),
            library: LibraryConfig::default(),
        }
    }
}

impl ShelfConfig {
    /// Load from a JSON file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing config {}", path.display()))
    }
}
