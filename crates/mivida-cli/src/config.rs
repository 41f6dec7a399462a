//! CLI configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mivida_vault::FileStore;

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "MIVIDA_CONFIG";

/// CLI configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Credential store file
    pub store_path: PathBuf,

    /// Print codes grouped as "123 456"
    pub group_codes: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: FileStore::default_path(),
            group_codes: true,
        }
    }
}

impl CliConfig {
    /// Configuration file location: `$MIVIDA_CONFIG`, else the platform
    /// config directory
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("mivida")
                    .join("cli.json")
            })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load the configuration, writing the defaults on first use
    ///
    /// An unreadable file is reported and replaced by the defaults for this
    /// run only.
    pub fn load_or_init(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => info!("Created default config at {}", path.display()),
                Err(e) => warn!("Could not write default config to {}: {}", path.display(), e),
            }
            return config;
        }

        Self::load(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            Self::default()
        })
    }
}
