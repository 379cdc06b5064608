//! Configuration system for tokenrelay
//!
//! `RelayConfig` groups the server, model, generation and task settings.
//! Every field has a default, so a config file only needs the values it changes.

mod generation;
mod model;
mod server;
mod tasks;

pub use generation::GenerationConfig;
pub use model::{Backend, DeviceConfig, ModelConfig};
pub use server::ServerConfig;
pub use tasks::TaskConfig;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `model.cache_dir`
pub const CACHE_DIR_ENV: &str = "TOKENRELAY_CACHE_DIR";

/// Tokenrelay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Model source and device
    #[serde(default)]
    pub model: ModelConfig,

    /// Decoding settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Task lifecycle settings
    #[serde(default)]
    pub tasks: TaskConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from an optional file (format picked by extension), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let is_json = path
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false);
                let loaded = if is_json {
                    Self::from_json(path)
                } else {
                    Self::from_yaml(path)
                };
                loaded.with_context(|| format!("failed to load config {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            config.apply_cache_dir(Some(dir));
        }

        Ok(config)
    }

    /// Override the cache directory when a non-empty value is given
    pub fn apply_cache_dir(&mut self, dir: Option<String>) {
        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            self.model.cache_dir = PathBuf::from(dir);
        }
    }
}
