//! Model source and device settings

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Which generator backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Quantized GGUF weights executed with candle
    #[default]
    Gguf,
    /// Echoes the prompt back; no weights required
    Stub,
}

/// Device configuration for inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceConfig {
    /// Simple device string (e.g., "cuda:0", "metal", "cpu")
    Simple(String),
    /// Detailed device configuration
    Detailed {
        /// Device type: "cuda", "metal", "cpu"
        device_type: String,
        /// Device ID (for multi-GPU)
        #[serde(default)]
        device_id: usize,
    },
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::Simple("cpu".to_string())
    }
}

impl DeviceConfig {
    /// Get device type ("cuda", "metal" or "cpu")
    pub fn device_type(&self) -> &str {
        match self {
            DeviceConfig::Simple(s) => {
                if s.starts_with("cuda") {
                    "cuda"
                } else if s.starts_with("metal") {
                    "metal"
                } else {
                    "cpu"
                }
            }
            DeviceConfig::Detailed { device_type, .. } => device_type,
        }
    }

    /// Get device ID (for multi-GPU)
    pub fn device_id(&self) -> usize {
        match self {
            DeviceConfig::Simple(s) => s
                .split_once(':')
                .and_then(|(_, id)| id.parse().ok())
                .unwrap_or(0),
            DeviceConfig::Detailed { device_id, .. } => *device_id,
        }
    }

    /// Open the matching candle device.
    ///
    /// Fails if the backend was not compiled in (see the `cuda` and `metal` features).
    pub fn to_candle_device(&self) -> Result<candle_core::Device> {
        let device = match self.device_type() {
            "cuda" => candle_core::Device::new_cuda(self.device_id())?,
            "metal" => candle_core::Device::new_metal(self.device_id())?,
            "cpu" => candle_core::Device::Cpu,
            other => bail!("unknown device type: '{}'", other),
        };
        Ok(device)
    }
}

/// Where the model weights and tokenizer come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Generator backend
    #[serde(default)]
    pub backend: Backend,

    /// Hugging Face repository holding the GGUF weights
    #[serde(default = "default_repo")]
    pub repo: String,

    /// GGUF file inside `repo`
    #[serde(default = "default_file")]
    pub file: String,

    /// Repository revision
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Hugging Face repository holding `tokenizer.json`
    #[serde(default = "default_tokenizer_repo")]
    pub tokenizer_repo: String,

    /// Local weights file; skips the hub download when set
    #[serde(default)]
    pub weights_path: Option<PathBuf>,

    /// Local `tokenizer.json`; skips the hub download when set
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    /// Download cache directory
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Device configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Prompt template; `{description}` is replaced with the request text
    #[serde(default)]
    pub prompt_template: Option<String>,
}

fn default_repo() -> String {
    "TheBloke/Mistral-7B-codealpaca-lora-GGUF".to_string()
}

fn default_file() -> String {
    "mistral-7b-codealpaca-lora.Q4_K_M.gguf".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_tokenizer_repo() -> String {
    "mistralai/Mistral-7B-v0.1".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./model/cache")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            repo: default_repo(),
            file: default_file(),
            revision: default_revision(),
            tokenizer_repo: default_tokenizer_repo(),
            weights_path: None,
            tokenizer_path: None,
            cache_dir: default_cache_dir(),
            device: DeviceConfig::default(),
            prompt_template: None,
        }
    }
}

impl ModelConfig {
    /// Build the prompt sent to the generator for a request description
    pub fn render_prompt(&self, description: &str) -> String {
        match &self.prompt_template {
            Some(template) => template.replace("{description}", description),
            None => description.to_string(),
        }
    }
}
