//! Generation configuration settings

use serde::{Deserialize, Serialize};

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Temperature for sampling (0 = greedy)
    #[serde(default)]
    pub temperature: f64,

    /// Top-p nucleus sampling threshold (None = disabled)
    #[serde(default)]
    pub top_p: Option<f64>,

    /// Top-k sampling (None = disabled)
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Repetition penalty (1.0 = no penalty)
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// Number of trailing tokens the repetition penalty looks at
    #[serde(default = "default_repeat_last_n")]
    pub repeat_last_n: usize,

    /// Sampling seed
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Context window shared by the prompt and the generated tokens
    #[serde(default = "default_context_length")]
    pub context_length: usize,

    /// Delay between tokens for the stub backend, in milliseconds
    #[serde(default = "default_stub_delay_ms")]
    pub stub_delay_ms: u64,
}

fn default_max_tokens() -> usize {
    512
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_repeat_last_n() -> usize {
    64
}

fn default_seed() -> u64 {
    299_792_458
}

fn default_context_length() -> usize {
    4000
}

fn default_stub_delay_ms() -> u64 {
    20
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            top_p: None,
            top_k: None,
            repeat_penalty: default_repeat_penalty(),
            repeat_last_n: default_repeat_last_n(),
            seed: default_seed(),
            context_length: default_context_length(),
            stub_delay_ms: default_stub_delay_ms(),
        }
    }
}

impl GenerationConfig {
    /// Check if greedy decoding should be used
    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0
    }

    /// Maximum number of prompt tokens that still leaves room for `max_tokens`.
    ///
    /// Always at least one so a prompt can be fed to the model.
    pub fn prompt_budget(&self) -> usize {
        self.context_length.saturating_sub(self.max_tokens).max(1)
    }
}
