//! GGUF generator
//!
//! Runs quantized llama-family weights (Llama, Mistral) through candle's
//! `quantized_llama` model. Decoding is greedy at temperature 0, otherwise
//! sampled with top-k / top-p.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;

use super::decode::IncrementalDecoder;
use super::hub::ModelFiles;
use super::{cancelled, emit, TextGenerator, TokenCallback};
use crate::config::{GenerationConfig, ModelConfig};

/// End-of-sequence markers tried in order when looking up the EOS id
const EOS_TOKENS: &[&str] = &["</s>", "<|end_of_text|>", "<|eot_id|>", "<|endoftext|>"];

/// Candle-backed generator over a GGUF file
pub struct GgufGenerator {
    /// Weights carry the KV cache, so one generation runs at a time
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: Option<u32>,
    generation: GenerationConfig,
}

impl GgufGenerator {
    /// Load weights and tokenizer from resolved files
    pub fn load(files: &ModelFiles, model: &ModelConfig, generation: GenerationConfig) -> Result<Self> {
        let device = model.device.to_candle_device()?;
        let start = Instant::now();

        tracing::info!("Loading GGUF weights from {}", files.weights.display());
        let mut file = std::fs::File::open(&files.weights)
            .with_context(|| format!("failed to open {}", files.weights.display()))?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| anyhow!("failed to read GGUF header {}: {}", files.weights.display(), e))?;

        let tensor_bytes: usize = content
            .tensor_infos
            .values()
            .map(|info| info.shape.elem_count() * info.ggml_dtype.type_size() / info.ggml_dtype.block_size())
            .sum();
        tracing::info!(
            "  - {} tensors, {:.2} GB",
            content.tensor_infos.len(),
            tensor_bytes as f64 / 1e9
        );

        let weights = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| anyhow!("failed to load model: {}", e))?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("failed to load tokenizer {}: {}", files.tokenizer.display(), e))?;
        let eos_token_id = EOS_TOKENS
            .iter()
            .find_map(|token| tokenizer.token_to_id(token));
        if eos_token_id.is_none() {
            tracing::warn!("No EOS token in vocabulary; generation stops at max_tokens only");
        }

        tracing::info!("Model loaded in {:?} on {:?}", start.elapsed(), device);

        Ok(Self {
            model: Mutex::new(weights),
            tokenizer,
            device,
            eos_token_id,
            generation,
        })
    }

    fn lock_model(&self) -> MutexGuard<'_, ModelWeights> {
        self.model.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn encode(&self, prompt: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow!("tokenization failed: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn logits_processor(&self) -> LogitsProcessor {
        let config = &self.generation;
        let temperature = config.temperature;
        let sampling = if config.is_greedy() {
            Sampling::ArgMax
        } else {
            match (config.top_k, config.top_p) {
                (None, None) => Sampling::All { temperature },
                (Some(k), None) => Sampling::TopK { k, temperature },
                (None, Some(p)) => Sampling::TopP { p, temperature },
                (Some(k), Some(p)) => Sampling::TopKThenTopP { k, p, temperature },
            }
        };
        LogitsProcessor::from_sampling(config.seed, sampling)
    }

    /// Run the model over `input` starting at `index_pos`; logits of the last position
    fn step(&self, model: &mut ModelWeights, input: &[u32], index_pos: usize, history: &[u32]) -> Result<Tensor> {
        let input = Tensor::new(input, &self.device)?.unsqueeze(0)?;
        let logits = model.forward(&input, index_pos)?.squeeze(0)?;

        let config = &self.generation;
        if config.repeat_penalty == 1.0 {
            return Ok(logits);
        }
        let start_at = history.len().saturating_sub(config.repeat_last_n);
        let logits = candle_transformers::utils::apply_repeat_penalty(
            &logits,
            config.repeat_penalty,
            &history[start_at..],
        )?;
        Ok(logits)
    }
}

impl TextGenerator for GgufGenerator {
    fn generate(&self, prompt: &str, callbacks: &[&dyn TokenCallback]) -> Result<()> {
        let mut tokens = self.encode(prompt)?;
        if tokens.is_empty() {
            // An empty prompt still needs one position to condition on.
            let bos = self
                .tokenizer
                .token_to_id("<s>")
                .ok_or_else(|| anyhow!("empty prompt and no BOS token"))?;
            tokens.push(bos);
        }

        let budget = self.generation.prompt_budget();
        if tokens.len() > budget {
            tracing::warn!("Prompt truncated from {} to {} tokens", tokens.len(), budget);
            let excess = tokens.len() - budget;
            tokens.drain(..excess);
        }

        let max_tokens = self
            .generation
            .max_tokens
            .min(self.generation.context_length.saturating_sub(tokens.len()));
        let prompt_len = tokens.len();

        let mut decoder = IncrementalDecoder::new(self.tokenizer.clone());
        let mut logits_processor = self.logits_processor();
        let start = Instant::now();

        // The KV cache lives in the weights and is rebuilt from position 0 on
        // every prefill, so holding the lock for the whole run is enough.
        let mut model = self.lock_model();

        let mut index_pos = 0;
        let mut generated = 0;
        while generated < max_tokens {
            if cancelled(callbacks) {
                tracing::debug!("Generation cancelled after {} tokens", generated);
                break;
            }

            let context = if generated == 0 {
                &tokens[..]
            } else {
                &tokens[tokens.len() - 1..]
            };
            let logits = self.step(&mut model, context, index_pos, &tokens)?;
            index_pos += context.len();

            let next = logits_processor.sample(&logits)?;
            if Some(next) == self.eos_token_id {
                break;
            }

            tokens.push(next);
            generated += 1;

            if let Some(text) = decoder.push(next)? {
                emit(callbacks, &text);
            }
        }
        drop(model);

        if let Some(rest) = decoder.finish()? {
            emit(callbacks, &rest);
        }

        let elapsed = start.elapsed().as_secs_f64();
        tracing::debug!(
            prompt_tokens = prompt_len,
            generated,
            "Generated at {:.1} tok/s",
            generated as f64 / elapsed.max(f64::EPSILON)
        );

        Ok(())
    }
}
