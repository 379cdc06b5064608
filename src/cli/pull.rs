//! Pull model files from HuggingFace Hub

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::RelayConfig;
use crate::engine::fetch_model_files;

/// Download the configured weights and tokenizer into the cache
pub async fn pull(config_path: Option<PathBuf>) -> Result<()> {
    let config = RelayConfig::load(config_path.as_deref())?;

    println!("Downloading from: {}", config.model.repo);
    println!("Cache directory: {}", config.model.cache_dir.display());

    let files = tokio::task::spawn_blocking(move || fetch_model_files(&config.model))
        .await
        .context("download task failed")??;

    println!("  Weights: {}", files.weights.display());
    println!("  Tokenizer: {}", files.tokenizer.display());
    println!("\nModel ready.");

    Ok(())
}
