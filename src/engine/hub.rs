//! Model file resolution
//!
//! Local paths from the config win; anything else is fetched from the
//! Hugging Face hub into the configured cache directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};

use crate::config::ModelConfig;

/// Files needed to load a GGUF model
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub weights: PathBuf,
    pub tokenizer: PathBuf,
}

/// Resolve weights and tokenizer, downloading whatever is not available locally
pub fn fetch_model_files(config: &ModelConfig) -> Result<ModelFiles> {
    let weights = match &config.weights_path {
        Some(path) => local_file(path)?,
        None => {
            tracing::info!("Fetching weights {}/{}", config.repo, config.file);
            let repo = Repo::with_revision(
                config.repo.clone(),
                RepoType::Model,
                config.revision.clone(),
            );
            hub_api(config)?
                .repo(repo)
                .get(&config.file)
                .with_context(|| format!("failed to fetch {} from {}", config.file, config.repo))?
        }
    };

    let tokenizer = match &config.tokenizer_path {
        Some(path) => local_file(path)?,
        None => {
            tracing::info!("Fetching tokenizer from {}", config.tokenizer_repo);
            hub_api(config)?
                .model(config.tokenizer_repo.clone())
                .get("tokenizer.json")
                .with_context(|| {
                    format!("failed to fetch tokenizer.json from {}", config.tokenizer_repo)
                })?
        }
    };

    tracing::info!("Weights: {}", weights.display());
    tracing::info!("Tokenizer: {}", tokenizer.display());

    Ok(ModelFiles { weights, tokenizer })
}

fn hub_api(config: &ModelConfig) -> Result<Api> {
    std::fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("failed to create cache dir {}", config.cache_dir.display()))?;
    let api = ApiBuilder::new()
        .with_cache_dir(config.cache_dir.clone())
        .build()?;
    Ok(api)
}

fn local_file(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_paths_skip_hub() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("model.gguf");
        let tokenizer = dir.path().join("tokenizer.json");
        std::fs::write(&weights, b"GGUF").unwrap();
        std::fs::write(&tokenizer, b"{}").unwrap();

        let config = ModelConfig {
            weights_path: Some(weights.clone()),
            tokenizer_path: Some(tokenizer.clone()),
            // Never created: the hub is not touched.
            cache_dir: dir.path().join("unused-cache"),
            ..Default::default()
        };

        let files = fetch_model_files(&config).unwrap();
        assert_eq!(files.weights, weights);
        assert_eq!(files.tokenizer, tokenizer);
        assert!(!config.cache_dir.exists());
    }

    #[test]
    fn test_missing_local_file() {
        let config = ModelConfig {
            weights_path: Some(PathBuf::from("/nonexistent/model.gguf")),
            ..Default::default()
        };
        assert!(fetch_model_files(&config).is_err());
    }
}
