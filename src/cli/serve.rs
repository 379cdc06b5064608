//! HTTP server command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::load_config;
use crate::engine::build_generator;
use crate::server::{self, AppState};

/// Load the model and start the task server
pub async fn serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    host: Option<String>,
    stub: bool,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), stub)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    // Loading weights is blocking and may download; keep it off the runtime threads.
    let generator = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || build_generator(&config))
            .await
            .context("model loading task failed")??
    };
    tracing::info!("Model ready ({:?} backend)", config.model.backend);

    let state = Arc::new(AppState::new(generator, &config));
    tracing::info!("Starting server at http://{}", config.server.addr());

    server::start(state, config.server.clone(), &config.tasks).await?;

    Ok(())
}
