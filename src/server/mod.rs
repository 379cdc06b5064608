//! HTTP server
//!
//! Submitting a description starts a background generation and returns a task
//! id; the tokens are then relayed over server-sent events.

mod error;
mod handlers;
mod routes;
mod streaming;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, TaskConfig};

pub use error::ApiError;
pub use handlers::{AppState, GenerateRequest, GenerateResponse, TaskStatusResponse};
pub use routes::api_routes;
pub use streaming::{create_task_stream, CANCELLED_MARKER, DONE_MARKER};

/// Build the application with its middleware stack
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(config.max_body_size));

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if config.request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

/// Start the HTTP server and the task sweeper
pub async fn start(state: Arc<AppState>, config: ServerConfig, tasks: &TaskConfig) -> Result<()> {
    let sweeper = state
        .registry
        .spawn_sweeper(tasks.sweep_interval(), tasks.ttl(), tasks.max_age());

    let app = router(state, &config);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET    /health - Health check");
    tracing::info!("  POST   /generate - Start a generation task");
    tracing::info!("  GET    /stream/:task_id - Stream task tokens (SSE)");
    tracing::info!("  GET    /tasks/:task_id - Task status");
    tracing::info!("  DELETE /tasks/:task_id - Cancel a task");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
