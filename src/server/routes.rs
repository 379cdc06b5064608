//! Route definitions

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{cancel_task, generate, health, stream, task_status, AppState};

/// Create the task API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Task lifecycle
        .route("/generate", post(generate))
        .route("/stream/:task_id", get(stream))
        .route("/tasks/:task_id", get(task_status).delete(cancel_task))
}
