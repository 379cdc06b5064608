//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::error::ApiError;
use super::streaming::create_task_stream;
use crate::config::{ModelConfig, RelayConfig, TaskConfig};
use crate::engine::TextGenerator;
use crate::tasks::{spawn_generation, StatusKind, TaskId, TaskRegistry, TaskStatus};

/// Shared application state
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
    pub generator: Arc<dyn TextGenerator>,
    /// Bounds how many generations run at once
    pub generation_slots: Arc<Semaphore>,
    pub model: ModelConfig,
    pub tasks: TaskConfig,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &RelayConfig) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            generator,
            generation_slots: Arc::new(Semaphore::new(config.tasks.generation_slots())),
            model: config.model.clone(),
            tasks: config.tasks.clone(),
        }
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Start a generation in the background and hand back its task id
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let description_chars = request.description.chars().count();
    let prompt = state.model.render_prompt(&request.description);
    let (task_id, buffer) = state.registry.create(description_chars).await;

    tracing::info!(%task_id, description_chars, "Generation task submitted");

    spawn_generation(
        Arc::clone(&state.generator),
        Arc::clone(&state.generation_slots),
        task_id,
        prompt,
        buffer,
    );

    Json(GenerateResponse {
        task_id: task_id.to_string(),
    })
}

/// Relay a task's tokens as server-sent events
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let (id, entry) = state
        .registry
        .lookup(&task_id)
        .await
        .ok_or(ApiError::TaskNotFound(task_id))?;

    tracing::debug!(task_id = %id, "Stream opened");

    let sse = create_task_stream(
        Arc::clone(&state.registry),
        id,
        Arc::clone(&entry.buffer),
        &state.tasks,
    );
    Ok(sse.into_response())
}

/// Report a task's progress without consuming its tokens
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let not_found = || ApiError::TaskNotFound(task_id.clone());
    let id = task_id.parse::<TaskId>().map_err(|_| not_found())?;
    let snapshot = state.registry.snapshot(&id).await.ok_or_else(not_found)?;

    let error = match &snapshot.status {
        TaskStatus::Failed(message) => Some(message.clone()),
        _ => None,
    };

    Ok(Json(TaskStatusResponse {
        task_id: snapshot.id.to_string(),
        status: snapshot.status.kind(),
        error,
        tokens_generated: snapshot.tokens_generated,
        tokens_pending: snapshot.tokens_pending,
        description_chars: snapshot.description_chars,
        created_at: snapshot.created_at,
    }))
}

/// Cancel a task and forget it
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let not_found = || ApiError::TaskNotFound(task_id.clone());
    let id = task_id.parse::<TaskId>().map_err(|_| not_found())?;
    let entry = state.registry.remove(&id).await.ok_or_else(not_found)?;

    entry.buffer.cancel();
    tracing::info!(task_id = %id, "Task cancelled by client");

    Ok(StatusCode::NO_CONTENT)
}

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tokens_generated: usize,
    pub tokens_pending: usize,
    pub description_chars: usize,
    pub created_at: DateTime<Utc>,
}
