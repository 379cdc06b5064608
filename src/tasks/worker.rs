//! Background generation

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::{TaskId, TaskStatus, TokenBuffer};
use crate::engine::{TextGenerator, TokenCallback};

/// Run `generator` on a blocking thread, feeding tokens into `buffer`.
///
/// Returns immediately. The task first waits for a permit from `slots`, so
/// queued generations do not hold blocking-pool threads. The supervising task
/// writes the terminal status once generation returns: completed on success,
/// failed on error or panic. A task cancelled while queued never runs, and one
/// cancelled while running keeps its cancelled status.
pub fn spawn_generation(
    generator: Arc<dyn TextGenerator>,
    slots: Arc<Semaphore>,
    id: TaskId,
    prompt: String,
    buffer: Arc<TokenBuffer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now();

        let permit = match slots.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!(task_id = %id, "Generation slots closed");
                buffer.fail("generation queue closed");
                return;
            }
        };
        if buffer.is_cancel_requested() {
            tracing::debug!(task_id = %id, "Skipping generation cancelled while queued");
            return;
        }
        tracing::debug!(task_id = %id, queued = ?start.elapsed(), "Generation started");

        let callback = Arc::clone(&buffer);

        let result = tokio::task::spawn_blocking(move || {
            let callbacks: [&dyn TokenCallback; 1] = [callback.as_ref()];
            generator.generate(&prompt, &callbacks)
        })
        .await;
        drop(permit);

        match result {
            Ok(Ok(())) => buffer.complete(),
            Ok(Err(e)) => {
                tracing::error!(task_id = %id, "Generation failed: {:#}", e);
                buffer.fail(format!("{:#}", e));
            }
            Err(e) => {
                tracing::error!(task_id = %id, "Generation worker died: {}", e);
                let message = if e.is_panic() {
                    "generation panicked"
                } else {
                    "generation aborted"
                };
                buffer.fail(message);
            }
        }

        let tokens = buffer.total_tokens();
        match buffer.status() {
            TaskStatus::Cancelled => {
                tracing::warn!(task_id = %id, tokens, "Generation cancelled after {:?}", start.elapsed());
            }
            status => {
                tracing::info!(task_id = %id, tokens, ?status, "Generation finished in {:?}", start.elapsed());
            }
        }
    })
}
