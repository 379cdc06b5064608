//! SSE relay from a task's token buffer

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;

use crate::config::TaskConfig;
use crate::tasks::{TaskId, TaskRegistry, TaskStatus, TokenBuffer};

/// Marker sent as the data of the final frame of a completed task
pub const DONE_MARKER: &str = "[DONE]";

/// Marker sent as the data of the final frame of a cancelled task
pub const CANCELLED_MARKER: &str = "[CANCELLED]";

/// SSE data lines may not contain carriage returns
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// One `data:` frame per token
pub fn token_event(token: &str) -> Event {
    Event::default().data(normalize(token))
}

/// Final frame for a terminal status, `None` while the task is running
pub fn terminal_event(status: &TaskStatus) -> Option<Event> {
    match status {
        TaskStatus::Running => None,
        TaskStatus::Completed => Some(Event::default().event("done").data(DONE_MARKER)),
        TaskStatus::Failed(message) => Some(Event::default().event("error").data(normalize(message))),
        TaskStatus::Cancelled => Some(Event::default().event("cancelled").data(CANCELLED_MARKER)),
    }
}

/// Cancels generation if the stream is dropped before the final frame
struct DisconnectGuard {
    id: TaskId,
    buffer: Option<Arc<TokenBuffer>>,
}

impl DisconnectGuard {
    fn new(id: TaskId, buffer: &Arc<TokenBuffer>, enabled: bool) -> Self {
        Self {
            id,
            buffer: enabled.then(|| Arc::clone(buffer)),
        }
    }

    fn disarm(&mut self) {
        self.buffer = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if !buffer.status().is_terminal() {
                tracing::warn!(task_id = %self.id, "Stream client disconnected; cancelling generation");
                buffer.cancel();
            }
        }
    }
}

/// Relay a task's tokens as server-sent events.
///
/// Emits `data: <token>` per token in generation order, then one terminal
/// frame (`done`, `error` or `cancelled`) and closes. The registry entry is
/// evicted when the terminal status is reached if `evict_on_complete` is set.
pub fn create_task_stream(
    registry: Arc<TaskRegistry>,
    id: TaskId,
    buffer: Arc<TokenBuffer>,
    tasks: &TaskConfig,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let poll_interval = tasks.poll_interval();
    let evict_on_complete = tasks.evict_on_complete;
    // Armed before the body is first polled, so dropping an unread response
    // still cancels generation.
    let mut guard = DisconnectGuard::new(id, &buffer, tasks.cancel_on_disconnect);

    let stream = async_stream::stream! {
        let mut relayed = 0usize;

        loop {
            let batch = buffer.next_batch(poll_interval).await;

            relayed += batch.tokens.len();
            for token in &batch.tokens {
                yield Ok(token_event(token));
            }

            if let Some(event) = terminal_event(&batch.status) {
                guard.disarm();
                if evict_on_complete {
                    registry.remove(&id).await;
                }
                tracing::debug!(task_id = %id, relayed, status = ?batch.status, "Stream finished");
                yield Ok(event);
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
