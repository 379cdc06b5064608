//! Per-task token buffer
//!
//! The buffer sits between the generator callback (producer, on a blocking
//! thread) and the SSE stream (consumer, async). All mutation happens under one
//! mutex so a drain never loses or repeats a token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;

use crate::engine::TokenCallback;

/// Lifecycle of a generation task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl TaskStatus {
    /// True once no more tokens will be appended
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            TaskStatus::Running => StatusKind::Running,
            TaskStatus::Completed => StatusKind::Completed,
            TaskStatus::Failed(_) => StatusKind::Failed,
            TaskStatus::Cancelled => StatusKind::Cancelled,
        }
    }
}

/// Status without the failure payload, as reported over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Result of a drain: the tokens buffered since the last drain plus the
/// status at the moment they were taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    pub tokens: Vec<String>,
    pub status: TaskStatus,
}

#[derive(Debug)]
struct BufferState {
    pending: Vec<String>,
    total: usize,
    status: TaskStatus,
}

/// Append-only token sequence with an atomic drain
#[derive(Debug)]
pub struct TokenBuffer {
    state: Mutex<BufferState>,
    notify: Notify,
    cancel_requested: AtomicBool,
}

impl Default for TokenBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                pending: Vec::new(),
                total: 0,
                status: TaskStatus::Running,
            }),
            notify: Notify::new(),
            cancel_requested: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // A panicking producer must not take the stream down with it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a token. Ignored once the task reached a terminal status.
    pub fn push(&self, token: &str) {
        {
            let mut state = self.lock();
            if state.status.is_terminal() {
                return;
            }
            state.pending.push(token.to_string());
            state.total += 1;
        }
        self.notify.notify_waiters();
    }

    /// Take every buffered token, leaving the buffer empty
    pub fn drain(&self) -> Drained {
        let mut state = self.lock();
        Drained {
            tokens: std::mem::take(&mut state.pending),
            status: state.status.clone(),
        }
    }

    /// Wait until there is something to report, then drain.
    ///
    /// Returns as soon as tokens are buffered or the status is terminal. The
    /// producer wakes the waiter directly; `poll_interval` bounds each wait so
    /// a stream never sleeps longer than that between drains.
    pub async fn next_batch(&self, poll_interval: Duration) -> Drained {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before draining so a push between the drain and the
            // await still wakes us.
            notified.as_mut().enable();

            let drained = self.drain();
            if !drained.tokens.is_empty() || drained.status.is_terminal() {
                return drained;
            }

            let _ = tokio::time::timeout(poll_interval, notified).await;
        }
    }

    /// Mark generation as finished successfully
    pub fn complete(&self) {
        self.finish(TaskStatus::Completed);
    }

    /// Mark generation as failed
    pub fn fail(&self, message: impl Into<String>) {
        self.finish(TaskStatus::Failed(message.into()));
    }

    /// Ask the generator to stop and mark the task cancelled
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.finish(TaskStatus::Cancelled);
    }

    /// Set a terminal status. The first terminal status wins.
    fn finish(&self, status: TaskStatus) {
        {
            let mut state = self.lock();
            if state.status.is_terminal() {
                return;
            }
            state.status = status;
        }
        self.notify.notify_waiters();
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status.clone()
    }

    /// Tokens appended over the buffer's lifetime
    pub fn total_tokens(&self) -> usize {
        self.lock().total
    }

    /// Tokens appended but not yet drained
    pub fn pending_tokens(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }
}

impl TokenCallback for TokenBuffer {
    fn on_new_token(&self, token: &str) {
        self.push(token);
    }

    fn is_cancelled(&self) -> bool {
        self.is_cancel_requested()
    }
}
