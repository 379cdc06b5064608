//! Task registry
//!
//! Maps task identifiers to their token buffers. Entries are removed once their
//! stream has been fully consumed, explicitly on request, or by the sweeper when
//! they outlive the configured TTL.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::buffer::TokenBuffer;

/// Opaque identifier correlating a generation request with its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Registry value for one task
#[derive(Debug)]
pub struct TaskEntry {
    pub buffer: Arc<TokenBuffer>,
    pub created_at: DateTime<Utc>,
    pub description_chars: usize,
    created: Instant,
}

impl TaskEntry {
    fn new(description_chars: usize) -> Self {
        Self {
            buffer: Arc::new(TokenBuffer::new()),
            created_at: Utc::now(),
            description_chars,
            created: Instant::now(),
        }
    }

    /// Time since the task was registered
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }
}

/// Point-in-time view of a task, for the status endpoint
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub status: super::TaskStatus,
    pub tokens_generated: usize,
    pub tokens_pending: usize,
    pub description_chars: usize,
    pub created_at: DateTime<Utc>,
}

/// Shared mapping from task identifier to task entry
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskEntry>>>,
    /// When each task reached a terminal status, as first seen by the sweeper
    finished: RwLock<HashMap<TaskId, Instant>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh task and return its identifier and buffer
    pub async fn create(&self, description_chars: usize) -> (TaskId, Arc<TokenBuffer>) {
        let entry = Arc::new(TaskEntry::new(description_chars));
        let buffer = Arc::clone(&entry.buffer);

        let mut tasks = self.tasks.write().await;
        let mut id = TaskId::new();
        while tasks.contains_key(&id) {
            id = TaskId::new();
        }
        tasks.insert(id, entry);

        (id, buffer)
    }

    pub async fn get(&self, id: &TaskId) -> Option<Arc<TaskEntry>> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Look up a task by its string form; malformed identifiers are unknown
    pub async fn lookup(&self, raw: &str) -> Option<(TaskId, Arc<TaskEntry>)> {
        let id = raw.parse::<TaskId>().ok()?;
        self.get(&id).await.map(|entry| (id, entry))
    }

    pub async fn snapshot(&self, id: &TaskId) -> Option<TaskSnapshot> {
        let entry = self.get(id).await?;
        Some(TaskSnapshot {
            id: *id,
            status: entry.buffer.status(),
            tokens_generated: entry.buffer.total_tokens(),
            tokens_pending: entry.buffer.pending_tokens(),
            description_chars: entry.description_chars,
            created_at: entry.created_at,
        })
    }

    /// Remove a task. Returns the entry if it was present.
    pub async fn remove(&self, id: &TaskId) -> Option<Arc<TaskEntry>> {
        let entry = self.tasks.write().await.remove(id);
        self.finished.write().await.remove(id);
        entry
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Evict stale tasks.
    ///
    /// Finished tasks go once they have been finished for `ttl`; any task older
    /// than `max_age` is cancelled and removed. Returns how many were evicted.
    pub async fn sweep(&self, ttl: Duration, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut tasks = self.tasks.write().await;
        let mut finished = self.finished.write().await;

        let mut expired = Vec::new();
        for (id, entry) in tasks.iter() {
            if entry.age() >= max_age {
                expired.push(*id);
                continue;
            }
            if entry.buffer.status().is_terminal() {
                let since = *finished.entry(*id).or_insert(now);
                if now.duration_since(since) >= ttl {
                    expired.push(*id);
                }
            }
        }

        for id in &expired {
            if let Some(entry) = tasks.remove(id) {
                entry.buffer.cancel();
            }
            finished.remove(id);
        }

        // Drop bookkeeping for tasks removed through other paths.
        finished.retain(|id, _| tasks.contains_key(id));

        expired.len()
    }

    /// Run `sweep` periodically until the registry is dropped
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
        max_age: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.sweep(ttl, max_age).await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    tracing::info!(evicted, remaining, "Evicted stale tasks");
                }
            }
        })
    }
}
