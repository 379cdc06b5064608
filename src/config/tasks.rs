//! Task lifecycle settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controls how streams wait for tokens and when tasks are evicted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Upper bound on how long a stream waits before draining again
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Finished tasks are evicted this long after finishing
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Any task is cancelled and evicted this long after creation
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// How often the sweeper runs
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Evict a task once its stream delivered the final frame
    #[serde(default = "default_true")]
    pub evict_on_complete: bool,

    /// Cancel generation when the stream client goes away early
    #[serde(default = "default_true")]
    pub cancel_on_disconnect: bool,

    /// Generations allowed to run at once; the rest wait their turn
    #[serde(default = "default_max_concurrent_generations")]
    pub max_concurrent_generations: usize,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_max_concurrent_generations() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            ttl_secs: default_ttl_secs(),
            max_age_secs: default_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            evict_on_complete: true,
            cancel_on_disconnect: true,
            max_concurrent_generations: default_max_concurrent_generations(),
        }
    }
}

impl TaskConfig {
    /// Never zero, so an idle stream cannot spin on drain
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn generation_slots(&self) -> usize {
        self.max_concurrent_generations.max(1)
    }
}
