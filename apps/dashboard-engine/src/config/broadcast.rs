//! State broadcaster configuration.

use serde::{Deserialize, Serialize};

use crate::infrastructure::broadcast::DEFAULT_QUEUE_CAPACITY;

/// Broadcaster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Per-topic channel capacity, rounded up to a power of two. A subscriber
    /// that falls further behind loses the oldest envelopes.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
