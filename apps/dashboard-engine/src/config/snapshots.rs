//! Snapshot cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::SnapshotConfig;

/// Snapshot cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotsConfig {
    /// Cached snapshots younger than this are served without a fetch, in milliseconds.
    #[serde(default = "default_max_staleness_ms")]
    pub max_staleness_ms: u64,
    /// Upper bound on one broker read, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            max_staleness_ms: default_max_staleness_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl SnapshotsConfig {
    /// Service settings.
    #[must_use]
    pub const fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            max_staleness: Duration::from_millis(self.max_staleness_ms),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }
}

const fn default_max_staleness_ms() -> u64 {
    5_000
}

const fn default_fetch_timeout_ms() -> u64 {
    10_000
}
