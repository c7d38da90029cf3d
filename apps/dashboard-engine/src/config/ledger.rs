//! Idempotency ledger configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::persistence;

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Retention of terminal entries after completion, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Cap on total entries; `null` for no cap.
    #[serde(default = "default_max_entries")]
    pub max_entries: Option<usize>,
    /// Number of lock shards.
    #[serde(default = "default_shards")]
    pub shards: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            max_entries: default_max_entries(),
            shards: default_shards(),
        }
    }
}

impl LedgerConfig {
    /// Store settings.
    #[must_use]
    pub const fn store_config(&self) -> persistence::LedgerConfig {
        persistence::LedgerConfig {
            retention: Duration::from_secs(self.retention_secs),
            max_entries: self.max_entries,
            shards: self.shards,
        }
    }
}

const fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_entries() -> Option<usize> {
    Some(100_000)
}

const fn default_shards() -> usize {
    16
}
