//! Execution dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::use_cases::DispatcherConfig;

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on one adapter order call, in milliseconds.
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,
    /// Skip the remaining orders of a batch after the first failure.
    #[serde(default)]
    pub stop_on_first_failure: bool,
    /// Execution workers allowed to call the broker at once.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: default_adapter_timeout_ms(),
            stop_on_first_failure: false,
            max_concurrent_executions: default_max_concurrent_executions(),
        }
    }
}

impl DispatchConfig {
    /// Dispatcher settings.
    #[must_use]
    pub const fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            adapter_timeout: Duration::from_millis(self.adapter_timeout_ms),
            stop_on_first_failure: self.stop_on_first_failure,
            max_concurrent_executions: self.max_concurrent_executions,
        }
    }
}

const fn default_adapter_timeout_ms() -> u64 {
    10_000
}

const fn default_max_concurrent_executions() -> usize {
    16
}
