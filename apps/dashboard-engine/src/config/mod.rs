//! Configuration module for the dashboard engine.
//!
//! Loads `config.yaml` (or the file named by `DASHBOARD_CONFIG`), expands
//! environment variables, and validates the result before anything starts.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dashboard_engine::config::{load_config, config_path};
//!
//! let config = load_config(Some(&config_path()))?;
//! println!("HTTP port: {}", config.server.http_port);
//! ```

mod broadcast;
mod broker;
mod dispatch;
mod ledger;
mod observability;
mod scheduler;
mod server;
mod snapshots;
mod trading;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::execution::Venue;

pub use broadcast::BroadcastConfig;
pub use broker::{AlpacaConfig, BrokerConfig, BrokerProvider, SimulatedConfig};
pub use dispatch::DispatchConfig;
pub use ledger::LedgerConfig;
pub use observability::{LoggingConfig, ObservabilityConfig};
pub use scheduler::{DailySummaryConfig, JobRetryConfig, SchedulerConfig};
pub use server::ServerConfig;
pub use snapshots::SnapshotsConfig;
pub use trading::TradingConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "DASHBOARD_CONFIG";

/// Config file used when `DASHBOARD_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,
    /// Trading mode.
    #[serde(default)]
    pub trading: TradingConfig,
    /// Broker adapter.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Execution dispatcher.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Idempotency ledger.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Background jobs.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// State broadcaster.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Snapshot cache.
    #[serde(default)]
    pub snapshots: SnapshotsConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Config file path: `DASHBOARD_CONFIG` if set, else `config.yaml`.
#[must_use]
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: &str| Err(ConfigError::ValidationError(message.to_string()));

    // Paper mode must never be wired to a live endpoint.
    if config.trading.mode.is_paper() && config.broker.venue == Venue::Live {
        return invalid("trading.mode PAPER cannot use broker.venue LIVE");
    }

    if config.broker.provider == BrokerProvider::Alpaca
        && (config.broker.alpaca.api_key.trim().is_empty()
            || config.broker.alpaca.api_secret.trim().is_empty())
    {
        return invalid("broker.alpaca.api_key and api_secret are required for the alpaca provider");
    }

    if config.broker.alpaca.max_attempts == 0 {
        return invalid("broker.alpaca.max_attempts must be at least 1");
    }

    if config.dispatch.adapter_timeout_ms == 0 {
        return invalid("dispatch.adapter_timeout_ms must be positive");
    }

    if config.dispatch.max_concurrent_executions == 0 {
        return invalid("dispatch.max_concurrent_executions must be positive");
    }

    if config.ledger.shards == 0 {
        return invalid("ledger.shards must be positive");
    }

    if config.ledger.max_entries == Some(0) {
        return invalid("ledger.max_entries must be positive when set");
    }

    if config.broadcast.queue_capacity == 0 {
        return invalid("broadcast.queue_capacity must be positive");
    }

    if config.snapshots.fetch_timeout_ms == 0 {
        return invalid("snapshots.fetch_timeout_ms must be positive");
    }

    let scheduler = &config.scheduler;
    if scheduler.quote_refresh_secs == 0
        || scheduler.account_refresh_secs == 0
        || scheduler.ledger_sweep_secs == 0
        || scheduler.daily_summary.tick_secs == 0
    {
        return invalid("scheduler intervals must be positive");
    }
    if scheduler.daily_summary.enabled {
        scheduler.daily_summary.schedule()?;
    }

    let valid_formats = ["json", "pretty"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    Ok(())
}
