//! Background job configuration.

use std::time::Duration;

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::application::services::{JobSchedule, RetryPolicy};
use crate::domain::shared::Symbol;

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run background jobs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Symbols whose quotes are refreshed even when not held.
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<String>,
    /// Quote refresh interval, in seconds.
    #[serde(default = "default_quote_refresh_secs")]
    pub quote_refresh_secs: u64,
    /// Account and positions refresh interval, in seconds.
    #[serde(default = "default_account_refresh_secs")]
    pub account_refresh_secs: u64,
    /// Ledger eviction interval, in seconds.
    #[serde(default = "default_ledger_sweep_secs")]
    pub ledger_sweep_secs: u64,
    /// End-of-day account summary.
    #[serde(default)]
    pub daily_summary: DailySummaryConfig,
    /// Retry policy for transient job failures.
    #[serde(default)]
    pub retry: JobRetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watchlist: default_watchlist(),
            quote_refresh_secs: default_quote_refresh_secs(),
            account_refresh_secs: default_account_refresh_secs(),
            ledger_sweep_secs: default_ledger_sweep_secs(),
            daily_summary: DailySummaryConfig::default(),
            retry: JobRetryConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parsed watchlist symbols.
    #[must_use]
    pub fn watchlist_symbols(&self) -> Vec<Symbol> {
        self.watchlist.iter().map(Symbol::new).collect()
    }

    /// Retry policy shared by the refresh jobs.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Daily account summary job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummaryConfig {
    /// Run the job.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local time of day, `HH:MM`.
    #[serde(default = "default_summary_time")]
    pub time: String,
    /// UTC offset the time is expressed in, e.g. `-05:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// How often wall-clock time is checked, in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for DailySummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time: default_summary_time(),
            utc_offset: default_utc_offset(),
            tick_secs: default_tick_secs(),
        }
    }
}

impl DailySummaryConfig {
    /// Parse into a daily schedule.
    pub fn schedule(&self) -> Result<JobSchedule, ConfigError> {
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M").map_err(|e| {
            ConfigError::ValidationError(format!(
                "scheduler.daily_summary.time '{}' is not HH:MM: {e}",
                self.time
            ))
        })?;
        let utc_offset = self.utc_offset.parse::<FixedOffset>().map_err(|e| {
            ConfigError::ValidationError(format!(
                "scheduler.daily_summary.utc_offset '{}' is not an offset like -05:00: {e}",
                self.utc_offset
            ))
        })?;

        Ok(JobSchedule::DailyAt {
            time,
            utc_offset,
            tick: Duration::from_secs(self.tick_secs),
        })
    }
}

/// Retry settings for jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Cap on any retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for JobRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_watchlist() -> Vec<String> {
    vec!["SPY".to_string()]
}

const fn default_quote_refresh_secs() -> u64 {
    5
}

const fn default_account_refresh_secs() -> u64 {
    15
}

const fn default_ledger_sweep_secs() -> u64 {
    300
}

fn default_summary_time() -> String {
    "16:05".to_string()
}

fn default_utc_offset() -> String {
    "-05:00".to_string()
}

const fn default_tick_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    200
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}
