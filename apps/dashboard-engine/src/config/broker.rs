//! Broker adapter configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::execution::Venue;
use crate::domain::shared::Symbol;
use crate::infrastructure::broker::SimulatedBrokerConfig;
use crate::infrastructure::broker::alpaca::{self, DEFAULT_READ_RETRY};

/// Which adapter backs the `BrokerPort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerProvider {
    /// In-process simulated venue.
    #[default]
    Simulated,
    /// Alpaca REST API.
    Alpaca,
}

/// Broker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Adapter to use.
    #[serde(default)]
    pub provider: BrokerProvider,
    /// Venue the adapter is bound to.
    #[serde(default)]
    pub venue: Venue,
    /// Alpaca settings.
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    /// Simulated venue settings.
    #[serde(default)]
    pub simulated: SimulatedConfig,
}

/// Alpaca broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    /// API key.
    #[serde(default)]
    pub api_key: String,
    /// API secret.
    #[serde(default)]
    pub api_secret: String,
    /// Market data feed (`iex` or `sip`).
    #[serde(default = "default_data_feed")]
    pub data_feed: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per read request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Override for both API base URLs.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            data_feed: default_data_feed(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_url: None,
        }
    }
}

/// Simulated venue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Opening cash balance.
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
    /// Artificial latency per call, in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
    /// First price for an unseen symbol.
    #[serde(default = "default_price")]
    pub default_price: Decimal,
    /// Maximum quote move per request, in basis points.
    #[serde(default = "default_volatility_bps")]
    pub volatility_bps: u32,
    /// Symbols whose orders are always rejected.
    #[serde(default)]
    pub reject_symbols: Vec<String>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            latency_ms: 0,
            default_price: default_price(),
            volatility_bps: default_volatility_bps(),
            reject_symbols: Vec::new(),
        }
    }
}

impl BrokerConfig {
    /// Alpaca adapter settings.
    #[must_use]
    pub fn alpaca_config(&self) -> alpaca::AlpacaConfig {
        let settings = &self.alpaca;
        let mut config = alpaca::AlpacaConfig::new(&settings.api_key, &settings.api_secret, self.venue)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_retry(DEFAULT_READ_RETRY.with_max_attempts(settings.max_attempts));
        config.data_feed.clone_from(&settings.data_feed);
        if let Some(base_url) = &settings.base_url {
            config = config.with_base_url(base_url);
        }
        config
    }

    /// Simulated venue settings.
    #[must_use]
    pub fn simulated_config(&self) -> SimulatedBrokerConfig {
        let settings = &self.simulated;
        SimulatedBrokerConfig {
            venue: self.venue,
            starting_cash: settings.starting_cash,
            latency: Duration::from_millis(settings.latency_ms),
            default_price: settings.default_price,
            volatility_bps: settings.volatility_bps,
            reject_symbols: settings.reject_symbols.iter().map(Symbol::new).collect(),
        }
    }
}

fn default_data_feed() -> String {
    "iex".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

fn default_starting_cash() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_price() -> Decimal {
    Decimal::new(100, 0)
}

const fn default_volatility_bps() -> u32 {
    5
}
