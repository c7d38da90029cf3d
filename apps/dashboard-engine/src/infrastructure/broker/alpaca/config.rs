//! Alpaca adapter configuration.

use std::time::Duration;

use crate::application::retry::RetryPolicy;
use crate::domain::execution::Venue;

const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const LIVE_TRADING_URL: &str = "https://api.alpaca.markets";
const DATA_URL: &str = "https://data.alpaca.markets";

/// Configuration for the Alpaca broker adapter.
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
    /// Endpoint the adapter is bound to.
    pub venue: Venue,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Retry policy for read requests.
    pub retry: RetryPolicy,
    /// Market data feed (`iex` or `sip`).
    pub data_feed: String,
    /// Trading API override (tests, proxies).
    pub trading_url_override: Option<String>,
    /// Data API override (tests, proxies).
    pub data_url_override: Option<String>,
}

impl AlpacaConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>, venue: Venue) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            venue,
            timeout: Duration::from_secs(30),
            retry: DEFAULT_READ_RETRY,
            data_feed: "iex".to_string(),
            trading_url_override: None,
            data_url_override: None,
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Point both APIs at `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.trading_url_override = Some(base_url.clone());
        self.data_url_override = Some(base_url);
        self
    }

    /// Trading API base URL.
    #[must_use]
    pub fn trading_base_url(&self) -> &str {
        self.trading_url_override
            .as_deref()
            .unwrap_or(match self.venue {
                Venue::Paper => PAPER_TRADING_URL,
                Venue::Live => LIVE_TRADING_URL,
            })
    }

    /// Market data API base URL.
    #[must_use]
    pub fn data_base_url(&self) -> &str {
        self.data_url_override.as_deref().unwrap_or(DATA_URL)
    }
}

/// Read retry policy: three attempts in total.
pub const DEFAULT_READ_RETRY: RetryPolicy = RetryPolicy {
    max_retries: 2,
    initial_backoff: Duration::from_millis(100),
    max_backoff: Duration::from_secs(10),
    backoff_multiplier: 2.0,
    jitter_factor: 0.2,
};
