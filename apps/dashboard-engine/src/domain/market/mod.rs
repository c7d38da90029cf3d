//! Market Bounded Context
//!
//! Point-in-time copies of remote account, position and quote state. A new
//! fetch produces a new [`Snapshot`]; published snapshots are never mutated,
//! so they are shared by `Arc` without locking.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{Symbol, Timestamp};

/// Immutable, timestamped copy of externally sourced state.
///
/// Consumers must not assume freshness beyond `fetched_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    /// The data as returned by the venue.
    pub data: T,
    /// When the fetch started. The data is at least this fresh.
    pub fetched_at: Timestamp,
}

impl<T> Snapshot<T> {
    /// Stamp `data` with the current time.
    #[must_use]
    pub fn now(data: T) -> Self {
        Self::at(data, Timestamp::now())
    }

    /// Stamp `data` with the time its fetch started.
    #[must_use]
    pub const fn at(data: T, fetched_at: Timestamp) -> Self {
        Self { data, fetched_at }
    }

    /// Whether this snapshot may replace `current`. Only an older snapshot
    /// is ever replaced.
    #[must_use]
    pub fn supersedes(&self, current: Option<&Self>) -> bool {
        current.is_none_or(|c| c.fetched_at <= self.fetched_at)
    }

    /// Whether the snapshot is no older than `max_staleness` at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: Timestamp, max_staleness: Duration) -> bool {
        self.fetched_at.age_at(now) <= max_staleness
    }
}

/// Account snapshot.
pub type AccountSnapshot = Snapshot<Account>;
/// Positions snapshot (the full position list).
pub type PositionSnapshot = Snapshot<Vec<Position>>;
/// Quote snapshot for a single symbol.
pub type QuoteSnapshot = Snapshot<Quote>;

/// Brokerage account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Venue account ID.
    pub account_id: String,
    /// Account status (e.g. "ACTIVE").
    pub status: String,
    /// Account currency.
    pub currency: String,
    /// Total equity.
    pub equity: Decimal,
    /// Cash balance.
    pub cash: Decimal,
    /// Buying power.
    pub buying_power: Decimal,
    /// Portfolio value.
    pub portfolio_value: Decimal,
    /// Day trades in the rolling window.
    pub daytrade_count: u32,
    /// Pattern day trader flag.
    pub pattern_day_trader: bool,
}

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Long.
    Long,
    /// Short.
    Short,
}

/// An open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Symbol.
    pub symbol: Symbol,
    /// Quantity held (absolute).
    #[serde(rename = "qty")]
    pub quantity: Decimal,
    /// Long or short.
    pub side: PositionSide,
    /// Average entry price.
    pub avg_entry_price: Decimal,
    /// Current market value.
    pub market_value: Decimal,
    /// Last price.
    pub current_price: Decimal,
    /// Unrealized profit and loss.
    pub unrealized_pl: Decimal,
}

/// Top-of-book quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Symbol.
    pub symbol: Symbol,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Bid size.
    pub bid_size: Decimal,
    /// Ask size.
    pub ask_size: Decimal,
    /// Venue quote time.
    pub quoted_at: Timestamp,
}

impl Quote {
    /// Midpoint of bid and ask.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}
