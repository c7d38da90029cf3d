//! Process-wide trading mode and order venues.

use serde::{Deserialize, Serialize};

/// Trading mode (PAPER or LIVE).
///
/// Read once at startup and handed to the dispatcher by value. Changing it
/// requires a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    /// Simulated trading only. No order may reach a live endpoint.
    #[default]
    #[serde(alias = "paper")]
    Paper,
    /// Real orders with real money.
    #[serde(alias = "live")]
    Live,
}

impl TradingMode {
    /// Returns true if this is live trading.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns true if this is paper trading.
    #[must_use]
    pub const fn is_paper(&self) -> bool {
        matches!(self, Self::Paper)
    }

    /// Whether orders may be routed to `venue` under this mode.
    #[must_use]
    pub const fn permits(&self, venue: Venue) -> bool {
        match self {
            Self::Live => true,
            Self::Paper => matches!(venue, Venue::Paper),
        }
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

impl std::str::FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PAPER" => Ok(Self::Paper),
            "LIVE" => Ok(Self::Live),
            _ => Err(format!("Invalid trading mode: {s}. Must be PAPER or LIVE.")),
        }
    }
}

/// Endpoint an order is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Venue {
    /// Paper/simulated endpoint.
    #[default]
    #[serde(alias = "paper")]
    Paper,
    /// Live endpoint.
    #[serde(alias = "live")]
    Live,
}

impl Venue {
    /// Returns true for the live endpoint.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}
