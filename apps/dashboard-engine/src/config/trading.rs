//! Trading mode configuration.

use serde::{Deserialize, Serialize};

use crate::domain::execution::TradingMode;

/// Trading configuration. Read once at startup; changing it needs a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingConfig {
    /// `PAPER` (default) or `LIVE`.
    #[serde(default)]
    pub mode: TradingMode,
}
