//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format. Trading API
//! numerics arrive as strings; market data numerics arrive as numbers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::error::AlpacaError;
use crate::application::ports::{AckStatus, OrderAck, SubmitOrderRequest};
use crate::domain::market::{Account, Position, PositionSide, Quote};
use crate::domain::shared::{BrokerOrderId, Symbol, Timestamp};

// ============================================================================
// Order Types
// ============================================================================

/// Order request for Alpaca API.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Stock symbol.
    pub symbol: String,
    /// Quantity (shares).
    pub qty: String,
    /// Order side.
    pub side: &'static str,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: &'static str,
    /// Time in force.
    pub time_in_force: &'static str,
    /// Limit price (for limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Stop price (for stop orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    /// Client order ID.
    pub client_order_id: String,
}

impl From<&SubmitOrderRequest> for AlpacaOrderRequest {
    fn from(request: &SubmitOrderRequest) -> Self {
        Self {
            symbol: request.symbol.as_str().to_string(),
            qty: request.quantity.normalize().to_string(),
            side: request.side.as_str(),
            order_type: request.order_type.as_str(),
            time_in_force: request.time_in_force.as_str(),
            limit_price: request.limit_price.map(|p| p.normalize().to_string()),
            stop_price: request.stop_price.map(|p| p.normalize().to_string()),
            client_order_id: request.client_order_id.clone(),
        }
    }
}

/// Order response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Client order ID.
    pub client_order_id: String,
    /// Symbol.
    pub symbol: String,
    /// Filled quantity (as string).
    #[serde(default)]
    pub filled_qty: Option<String>,
    /// Average fill price (as string).
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Order status.
    pub status: String,
}

impl AlpacaOrderResponse {
    /// Convert to `OrderAck`.
    #[must_use]
    pub fn to_order_ack(&self) -> OrderAck {
        OrderAck {
            broker_order_id: BrokerOrderId::new(&self.id),
            client_order_id: self.client_order_id.clone(),
            status: parse_order_status(&self.status),
            filled_qty: self
                .filled_qty
                .as_deref()
                .and_then(|q| q.parse().ok())
                .unwrap_or(Decimal::ZERO),
            avg_fill_price: self.filled_avg_price.as_deref().and_then(|p| p.parse().ok()),
        }
    }
}

// ============================================================================
// Account Types
// ============================================================================

/// Account response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Account ID.
    pub id: String,
    /// Account status.
    pub status: String,
    /// Currency.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Account equity.
    pub equity: String,
    /// Cash balance.
    pub cash: String,
    /// Buying power.
    pub buying_power: String,
    /// Portfolio value.
    #[serde(default)]
    pub portfolio_value: Option<String>,
    /// Day trade count.
    #[serde(default)]
    pub daytrade_count: Option<u32>,
    /// Pattern day trader flag.
    #[serde(default)]
    pub pattern_day_trader: Option<bool>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl TryFrom<AlpacaAccountResponse> for Account {
    type Error = AlpacaError;

    fn try_from(r: AlpacaAccountResponse) -> Result<Self, Self::Error> {
        let equity = parse_decimal("equity", &r.equity)?;
        let portfolio_value = match r.portfolio_value.as_deref() {
            Some(value) => parse_decimal("portfolio_value", value)?,
            None => equity,
        };

        Ok(Self {
            account_id: r.id,
            status: r.status,
            currency: r.currency,
            equity,
            cash: parse_decimal("cash", &r.cash)?,
            buying_power: parse_decimal("buying_power", &r.buying_power)?,
            portfolio_value,
            daytrade_count: r.daytrade_count.unwrap_or(0),
            pattern_day_trader: r.pattern_day_trader.unwrap_or(false),
        })
    }
}

// ============================================================================
// Position Types
// ============================================================================

/// Position response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// Side (long/short).
    pub side: String,
    /// Average entry price.
    pub avg_entry_price: String,
    /// Market value.
    pub market_value: String,
    /// Current price.
    pub current_price: String,
    /// Unrealized P&L.
    pub unrealized_pl: String,
}

impl TryFrom<AlpacaPositionResponse> for Position {
    type Error = AlpacaError;

    fn try_from(r: AlpacaPositionResponse) -> Result<Self, Self::Error> {
        let side = match r.side.as_str() {
            "short" => PositionSide::Short,
            _ => PositionSide::Long,
        };

        Ok(Self {
            symbol: Symbol::new(r.symbol),
            quantity: parse_decimal("qty", &r.qty)?.abs(),
            side,
            avg_entry_price: parse_decimal("avg_entry_price", &r.avg_entry_price)?,
            market_value: parse_decimal("market_value", &r.market_value)?,
            current_price: parse_decimal("current_price", &r.current_price)?,
            unrealized_pl: parse_decimal("unrealized_pl", &r.unrealized_pl)?,
        })
    }
}

// ============================================================================
// Market Data Types
// ============================================================================

/// Response from `/v2/stocks/quotes/latest`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaLatestQuotesResponse {
    /// Quotes keyed by symbol. Unknown symbols are absent.
    #[serde(default)]
    pub quotes: HashMap<String, AlpacaQuote>,
}

/// One latest quote.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaQuote {
    /// Ask price.
    #[serde(rename = "ap")]
    pub ask_price: f64,
    /// Ask size.
    #[serde(rename = "as")]
    pub ask_size: f64,
    /// Bid price.
    #[serde(rename = "bp")]
    pub bid_price: f64,
    /// Bid size.
    #[serde(rename = "bs")]
    pub bid_size: f64,
    /// Quote time.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
}

impl AlpacaQuote {
    /// Convert to a domain quote.
    pub fn to_quote(&self, symbol: Symbol) -> Result<Quote, AlpacaError> {
        Ok(Quote {
            symbol,
            bid: from_number("bp", self.bid_price)?,
            ask: from_number("ap", self.ask_price)?,
            bid_size: from_number("bs", self.bid_size)?,
            ask_size: from_number("as", self.ask_size)?,
            quoted_at: Timestamp::new(self.timestamp),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Error code. Numeric on most endpoints.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message.
    pub message: String,
}

impl AlpacaErrorResponse {
    /// Error code as text.
    #[must_use]
    pub fn code_string(&self) -> Option<String> {
        self.code.as_ref().map(|code| match code {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, AlpacaError> {
    value
        .parse()
        .map_err(|e| AlpacaError::JsonParse(format!("{field}: {value:?} is not a decimal ({e})")))
}

fn from_number(field: &str, value: f64) -> Result<Decimal, AlpacaError> {
    Decimal::from_f64(value)
        .map(|d| d.normalize())
        .ok_or_else(|| AlpacaError::JsonParse(format!("{field}: {value} is not a finite number")))
}

/// Map an Alpaca order status to the acknowledgment status.
fn parse_order_status(status: &str) -> AckStatus {
    match status.to_lowercase().as_str() {
        "partially_filled" => AckStatus::PartiallyFilled,
        "filled" => AckStatus::Filled,
        "canceled" | "pending_cancel" | "expired" | "done_for_day" => AckStatus::Canceled,
        "rejected" => AckStatus::Rejected,
        // new, pending_new, accepted, accepted_for_bidding, replaced, ...
        _ => AckStatus::Accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::{OrderSide, OrderSpec};
    use crate::domain::shared::RequestId;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case("new", AckStatus::Accepted ; "new")]
    #[test_case("accepted", AckStatus::Accepted ; "accepted")]
    #[test_case("partially_filled", AckStatus::PartiallyFilled ; "partial")]
    #[test_case("filled", AckStatus::Filled ; "filled")]
    #[test_case("expired", AckStatus::Canceled ; "expired")]
    #[test_case("REJECTED", AckStatus::Rejected ; "rejected uppercase")]
    fn order_status_mapping(raw: &str, expected: AckStatus) {
        assert_eq!(parse_order_status(raw), expected);
    }

    #[test]
    fn order_request_serializes_in_alpaca_shape() {
        let spec = OrderSpec::limit("AAPL", OrderSide::Buy, dec!(10), dec!(190.50));
        let request = SubmitOrderRequest::from_spec(&RequestId::new("r1"), 0, &spec);
        let json = serde_json::to_value(AlpacaOrderRequest::from(&request)).unwrap();

        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["qty"], "10");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["type"], "limit");
        assert_eq!(json["time_in_force"], "day");
        assert_eq!(json["limit_price"], "190.5");
        assert_eq!(json["client_order_id"], "r1-0");
        assert!(json.get("stop_price").is_none());
    }

    #[test]
    fn order_response_to_ack() {
        let response: AlpacaOrderResponse = serde_json::from_value(serde_json::json!({
            "id": "broker-123",
            "client_order_id": "r1-0",
            "symbol": "AAPL",
            "filled_qty": "50",
            "filled_avg_price": "150.25",
            "status": "partially_filled"
        }))
        .unwrap();

        let ack = response.to_order_ack();
        assert_eq!(ack.broker_order_id.as_str(), "broker-123");
        assert_eq!(ack.client_order_id, "r1-0");
        assert_eq!(ack.status, AckStatus::PartiallyFilled);
        assert_eq!(ack.filled_qty, dec!(50));
        assert_eq!(ack.avg_fill_price, Some(dec!(150.25)));
    }

    #[test]
    fn account_with_bad_number_is_a_parse_error() {
        let response = AlpacaAccountResponse {
            id: "a".to_string(),
            status: "ACTIVE".to_string(),
            currency: "USD".to_string(),
            equity: "abc".to_string(),
            cash: "1".to_string(),
            buying_power: "1".to_string(),
            portfolio_value: None,
            daytrade_count: None,
            pattern_day_trader: None,
        };
        assert!(matches!(
            Account::try_from(response),
            Err(AlpacaError::JsonParse(_))
        ));
    }

    #[test]
    fn short_position_quantity_is_absolute() {
        let position = Position::try_from(AlpacaPositionResponse {
            symbol: "TSLA".to_string(),
            qty: "-5".to_string(),
            side: "short".to_string(),
            avg_entry_price: "200".to_string(),
            market_value: "-1000".to_string(),
            current_price: "200".to_string(),
            unrealized_pl: "0".to_string(),
        })
        .unwrap();

        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.quantity, dec!(5));
    }

    #[test]
    fn quote_prices_are_normalized_decimals() {
        let quote: AlpacaQuote = serde_json::from_value(serde_json::json!({
            "ap": 190.5, "as": 3.0, "bp": 190.25, "bs": 1.0, "t": "2024-01-02T15:30:00Z"
        }))
        .unwrap();

        let quote = quote.to_quote(Symbol::new("AAPL")).unwrap();
        assert_eq!(quote.ask, dec!(190.5));
        assert_eq!(quote.bid, dec!(190.25));
        assert_eq!(quote.ask_size.to_string(), "3");
    }

    #[test]
    fn non_finite_quote_price_is_a_parse_error() {
        assert!(matches!(
            from_number("ap", f64::NAN),
            Err(AlpacaError::JsonParse(_))
        ));
    }

    #[test]
    fn numeric_error_code_is_stringified() {
        let err: AlpacaErrorResponse =
            serde_json::from_str(r#"{"code": 40310000, "message": "insufficient buying power"}"#).unwrap();
        assert_eq!(err.code_string().as_deref(), Some("40310000"));
    }
}
