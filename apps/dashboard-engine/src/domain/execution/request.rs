//! Execution requests and order specifications.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::outcome::client_order_id;
use super::trading_mode::Venue;
use crate::domain::shared::{DomainError, RequestId, Symbol};

/// Longest client order ID venues accept.
pub const MAX_CLIENT_ORDER_ID_LEN: usize = 48;

/// Longest accepted request ID, leaving room for the `-{index}` suffix of
/// the client order IDs derived from it.
pub const MAX_REQUEST_ID_LEN: usize = 40;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl OrderSide {
    /// Venue wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop order.
    Stop,
    /// Stop-limit order.
    StopLimit,
}

impl OrderType {
    /// Venue wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
        }
    }

    const fn requires_limit_price(self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    const fn requires_stop_price(self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Valid for the trading day.
    #[default]
    Day,
    /// Good till canceled.
    Gtc,
    /// Immediate or cancel.
    Ioc,
    /// Fill or kill.
    Fok,
}

impl TimeInForce {
    /// Venue wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Gtc => "gtc",
            Self::Ioc => "ioc",
            Self::Fok => "fok",
        }
    }
}

/// One order inside an execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Quantity (shares), strictly positive.
    pub quantity: Decimal,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price, required for limit and stop-limit orders.
    pub limit_price: Option<Decimal>,
    /// Stop price, required for stop and stop-limit orders.
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Explicit routing target. `None` routes to the adapter's own venue.
    pub venue: Option<Venue>,
}

impl OrderSpec {
    /// Market order with day time-in-force and default routing.
    #[must_use]
    pub fn market(symbol: impl Into<Symbol>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Day,
            venue: None,
        }
    }

    /// Limit order with day time-in-force and default routing.
    #[must_use]
    pub fn limit(
        symbol: impl Into<Symbol>,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Route to an explicit venue.
    #[must_use]
    pub const fn with_venue(mut self, venue: Venue) -> Self {
        self.venue = Some(venue);
        self
    }

    /// Validate a single order. `index` is used for the error field path.
    pub fn validate(&self, index: usize) -> Result<(), DomainError> {
        let field = |name: &str| format!("orders[{index}].{name}");

        self.symbol.validate().map_err(|e| match e {
            DomainError::InvalidValue { message, .. } => {
                DomainError::invalid(field("symbol"), message)
            }
            other => other,
        })?;

        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::invalid(
                field("qty"),
                "Quantity must be positive",
            ));
        }

        match self.limit_price {
            Some(price) if price <= Decimal::ZERO => {
                return Err(DomainError::invalid(
                    field("limitPrice"),
                    "Limit price must be positive",
                ));
            }
            None if self.order_type.requires_limit_price() => {
                return Err(DomainError::invalid(
                    field("limitPrice"),
                    format!("{} orders require a limit price", self.order_type.as_str()),
                ));
            }
            Some(_) if !self.order_type.requires_limit_price() => {
                return Err(DomainError::invalid(
                    field("limitPrice"),
                    format!(
                        "{} orders must not carry a limit price",
                        self.order_type.as_str()
                    ),
                ));
            }
            _ => {}
        }

        match self.stop_price {
            Some(price) if price <= Decimal::ZERO => Err(DomainError::invalid(
                field("stopPrice"),
                "Stop price must be positive",
            )),
            None if self.order_type.requires_stop_price() => Err(DomainError::invalid(
                field("stopPrice"),
                format!("{} orders require a stop price", self.order_type.as_str()),
            )),
            _ => Ok(()),
        }
    }
}

/// A client execution request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Idempotency key.
    pub request_id: RequestId,
    /// Orders, submitted in sequence.
    pub orders: Vec<OrderSpec>,
    /// Validate and record without reaching the venue.
    pub dry_run: bool,
}

impl ExecutionRequest {
    /// Create a request.
    #[must_use]
    pub fn new(request_id: impl Into<RequestId>, orders: Vec<OrderSpec>, dry_run: bool) -> Self {
        Self {
            request_id: request_id.into(),
            orders,
            dry_run,
        }
    }

    /// Validate the request before any ledger interaction.
    ///
    /// An empty order list is valid (connectivity probe).
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.request_id.is_blank() {
            return Err(DomainError::invalid("requestId", "requestId is required"));
        }

        let len = self.request_id.as_str().len();
        if len > MAX_REQUEST_ID_LEN {
            return Err(DomainError::invalid(
                "requestId",
                format!("requestId is {len} bytes, at most {MAX_REQUEST_ID_LEN} allowed"),
            ));
        }

        if let Some(last) = self.orders.len().checked_sub(1)
            && client_order_id(&self.request_id, last).len() > MAX_CLIENT_ORDER_ID_LEN
        {
            return Err(DomainError::invalid(
                "requestId",
                format!("too many orders for client order IDs of at most {MAX_CLIENT_ORDER_ID_LEN} bytes"),
            ));
        }

        for (index, order) in self.orders.iter().enumerate() {
            order.validate(index)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spy_buy() -> OrderSpec {
        OrderSpec::market("SPY", OrderSide::Buy, dec!(1))
    }

    #[test]
    fn valid_request_passes() {
        let request = ExecutionRequest::new("r1", vec![spy_buy()], true);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_order_set_is_a_valid_probe() {
        let request = ExecutionRequest::new("probe-1", vec![], false);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_request_id_is_rejected() {
        let request = ExecutionRequest::new("  ", vec![spy_buy()], true);
        let err = request.validate().unwrap_err();
        assert_eq!(err.field(), Some("requestId"));
    }

    #[test]
    fn overlong_request_id_is_rejected() {
        let request = ExecutionRequest::new("x".repeat(100), vec![spy_buy()], false);
        let err = request.validate().unwrap_err();
        assert_eq!(err.field(), Some("requestId"));
        assert!(err.to_string().contains("at most 40"));
    }

    #[test]
    fn longest_request_id_fits_client_order_ids() {
        let id = "x".repeat(MAX_REQUEST_ID_LEN);
        let request = ExecutionRequest::new(id.clone(), vec![spy_buy(); 3], false);
        assert!(request.validate().is_ok());

        let longest = client_order_id(&request.request_id, 2);
        assert!(longest.len() <= MAX_CLIENT_ORDER_ID_LEN);
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let mut order = spy_buy();
        order.quantity = dec!(0);
        let request = ExecutionRequest::new("r1", vec![spy_buy(), order], false);
        let err = request.validate().unwrap_err();
        assert_eq!(err.field(), Some("orders[1].qty"));
    }

    #[test]
    fn invalid_symbol_reports_order_index() {
        let order = OrderSpec::market("SP Y", OrderSide::Sell, dec!(1));
        let err = ExecutionRequest::new("r1", vec![order], false)
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some("orders[0].symbol"));
    }

    #[test]
    fn limit_order_requires_positive_limit_price() {
        let mut order = OrderSpec::limit("AAPL", OrderSide::Buy, dec!(5), dec!(190.5));
        assert!(order.validate(0).is_ok());

        order.limit_price = None;
        assert_eq!(
            order.validate(0).unwrap_err().field(),
            Some("orders[0].limitPrice")
        );

        order.limit_price = Some(dec!(-1));
        assert!(order.validate(0).is_err());
    }

    #[test]
    fn market_order_rejects_limit_price() {
        let mut order = spy_buy();
        order.limit_price = Some(dec!(500));
        assert!(order.validate(0).is_err());
    }

    #[test]
    fn stop_limit_requires_both_prices() {
        let mut order = OrderSpec::limit("AAPL", OrderSide::Sell, dec!(5), dec!(180));
        order.order_type = OrderType::StopLimit;
        assert_eq!(
            order.validate(0).unwrap_err().field(),
            Some("orders[0].stopPrice")
        );
        order.stop_price = Some(dec!(181));
        assert!(order.validate(0).is_ok());
    }
}
