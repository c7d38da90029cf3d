//! Broker Port (Driven Port)
//!
//! Interface to the remote trading service: account, position and quote
//! lookups plus order submission. Calls may be slow or fail transiently.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::execution::{
    OrderSide, OrderSpec, OrderType, TimeInForce, Venue, client_order_id,
};
use crate::domain::market::{Account, Position, Quote};
use crate::domain::shared::{BrokerOrderId, RequestId, Symbol};

/// Request to submit one order to the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Client order ID (`{requestId}-{index}`).
    pub client_order_id: String,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity.
    pub quantity: Decimal,
    /// Limit price (for limit orders).
    pub limit_price: Option<Decimal>,
    /// Stop price (for stop orders).
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
}

impl SubmitOrderRequest {
    /// Build the venue request for the `index`-th order of `request_id`.
    #[must_use]
    pub fn from_spec(request_id: &RequestId, index: usize, spec: &OrderSpec) -> Self {
        Self {
            client_order_id: client_order_id(request_id, index),
            symbol: spec.symbol.clone(),
            side: spec.side,
            order_type: spec.order_type,
            quantity: spec.quantity,
            limit_price: spec.limit_price,
            stop_price: spec.stop_price,
            time_in_force: spec.time_in_force,
        }
    }
}

/// Venue-side order status at acknowledgment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Accepted, working.
    Accepted,
    /// Partially filled.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Canceled or expired before any action.
    Canceled,
    /// Rejected after acceptance.
    Rejected,
}

/// Acknowledgment from the venue after order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Venue-assigned order ID.
    pub broker_order_id: BrokerOrderId,
    /// Client order ID echoed back.
    pub client_order_id: String,
    /// Current status.
    pub status: AckStatus,
    /// Filled quantity (if any).
    pub filled_qty: Decimal,
    /// Average fill price (if any).
    pub avg_fill_price: Option<Decimal>,
}

/// Broker port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Network failure or retryable server error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// Order declined by the venue. The reason is preserved verbatim.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Credentials refused.
    #[error("Broker authentication failed")]
    AuthenticationFailed,

    /// Anything else.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Read paths (refresh jobs) retry on these; order submission never does.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError { .. } | Self::RateLimited)
    }

    /// Whether the venue explicitly declined.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::OrderRejected { .. })
    }
}

/// Port for the remote trading service.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Endpoint this adapter is bound to.
    fn venue(&self) -> Venue;

    /// Short adapter name for logs and metric labels.
    fn name(&self) -> &'static str;

    /// Fetch the account summary.
    async fn get_account(&self) -> Result<Account, BrokerError>;

    /// Fetch all open positions.
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Fetch latest quotes. Unknown symbols are omitted from the result.
    async fn get_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, BrokerError>;

    /// Submit one order. Implementations must not retry this call.
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn submit_request_from_spec() {
        let spec = OrderSpec::limit("aapl", OrderSide::Buy, dec!(10), dec!(190));
        let request = SubmitOrderRequest::from_spec(&RequestId::new("r9"), 3, &spec);

        assert_eq!(request.client_order_id, "r9-3");
        assert_eq!(request.symbol.as_str(), "AAPL");
        assert_eq!(request.order_type, OrderType::Limit);
        assert_eq!(request.limit_price, Some(dec!(190)));
        assert_eq!(request.time_in_force, TimeInForce::Day);
    }

    #[test]
    fn transient_classification() {
        assert!(
            BrokerError::ConnectionError {
                message: "reset".to_string()
            }
            .is_transient()
        );
        assert!(BrokerError::RateLimited.is_transient());
        assert!(
            !BrokerError::OrderRejected {
                reason: "halted".to_string()
            }
            .is_transient()
        );
        assert!(!BrokerError::AuthenticationFailed.is_transient());
    }
}
