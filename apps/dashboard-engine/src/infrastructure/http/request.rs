//! HTTP request DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::execution::{
    ExecutionRequest, OrderSide, OrderSpec, OrderType, TimeInForce, Venue,
};
use crate::domain::shared::{RequestId, Symbol};

/// Body of `POST /api/v1/executions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequestBody {
    /// Idempotency key. A missing key fails validation rather than parsing.
    #[serde(default)]
    pub request_id: String,
    /// Record without reaching the venue.
    #[serde(default)]
    pub dry_run: bool,
    /// Orders, submitted in sequence.
    #[serde(default)]
    pub orders: Vec<OrderRequestBody>,
}

/// One order in an execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestBody {
    /// Symbol to trade.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Quantity.
    pub qty: Decimal,
    /// Order type.
    #[serde(rename = "type", default = "default_order_type")]
    pub order_type: OrderType,
    /// Limit price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Stop price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// Time in force (defaults to day).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    /// Explicit routing target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<Venue>,
}

const fn default_order_type() -> OrderType {
    OrderType::Market
}

impl From<OrderRequestBody> for OrderSpec {
    fn from(body: OrderRequestBody) -> Self {
        Self {
            symbol: Symbol::new(body.symbol),
            side: body.side,
            quantity: body.qty,
            order_type: body.order_type,
            limit_price: body.limit_price,
            stop_price: body.stop_price,
            time_in_force: body.time_in_force.unwrap_or_default(),
            venue: body.venue,
        }
    }
}

impl From<ExecutionRequestBody> for ExecutionRequest {
    fn from(body: ExecutionRequestBody) -> Self {
        Self {
            request_id: RequestId::new(body.request_id),
            orders: body.orders.into_iter().map(OrderSpec::from).collect(),
            dry_run: body.dry_run,
        }
    }
}

/// Query for `GET /api/v1/quotes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotesQuery {
    /// Comma-separated symbols.
    #[serde(default)]
    pub symbols: Option<String>,
}

/// Query for `GET /ws`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated topics; all topics when absent.
    #[serde(default)]
    pub topics: Option<String>,
}
