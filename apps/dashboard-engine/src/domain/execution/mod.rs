//! Execution Bounded Context
//!
//! Execution requests, their per-order results, and the trading mode that
//! gates which venues an order may reach.

mod outcome;
mod request;
mod trading_mode;

pub use outcome::{
    ExecutionOutcome, OrderResult, OrderResultStatus, OutcomeStatus, client_order_id,
};
pub use request::{
    ExecutionRequest, MAX_CLIENT_ORDER_ID_LEN, MAX_REQUEST_ID_LEN, OrderSide, OrderSpec, OrderType,
    TimeInForce,
};
pub use trading_mode::{TradingMode, Venue};
