//! Alpaca Markets Broker Adapter
//!
//! Implementation of `BrokerPort` for the Alpaca REST API:
//! - account, positions and latest quotes with retry on transient failures
//! - order submission, sent exactly once
//! - paper and live endpoints selected by venue

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaBrokerAdapter;
pub use config::{AlpacaConfig, DEFAULT_READ_RETRY};
pub use error::AlpacaError;
