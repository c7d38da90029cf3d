//! Broker Adapters
//!
//! Implementations of `BrokerPort`: the Alpaca REST API and an in-process
//! simulated venue.

pub mod alpaca;
pub mod simulated;

pub use alpaca::{AlpacaBrokerAdapter, AlpacaConfig, AlpacaError};
pub use simulated::{SimulatedBroker, SimulatedBrokerConfig};
