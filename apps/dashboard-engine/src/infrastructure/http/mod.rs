//! HTTP/REST API adapter.
//!
//! Inbound adapter exposing the dispatcher, snapshot endpoints, execution
//! status polling, health, and the WebSocket real-time channel.

mod controller;
mod error;
mod request;
mod response;
mod websocket;

pub use controller::{AppState, create_router};
pub use error::ApiError;
pub use request::*;
pub use response::*;
