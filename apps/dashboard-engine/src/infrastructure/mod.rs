//! Infrastructure Layer
//!
//! Adapters for the application ports and the inbound HTTP gateway.

pub mod broadcast;
pub mod broker;
pub mod http;
pub mod persistence;
