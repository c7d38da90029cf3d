//! Application Ports
//!
//! Driven (secondary/outbound) ports: how the application reaches external
//! systems. Adapters live in the infrastructure layer.

mod broker_port;
mod event_publisher_port;

pub use broker_port::{AckStatus, BrokerError, BrokerPort, OrderAck, SubmitOrderRequest};
pub use event_publisher_port::{EventPublisherPort, NoOpEventPublisher, StateEvent};
