//! Observability module for metrics.
//!
//! Prometheus export of dispatcher, ledger, scheduler and broadcaster
//! counters. Tracing setup lives in [`crate::telemetry`].

pub mod metrics;

pub use metrics::{MetricsConfig, MetricsError, init_metrics};
