//! Prometheus metrics for the dashboard engine.
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so
//! tests can exercise instrumented code without any setup.
//!
//! # Example
//!
//! ```ignore
//! use dashboard_engine::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_execution("completed", false);
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for latency measurements (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            // 1ms to 30s: adapter calls are bounded by the dispatch timeout
            latency_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Dispatch Metrics
// ============================================================================

/// Record a request refused before reaching the ledger.
///
/// * `reason` - `"validation"` or `"configuration"`
pub fn record_dispatch_rejection(reason: &str) {
    counter!("dispatch_rejections_total", "reason" => reason.to_string()).increment(1);
}

/// Record a repeated request ID.
///
/// * `state` - `"pending"` (in flight) or `"terminal"` (prior outcome returned)
pub fn record_duplicate(state: &str) {
    counter!("dispatch_duplicates_total", "state" => state.to_string()).increment(1);
}

/// Record one adapter order call.
///
/// # Arguments
///
/// * `broker` - Adapter name (e.g., "alpaca", "simulated")
/// * `status` - Result status (e.g., "filled", "rejected", "timed-out")
/// * `order_type` - Order type (e.g., "market", "limit")
/// * `latency_seconds` - Time from submit to ACK or failure in seconds
pub fn record_order_submission(broker: &str, status: &str, order_type: &str, latency_seconds: f64) {
    counter!(
        "order_submissions_total",
        "broker" => broker.to_string(),
        "status" => status.to_string(),
        "order_type" => order_type.to_string()
    )
    .increment(1);

    histogram!(
        "order_latency_seconds",
        "broker" => broker.to_string(),
        "order_type" => order_type.to_string()
    )
    .record(latency_seconds);
}

/// Record a terminal execution outcome.
pub fn record_execution(status: &str, dry_run: bool) {
    counter!(
        "executions_total",
        "status" => status.to_string(),
        "dry_run" => dry_run.to_string()
    )
    .increment(1);
}

/// Update the ledger size gauge.
pub fn set_ledger_size(entries: usize) {
    gauge!("ledger_entries").set(entries as f64);
}

// ============================================================================
// Snapshot Metrics
// ============================================================================

/// Record a broker read.
///
/// # Arguments
///
/// * `broker` - Adapter name
/// * `what` - `"account"`, `"positions"` or `"quotes"`
/// * `ok` - Whether the fetch succeeded
/// * `latency_seconds` - Fetch duration in seconds
pub fn record_snapshot_fetch(broker: &str, what: &str, ok: bool, latency_seconds: f64) {
    counter!(
        "snapshot_fetches_total",
        "broker" => broker.to_string(),
        "what" => what.to_string(),
        "result" => if ok { "ok" } else { "error" }
    )
    .increment(1);

    histogram!(
        "snapshot_fetch_latency_seconds",
        "broker" => broker.to_string(),
        "what" => what.to_string()
    )
    .record(latency_seconds);
}

// ============================================================================
// Scheduler Metrics
// ============================================================================

/// Record a job run.
///
/// * `outcome` - `"succeeded"`, `"failed"`, `"panicked"` or `"skipped"`
pub fn record_job_run(job: &str, outcome: &str, duration_seconds: f64) {
    counter!(
        "job_runs_total",
        "job" => job.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!("job_duration_seconds", "job" => job.to_string()).record(duration_seconds);
}

// ============================================================================
// Broadcast Metrics
// ============================================================================

/// Record envelopes dropped from full subscriber queues.
pub fn record_broadcast_drop(count: u64) {
    counter!("broadcast_dropped_total").increment(count);
}

/// Update the connected subscribers gauge.
pub fn set_subscribers(count: usize) {
    gauge!("broadcast_subscribers").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MetricsConfig::default();
        assert_eq!(config.listen_addr.port(), 9090);
        assert!(!config.latency_buckets.is_empty());
        assert!(config.latency_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn recording_without_exporter_is_harmless() {
        record_dispatch_rejection("validation");
        record_duplicate("pending");
        record_order_submission("simulated", "filled", "market", 0.001);
        record_execution("completed", true);
        set_ledger_size(3);
        record_snapshot_fetch("simulated", "account", true, 0.01);
        record_job_run("quote-refresh", "succeeded", 0.02);
        record_broadcast_drop(2);
        set_subscribers(1);
    }
}
