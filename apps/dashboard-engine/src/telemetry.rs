//! Tracing Setup
//!
//! Installs the global `tracing` subscriber: an `EnvFilter`, a JSON or
//! pretty console layer, and an optional OpenTelemetry OTLP layer.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives; overrides `observability.logging.level`
//! - `OTEL_ENABLED`: `true` exports spans over OTLP, `false` never does.
//!   Unset exports only when an endpoint is configured.
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: `http://localhost:4317`)
//! - `OTEL_SERVICE_NAME`: service name for traces (default: `dashboard-engine`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use dashboard_engine::telemetry::init_telemetry;
//!
//! let _guard = init_telemetry(&config.observability.logging);
//! ```

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_SERVICE_NAME: &str = "dashboard-engine";

/// Guard that shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are exported over OTLP.
    #[must_use]
    pub const fn otel_enabled(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down tracer provider: {e:?}");
        }
    }
}

/// Build the filter: `RUST_LOG` if set and valid, else the configured level.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}': {e}, using 'info'", config.level);
            EnvFilter::new("info")
        })
}

fn otel_requested() -> bool {
    match std::env::var("OTEL_ENABLED") {
        Ok(v) => v.eq_ignore_ascii_case("true") || v == "1",
        Err(_) => std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok(),
    }
}

fn build_provider(endpoint: &str) -> Option<SdkTracerProvider> {
    match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => Some(
            SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .build(),
        ),
        Err(e) => {
            eprintln!("Failed to create OTLP exporter: {e:?}, falling back to console logging");
            None
        }
    }
}

/// Initialize the global subscriber.
///
/// Returns a guard that flushes and shuts down the tracer provider when
/// dropped. Calling this twice leaves the first subscriber in place.
#[must_use]
pub fn init_telemetry(config: &LoggingConfig) -> TelemetryGuard {
    let json = config.format.eq_ignore_ascii_case("json");

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());

    let provider = if otel_requested() {
        build_provider(&endpoint)
    } else {
        None
    };

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.clone()))
    });

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
    });
    let pretty_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    let installed = Registry::default()
        .with(env_filter(config))
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init();

    if let Err(e) = installed {
        eprintln!("Tracing subscriber already installed: {e}");
    }

    if provider.is_some() {
        tracing::info!(
            service_name = %service_name,
            endpoint = %endpoint,
            "OpenTelemetry initialized"
        );
    } else {
        tracing::info!(format = %config.format, "Console logging initialized");
    }

    TelemetryGuard { provider }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_info_on_bad_level() {
        let config = LoggingConfig {
            level: "definitely[not=valid".to_string(),
            format: "json".to_string(),
        };
        // Must not panic whatever RUST_LOG holds.
        let _ = env_filter(&config);
    }

    #[test]
    fn configured_level_parses() {
        let config = LoggingConfig {
            level: "dashboard_engine=debug,info".to_string(),
            format: "pretty".to_string(),
        };
        assert!(EnvFilter::try_new(&config.level).is_ok());
    }
}
