//! Dashboard Engine Binary
//!
//! Starts the order-execution core behind the trading dashboard.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dashboard-engine
//! ```
//!
//! # Environment Variables
//!
//! - `DASHBOARD_CONFIG`: config file path (default: `config.yaml`)
//! - `RUST_LOG`: log filter, overrides `observability.logging.level`
//! - `OTEL_ENABLED` / `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP span export
//! - Any `${VAR}` referenced from the config file, e.g. `ALPACA_KEY`

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dashboard_engine::application::ports::BrokerPort;
use dashboard_engine::application::services::scheduler::jobs::{
    self, AccountRefreshJob, DailyAccountSummaryJob, LedgerSweepJob, QuoteRefreshJob,
};
use dashboard_engine::application::services::{
    BackgroundScheduler, JobSchedule, JobSpec, RetryPolicy, SnapshotService,
};
use dashboard_engine::application::use_cases::ExecutionDispatcher;
use dashboard_engine::config::{BrokerProvider, Config, SchedulerConfig, config_path, load_config};
use dashboard_engine::infrastructure::broadcast::{StateBroadcaster, spawn_execution_listener};
use dashboard_engine::infrastructure::broker::{AlpacaBrokerAdapter, SimulatedBroker};
use dashboard_engine::infrastructure::http::{AppState, create_router};
use dashboard_engine::infrastructure::persistence::InMemoryLedger;
use dashboard_engine::observability::{MetricsConfig, init_metrics};
use dashboard_engine::telemetry::init_telemetry;
use dashboard_engine::{LedgerStore, Venue};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long background tasks get to stop after the server has.
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let path = config_path();
    let config = load_config(Some(&path)).with_context(|| format!("loading {path}"))?;

    let _telemetry = init_telemetry(&config.observability.logging);
    tracing::info!(config = %path, "Starting Dashboard Engine");
    log_config(&config);

    start_metrics_exporter(config.observability.metrics_port)?;

    match config.broker.provider {
        BrokerProvider::Simulated => {
            let broker = SimulatedBroker::new(config.broker.simulated_config());
            run(broker, config).await
        }
        BrokerProvider::Alpaca => {
            let broker = AlpacaBrokerAdapter::new(config.broker.alpaca_config())
                .context("creating Alpaca broker adapter")?;
            if config.broker.venue == Venue::Live {
                tracing::warn!("Alpaca adapter bound to the LIVE venue; orders move real money");
            }
            run(broker, config).await
        }
    }
}

/// Wire every component around `broker` and serve until shutdown.
async fn run<B>(broker: B, config: Config) -> anyhow::Result<()>
where
    B: BrokerPort + 'static,
{
    let broker = Arc::new(broker);
    let venue = broker.venue();
    let broker_name = broker.name();
    let mode = config.trading.mode;

    let ledger = Arc::new(InMemoryLedger::new(config.ledger.store_config()));
    let broadcaster = StateBroadcaster::new(config.broadcast.queue_capacity);
    let publisher = Arc::new(broadcaster.clone());

    let snapshots = Arc::new(SnapshotService::new(
        Arc::clone(&broker),
        Arc::clone(&publisher),
        config.snapshots.snapshot_config(),
    ));
    let dispatcher = Arc::new(ExecutionDispatcher::new(
        broker,
        Arc::clone(&ledger),
        publisher,
        mode,
        config.dispatch.dispatcher_config(),
    ));

    let shutdown_token = CancellationToken::new();

    let mut background = vec![spawn_execution_listener(
        &broadcaster,
        Arc::clone(&snapshots),
        shutdown_token.clone(),
    )];

    if config.scheduler.enabled {
        let scheduler = build_scheduler(&config.scheduler, &snapshots, &ledger)?;
        background.extend(scheduler.start(&shutdown_token));
        tracing::info!(jobs = ?scheduler.job_names(), "Background scheduler started");
    } else {
        tracing::info!("Background scheduler disabled");
    }

    let state = AppState {
        dispatcher,
        snapshots,
        broadcaster: broadcaster.clone(),
        ledger: Arc::clone(&ledger),
        venue,
        broker: broker_name,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let app = create_router(state);

    let http_addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.http_port)
        .parse()
        .context("invalid server.bind_address")?;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding {http_addr}"))?;

    tracing::info!(%http_addr, mode = %mode, venue = %venue, broker = broker_name, "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /api/v1/executions");
    tracing::info!("  GET  /api/v1/executions/{{request_id}}");
    tracing::info!("  GET  /api/v1/account");
    tracing::info!("  GET  /api/v1/positions");
    tracing::info!("  GET  /api/v1/quotes?symbols=");
    tracing::info!("  GET  /ws?topics=");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(
        shutdown_token.clone(),
        broadcaster,
    ));
    let mut server = tokio::spawn(async move { server.await });

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    tokio::select! {
        result = &mut server => {
            result
                .context("HTTP server task failed")?
                .context("HTTP server error")?;
            tracing::info!("HTTP server stopped");
        }
        () = shutdown_deadline(&shutdown_token, shutdown_timeout) => {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
            server.abort();
        }
    }

    // Covers the server exiting on its own.
    shutdown_token.cancel();
    await_background(background).await;

    let stats = ledger.stats();
    tracing::info!(
        pending = stats.pending,
        completed = stats.completed,
        failed = stats.failed,
        "Dashboard engine stopped"
    );
    Ok(())
}

/// Register the refresh, sweep and daily summary jobs.
fn build_scheduler<B>(
    config: &SchedulerConfig,
    snapshots: &Arc<SnapshotService<B, StateBroadcaster>>,
    ledger: &Arc<InMemoryLedger>,
) -> anyhow::Result<BackgroundScheduler>
where
    B: BrokerPort + 'static,
{
    let retry = config.retry_policy();
    let mut scheduler = BackgroundScheduler::new();

    scheduler.register(
        JobSpec::new(
            jobs::QUOTE_REFRESH,
            JobSchedule::Every(Duration::from_secs(config.quote_refresh_secs)),
            Arc::new(QuoteRefreshJob::new(
                Arc::clone(snapshots),
                config.watchlist_symbols(),
            )),
        )
        .with_retry(retry),
    );

    scheduler.register(
        JobSpec::new(
            jobs::ACCOUNT_REFRESH,
            JobSchedule::Every(Duration::from_secs(config.account_refresh_secs)),
            Arc::new(AccountRefreshJob::new(Arc::clone(snapshots))),
        )
        .with_retry(retry),
    );

    scheduler.register(
        JobSpec::new(
            jobs::LEDGER_SWEEP,
            JobSchedule::Every(Duration::from_secs(config.ledger_sweep_secs)),
            Arc::new(LedgerSweepJob::new(Arc::clone(ledger))),
        )
        .with_retry(RetryPolicy::none()),
    );

    if config.daily_summary.enabled {
        let schedule = config
            .daily_summary
            .schedule()
            .context("scheduler.daily_summary")?;
        scheduler.register(
            JobSpec::new(
                jobs::DAILY_ACCOUNT_SUMMARY,
                schedule,
                Arc::new(DailyAccountSummaryJob::new(Arc::clone(snapshots))),
            )
            .with_retry(retry),
        );
    }

    Ok(scheduler)
}

/// Start the Prometheus exporter unless the port is 0.
fn start_metrics_exporter(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        tracing::info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    init_metrics(&MetricsConfig::with_addr(addr)).context("starting metrics exporter")?;
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// Log the loaded configuration. Credentials are never logged.
fn log_config(config: &Config) {
    tracing::info!(
        mode = %config.trading.mode,
        provider = ?config.broker.provider,
        venue = %config.broker.venue,
        http_port = config.server.http_port,
        metrics_port = config.observability.metrics_port,
        scheduler_enabled = config.scheduler.enabled,
        ledger_retention_secs = config.ledger.retention_secs,
        "Configuration loaded"
    );
}

/// Resolves once `timeout` has passed after cancellation.
async fn shutdown_deadline(token: &CancellationToken, timeout: Duration) {
    token.cancelled().await;
    tokio::time::sleep(timeout).await;
}

/// Wait for background tasks, giving up after [`BACKGROUND_STOP_TIMEOUT`].
async fn await_background(handles: Vec<JoinHandle<()>>) {
    let count = handles.len();
    if tokio::time::timeout(BACKGROUND_STOP_TIMEOUT, futures::future::join_all(handles))
        .await
        .is_err()
    {
        tracing::warn!(tasks = count, "Background tasks did not stop in time");
    } else {
        tracing::debug!(tasks = count, "Background tasks stopped");
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGTERM or SIGINT, then stop background work and end every
/// WebSocket session so the server can drain.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; a process that cannot
/// hear termination signals should not start.
#[allow(clippy::expect_used)]
async fn shutdown_signal(token: CancellationToken, broadcaster: StateBroadcaster) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    token.cancel();
    broadcaster.close_all();

    tracing::info!("Graceful shutdown started");
}
