//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to the dispatcher and the snapshot
//! service. Handlers never call the broker directly.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State, WebSocketUpgrade, rejection::JsonRejection,
        ws::rejection::WebSocketUpgradeRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::ports::BrokerPort;
use crate::application::services::SnapshotService;
use crate::application::use_cases::ExecutionDispatcher;
use crate::domain::execution::{ExecutionRequest, Venue};
use crate::domain::idempotency::{LedgerEntry, LedgerStore};
use crate::domain::market::{AccountSnapshot, PositionSnapshot};
use crate::domain::shared::{RequestId, Symbol};
use crate::infrastructure::broadcast::{StateBroadcaster, Topic};

use super::error::ApiError;
use super::request::{ExecutionRequestBody, QuotesQuery, StreamQuery};
use super::response::{ExecutionResponse, HealthResponse, QuotesResponse};
use super::websocket::handle_socket;

/// Application state shared across handlers.
pub struct AppState<B, L>
where
    B: BrokerPort,
    L: LedgerStore,
{
    /// Execution dispatcher.
    pub dispatcher: Arc<ExecutionDispatcher<B, L, StateBroadcaster>>,
    /// Snapshot cache.
    pub snapshots: Arc<SnapshotService<B, StateBroadcaster>>,
    /// Fan-out hub for the WebSocket channel.
    pub broadcaster: StateBroadcaster,
    /// Idempotency ledger, for status polling.
    pub ledger: Arc<L>,
    /// Venue the broker adapter is bound to.
    pub venue: Venue,
    /// Broker adapter name.
    pub broker: &'static str,
    /// Application version.
    pub version: String,
}

impl<B, L> Clone for AppState<B, L>
where
    B: BrokerPort,
    L: LedgerStore,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            snapshots: Arc::clone(&self.snapshots),
            broadcaster: self.broadcaster.clone(),
            ledger: Arc::clone(&self.ledger),
            venue: self.venue,
            broker: self.broker,
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<B, L>(state: AppState<B, L>) -> Router
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/executions", post(submit_execution))
        .route("/api/v1/executions/{request_id}", get(get_execution))
        .route("/api/v1/account", get(get_account))
        .route("/api/v1/positions", get(get_positions))
        .route("/api/v1/quotes", get(get_quotes))
        .route("/ws", get(stream))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<B, L>(State(state): State<AppState<B, L>>) -> Json<HealthResponse>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        mode: state.dispatcher.mode(),
        venue: state.venue,
        broker: state.broker.to_string(),
        ledger: state.ledger.stats(),
        broadcast: state.broadcaster.stats(),
    })
}

/// Submit an execution request.
///
/// 200 for fresh and duplicate, 202 while the original is still in flight.
async fn submit_execution<B, L>(
    State(state): State<AppState<B, L>>,
    body: Result<Json<ExecutionRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ExecutionResponse>), ApiError>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = ExecutionRequest::from(body);

    let response = state.dispatcher.submit(request).await?;
    let status = if response.pending {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ExecutionResponse::from(response))))
}

/// Ledger state for one request ID.
async fn get_execution<B, L>(
    State(state): State<AppState<B, L>>,
    Path(request_id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    state
        .ledger
        .get(&RequestId::new(request_id.as_str()))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no execution with requestId {request_id}")))
}

/// Account snapshot.
async fn get_account<B, L>(
    State(state): State<AppState<B, L>>,
) -> Result<Json<Arc<AccountSnapshot>>, ApiError>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    Ok(Json(state.snapshots.account().await?))
}

/// Positions snapshot.
async fn get_positions<B, L>(
    State(state): State<AppState<B, L>>,
) -> Result<Json<Arc<PositionSnapshot>>, ApiError>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    Ok(Json(state.snapshots.positions().await?))
}

/// Quote snapshots for `?symbols=SPY,AAPL`.
async fn get_quotes<B, L>(
    State(state): State<AppState<B, L>>,
    Query(query): Query<QuotesQuery>,
) -> Result<Json<QuotesResponse>, ApiError>
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    let symbols = Symbol::parse_list(query.symbols.as_deref().unwrap_or_default());
    if symbols.is_empty() {
        return Err(ApiError::BadRequest(
            "symbols query parameter is required".to_string(),
        ));
    }
    for symbol in &symbols {
        symbol
            .validate()
            .map_err(|e| ApiError::BadRequest(format!("{symbol}: {e}")))?;
    }

    let quotes = state.snapshots.quotes(&symbols).await?;
    Ok(Json(QuotesResponse { quotes }))
}

/// WebSocket real-time channel.
///
/// Topics are checked before the upgrade so a bad subscription is a plain 400.
async fn stream<B, L>(
    State(state): State<AppState<B, L>>,
    Query(query): Query<StreamQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response
where
    B: BrokerPort + 'static,
    L: LedgerStore + 'static,
{
    let topics = match Topic::parse_list(query.topics.as_deref().unwrap_or_default()) {
        Ok(topics) => topics,
        Err(e) => return ApiError::BadRequest(e.to_string()).into_response(),
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state, topics)),
        Err(rejection) => rejection.into_response(),
    }
}
