//! HTTP response DTOs.

use std::sync::Arc;

use serde::Serialize;

use crate::application::dto::DispatchResponse;
use crate::application::ports::StateEvent;
use crate::domain::execution::{OrderResult, TradingMode, Venue};
use crate::domain::idempotency::LedgerStats;
use crate::domain::market::QuoteSnapshot;
use crate::domain::shared::{RequestId, Timestamp};
use crate::infrastructure::broadcast::{BroadcastStats, Envelope};

/// Response from `POST /api/v1/executions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    /// Request ID.
    pub request_id: RequestId,
    /// This call performed the execution.
    pub accepted: bool,
    /// A prior outcome was returned.
    pub duplicate: bool,
    /// The original submission is still in flight.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    /// Outcome status, or `pending`.
    pub status: String,
    /// Whether the outcome came from a dry run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    /// Per-order results.
    pub results: Vec<OrderResult>,
    /// Summary of what went wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the outcome was finalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl From<DispatchResponse> for ExecutionResponse {
    fn from(response: DispatchResponse) -> Self {
        match response.outcome {
            Some(outcome) => Self {
                request_id: response.request_id,
                accepted: response.accepted,
                duplicate: response.duplicate,
                pending: false,
                status: outcome.status.as_str().to_string(),
                dry_run: Some(outcome.dry_run),
                results: outcome.results.clone(),
                failure_reason: outcome.failure_reason.clone(),
                completed_at: Some(outcome.completed_at),
            },
            None => Self {
                request_id: response.request_id,
                accepted: false,
                duplicate: false,
                pending: true,
                status: "pending".to_string(),
                dry_run: None,
                results: Vec::new(),
                failure_reason: None,
                completed_at: None,
            },
        }
    }
}

/// Response from `GET /api/v1/quotes`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesResponse {
    /// One snapshot per known symbol, in request order.
    pub quotes: Vec<Arc<QuoteSnapshot>>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Trading mode fixed at startup.
    pub mode: TradingMode,
    /// Venue the broker adapter is bound to.
    pub venue: Venue,
    /// Broker adapter name.
    pub broker: String,
    /// Ledger entry counts.
    pub ledger: LedgerStats,
    /// Broadcaster counters.
    pub broadcast: BroadcastStats,
}

/// Server-to-client WebSocket message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    /// Cached state sent once on connect.
    Snapshot {
        /// Cached state.
        event: StateEvent,
    },
    /// Live update.
    Event {
        /// Published envelope.
        envelope: Arc<Envelope>,
    },
    /// Updates were dropped because this client fell behind.
    Lagged {
        /// Number of dropped updates.
        dropped: u64,
    },
}
