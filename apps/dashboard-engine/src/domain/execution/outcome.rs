//! Per-order results and the terminal outcome of an execution request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::request::{OrderSide, OrderSpec};
use crate::domain::shared::{BrokerOrderId, RequestId, Symbol, Timestamp};

/// Result status of a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderResultStatus {
    /// Dry run; synthesized without reaching the venue.
    SimulatedFill,
    /// Venue accepted the order, no fills yet.
    Accepted,
    /// Venue reported a partial fill.
    PartiallyFilled,
    /// Venue reported a complete fill.
    Filled,
    /// Venue declined the order.
    Rejected,
    /// Transport or venue failure.
    Failed,
    /// Adapter call exceeded its timeout.
    TimedOut,
    /// Not submitted because an earlier order failed.
    Skipped,
}

impl OrderResultStatus {
    /// Whether the order reached the venue (or the dry-run simulator) successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::SimulatedFill | Self::Accepted | Self::PartiallyFilled | Self::Filled
        )
    }

    /// Wire name, as used in responses and metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SimulatedFill => "simulated-fill",
            Self::Accepted => "accepted",
            Self::PartiallyFilled => "partially-filled",
            Self::Filled => "filled",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of one order in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    /// Position of the order in the request.
    pub index: usize,
    /// Symbol.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Requested quantity.
    #[serde(rename = "qty")]
    pub quantity: Decimal,
    /// Result status.
    pub status: OrderResultStatus,
    /// Client order ID sent to the venue (`{requestId}-{index}`).
    pub client_order_id: String,
    /// Venue order ID, when the venue acknowledged the order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<BrokerOrderId>,
    /// Filled quantity.
    pub filled_qty: Decimal,
    /// Average fill price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_fill_price: Option<Decimal>,
    /// Rejection or failure reason, verbatim from the venue when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OrderResult {
    /// A result for `order` with no fill and no venue ID.
    #[must_use]
    pub fn pending_for(
        request_id: &RequestId,
        index: usize,
        order: &OrderSpec,
        status: OrderResultStatus,
    ) -> Self {
        Self {
            index,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            status,
            client_order_id: client_order_id(request_id, index),
            broker_order_id: None,
            filled_qty: Decimal::ZERO,
            avg_fill_price: None,
            reason: None,
        }
    }

    /// Attach a reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Venue client order ID for the `index`-th order of a request.
///
/// Deterministic so a venue-side duplicate check sees the same ID on any
/// accidental resubmission.
#[must_use]
pub fn client_order_id(request_id: &RequestId, index: usize) -> String {
    format!("{request_id}-{index}")
}

/// Aggregate status of an execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    /// Every order succeeded (or there were no orders).
    Completed,
    /// Some orders succeeded, some did not.
    PartiallyCompleted,
    /// No order succeeded.
    Failed,
}

impl OutcomeStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially-completed",
            Self::Failed => "failed",
        }
    }
}

/// Terminal outcome of an execution request. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    /// Request this outcome belongs to.
    pub request_id: RequestId,
    /// Aggregate status.
    pub status: OutcomeStatus,
    /// Whether the request was a dry run.
    pub dry_run: bool,
    /// Per-order results, in request order.
    pub results: Vec<OrderResult>,
    /// Summary of what went wrong, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the worker picked the request up.
    pub started_at: Timestamp,
    /// When the outcome was finalized.
    pub completed_at: Timestamp,
}

impl ExecutionOutcome {
    /// Build an outcome from per-order results, deriving the aggregate status.
    #[must_use]
    pub fn from_results(
        request_id: RequestId,
        dry_run: bool,
        results: Vec<OrderResult>,
        started_at: Timestamp,
    ) -> Self {
        let succeeded = results.iter().filter(|r| r.status.is_success()).count();

        let status = if succeeded == results.len() {
            OutcomeStatus::Completed
        } else if succeeded == 0 {
            OutcomeStatus::Failed
        } else {
            OutcomeStatus::PartiallyCompleted
        };

        let failure_reason = results
            .iter()
            .find(|r| !r.status.is_success())
            .map(|r| {
                let detail = r.reason.as_deref().unwrap_or(r.status.as_str());
                format!(
                    "{} of {} orders did not succeed; first: order {} ({}) {}",
                    results.len() - succeeded,
                    results.len(),
                    r.index,
                    r.symbol,
                    detail
                )
            });

        Self {
            request_id,
            status,
            dry_run,
            results,
            failure_reason,
            started_at,
            completed_at: Timestamp::now(),
        }
    }

    /// A failed outcome with no per-order detail, for when the worker itself died.
    #[must_use]
    pub fn aborted(request_id: RequestId, dry_run: bool, reason: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            request_id,
            status: OutcomeStatus::Failed,
            dry_run,
            results: Vec::new(),
            failure_reason: Some(reason.into()),
            started_at: now,
            completed_at: now,
        }
    }

    /// Whether every order succeeded.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Completed)
    }

    /// Whether any order actually reached the venue (not dry run, not skipped).
    #[must_use]
    pub fn touched_venue(&self) -> bool {
        !self.dry_run
            && self.results.iter().any(|r| {
                !matches!(
                    r.status,
                    OrderResultStatus::Skipped | OrderResultStatus::SimulatedFill
                )
            })
    }
}
