//! Data transfer objects for the dispatcher boundary.

use std::sync::Arc;

use crate::domain::execution::ExecutionOutcome;
use crate::domain::shared::RequestId;

/// What the dispatcher tells the caller.
///
/// Exactly one of three shapes:
/// - fresh: `accepted`, not `duplicate`, outcome present
/// - duplicate: not `accepted`, `duplicate`, prior outcome present (verbatim)
/// - pending: neither, `pending`, no outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    /// Request ID.
    pub request_id: RequestId,
    /// This call performed the execution.
    pub accepted: bool,
    /// A terminal outcome from an earlier call was returned.
    pub duplicate: bool,
    /// An earlier call with this ID is still in flight.
    pub pending: bool,
    /// Outcome, absent while pending.
    pub outcome: Option<Arc<ExecutionOutcome>>,
}

impl DispatchResponse {
    /// This call executed the request.
    #[must_use]
    pub fn accepted(outcome: Arc<ExecutionOutcome>) -> Self {
        Self {
            request_id: outcome.request_id.clone(),
            accepted: true,
            duplicate: false,
            pending: false,
            outcome: Some(outcome),
        }
    }

    /// The request was already resolved.
    #[must_use]
    pub fn duplicate(outcome: Arc<ExecutionOutcome>) -> Self {
        Self {
            request_id: outcome.request_id.clone(),
            accepted: false,
            duplicate: true,
            pending: false,
            outcome: Some(outcome),
        }
    }

    /// The original submission is still running.
    #[must_use]
    pub const fn pending(request_id: RequestId) -> Self {
        Self {
            request_id,
            accepted: false,
            duplicate: false,
            pending: true,
            outcome: None,
        }
    }
}
