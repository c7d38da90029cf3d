//! Ledger entries and their state machine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::execution::ExecutionOutcome;
use crate::domain::shared::{DomainError, RequestId, Timestamp};

/// Lifecycle state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerState {
    /// Reserved, worker still running.
    Pending,
    /// Every order succeeded.
    Completed,
    /// At least one order did not succeed, or the worker died.
    Failed,
}

impl LedgerState {
    /// Completed or Failed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Only Pending→Completed and Pending→Failed are allowed.
    #[must_use]
    pub const fn can_transition_to(&self, to: Self) -> bool {
        matches!((self, to), (Self::Pending, Self::Completed | Self::Failed))
    }

    /// Terminal state recorded for an outcome.
    #[must_use]
    pub const fn for_outcome(outcome: &ExecutionOutcome) -> Self {
        if outcome.is_completed() {
            Self::Completed
        } else {
            Self::Failed
        }
    }
}

impl std::fmt::Display for LedgerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One idempotency record. At most one exists per request ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Key.
    pub request_id: RequestId,
    /// Current state.
    pub state: LedgerState,
    /// Outcome, absent while Pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Arc<ExecutionOutcome>>,
    /// When the entry was reserved.
    pub reserved_at: Timestamp,
    /// When the entry reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl LedgerEntry {
    /// A freshly reserved entry.
    #[must_use]
    pub fn reserve(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: LedgerState::Pending,
            outcome: None,
            reserved_at: Timestamp::now(),
            completed_at: None,
        }
    }

    /// Move to a terminal state. Fails without modifying `self` if the entry
    /// is already terminal.
    pub fn complete(&mut self, outcome: Arc<ExecutionOutcome>) -> Result<LedgerState, DomainError> {
        let to = LedgerState::for_outcome(&outcome);
        if !self.state.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                entity: "LedgerEntry".to_string(),
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        self.state = to;
        self.outcome = Some(outcome);
        self.completed_at = Some(Timestamp::now());
        Ok(to)
    }

    /// Whether a terminal entry's retention window has elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp, retention: std::time::Duration) -> bool {
        match (self.state.is_terminal(), self.completed_at) {
            (true, Some(done)) => done.age_at(now) >= retention,
            _ => false,
        }
    }
}
