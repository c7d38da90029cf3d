//! Ledger Store Trait
//!
//! Persistence contract for idempotency records. Implemented by adapters in
//! the infrastructure layer.

use std::sync::Arc;

use thiserror::Error;

use super::entry::{LedgerEntry, LedgerState};
use crate::domain::execution::ExecutionOutcome;
use crate::domain::shared::{RequestId, Timestamp};

/// Result of the atomic reserve step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// No entry existed; one was created in Pending. The caller owns completing it.
    Fresh,
    /// Another submission with this ID is still in flight.
    Pending,
    /// Terminal Completed outcome from an earlier submission.
    Completed(Arc<ExecutionOutcome>),
    /// Terminal Failed outcome from an earlier submission.
    Failed(Arc<ExecutionOutcome>),
}

/// Ledger errors. All of these indicate a programming error in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// `complete` called for an ID that was never reserved (or was evicted).
    #[error("no ledger entry for request {0}")]
    UnknownRequest(RequestId),

    /// `complete` called twice.
    #[error("ledger entry for request {request_id} is already {state}")]
    AlreadyTerminal {
        /// Request ID.
        request_id: RequestId,
        /// State the entry is already in.
        state: LedgerState,
    },
}

/// Entry counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LedgerStats {
    /// Entries awaiting completion.
    pub pending: usize,
    /// Entries completed successfully.
    pub completed: usize,
    /// Entries completed with failure.
    pub failed: usize,
}

impl LedgerStats {
    /// Total entries.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.completed + self.failed
    }
}

/// The single authority for duplicate detection.
///
/// Synchronous on purpose: every operation is a short critical section on
/// the shard that owns the key and never awaits.
pub trait LedgerStore: Send + Sync {
    /// Atomically look up `request_id`, creating a Pending entry if absent.
    ///
    /// Must be a single check-and-set. Terminal lookups are side-effect-free.
    fn lookup_or_reserve(&self, request_id: &RequestId) -> Reservation;

    /// Move a Pending entry to Completed or Failed, exactly once.
    fn complete(
        &self,
        request_id: &RequestId,
        outcome: Arc<ExecutionOutcome>,
    ) -> Result<LedgerState, LedgerError>;

    /// Snapshot of the entry for `request_id`.
    fn get(&self, request_id: &RequestId) -> Option<LedgerEntry>;

    /// Number of entries in any state.
    fn len(&self) -> usize;

    /// Whether the ledger holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry counts by state.
    fn stats(&self) -> LedgerStats;

    /// Evict terminal entries past retention (and beyond the size cap),
    /// oldest first. Pending entries are never evicted. Returns the number removed.
    fn evict_expired(&self, now: Timestamp) -> usize;
}
