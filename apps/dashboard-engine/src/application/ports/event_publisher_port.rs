//! Event Publisher Port (Driven Port)
//!
//! Interface for pushing state updates to connected observers.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::execution::ExecutionOutcome;
use crate::domain::market::{AccountSnapshot, PositionSnapshot, QuoteSnapshot};

/// A state update. Payloads are immutable and shared, never copied per observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "topic", content = "data", rename_all = "snake_case")]
pub enum StateEvent {
    /// New account snapshot.
    Account(Arc<AccountSnapshot>),
    /// New positions snapshot.
    Positions(Arc<PositionSnapshot>),
    /// New quote snapshots, one per symbol.
    Quotes(Vec<Arc<QuoteSnapshot>>),
    /// Terminal execution outcome.
    Execution(Arc<ExecutionOutcome>),
}

impl StateEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Account(_) => "account",
            Self::Positions(_) => "positions",
            Self::Quotes(_) => "quotes",
            Self::Execution(_) => "execution",
        }
    }
}

/// Port for publishing state updates.
///
/// Publication is fire-and-forget and must never block on a slow observer.
pub trait EventPublisherPort: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: StateEvent);
}

/// No-op event publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl EventPublisherPort for NoOpEventPublisher {
    fn publish(&self, _event: StateEvent) {}
}
