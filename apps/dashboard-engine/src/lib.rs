// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::items_after_statements
    )
)]

//! Dashboard Engine - Rust Core Library
//!
//! Order-execution core for the trading dashboard backend.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: value objects and invariants with no I/O
//!   - `execution`: execution requests, order specs, outcomes, trading mode
//!   - `idempotency`: ledger entries, reservations, the `LedgerStore` contract
//!   - `market`: immutable account/position/quote snapshots
//!
//! - **Application**: orchestration
//!   - `ports`: `BrokerPort`, `EventPublisherPort`
//!   - `use_cases`: `ExecutionDispatcher`
//!   - `services`: `SnapshotService`, `BackgroundScheduler` and its jobs
//!
//! - **Infrastructure**: adapters
//!   - `broker`: Alpaca REST adapter, simulated venue
//!   - `broadcast`: `StateBroadcaster` fan-out with per-subscriber queues
//!   - `persistence`: sharded in-memory idempotency ledger
//!   - `http`: axum REST + WebSocket gateway

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases, services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Ambient
// =============================================================================

/// YAML configuration with environment interpolation.
pub mod config;

/// Prometheus metrics.
pub mod observability;

/// Tracing subscriber and OpenTelemetry setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::execution::{
    ExecutionOutcome, ExecutionRequest, OrderResult, OrderResultStatus, OrderSide, OrderSpec,
    OrderType, OutcomeStatus, TradingMode, Venue,
};
pub use domain::idempotency::{LedgerEntry, LedgerError, LedgerState, LedgerStore, Reservation};
pub use domain::market::{Account, AccountSnapshot, Position, PositionSnapshot, Quote, QuoteSnapshot};
pub use domain::shared::{BrokerOrderId, RequestId, SessionId, Symbol, Timestamp};

pub use application::dto::DispatchResponse;
pub use application::ports::{BrokerError, BrokerPort, EventPublisherPort, StateEvent};
pub use application::services::{BackgroundScheduler, SnapshotService};
pub use application::use_cases::{DispatchError, DispatcherConfig, ExecutionDispatcher};

pub use infrastructure::broadcast::{StateBroadcaster, Subscription, Topic};
pub use infrastructure::broker::alpaca::{AlpacaBrokerAdapter, AlpacaConfig};
pub use infrastructure::broker::simulated::SimulatedBroker;
pub use infrastructure::http::{AppState, create_router};
pub use infrastructure::persistence::InMemoryLedger;
