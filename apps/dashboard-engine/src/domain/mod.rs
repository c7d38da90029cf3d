//! Domain Layer
//!
//! The innermost layer: value objects, invariants and persistence contracts
//! with zero infrastructure dependencies.
//!
//! # Bounded Contexts
//!
//! - [`execution`]: execution requests, per-order results, trading mode
//! - [`idempotency`]: ledger entries and the atomic reserve contract
//! - [`market`]: immutable account/position/quote snapshots

pub mod execution;
pub mod idempotency;
pub mod market;
pub mod shared;
