//! Idempotency Bounded Context
//!
//! Maps client request IDs to execution outcomes. An entry is reserved in
//! Pending before any order is submitted and moves to a terminal state
//! exactly once.

mod entry;
mod store;

pub use entry::{LedgerEntry, LedgerState};
pub use store::{LedgerError, LedgerStats, LedgerStore, Reservation};
