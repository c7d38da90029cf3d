//! Persistence Adapters
//!
//! Implementations of the idempotency ledger. Entries live for the process
//! lifetime only; a restart forgets every request ID.

pub mod in_memory;

pub use in_memory::{InMemoryLedger, LedgerConfig};
