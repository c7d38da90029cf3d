//! Shared Value Objects
//!
//! Immutable domain types compared by value, not identity.

mod identifiers;
mod symbol;
mod timestamp;

pub use identifiers::{BrokerOrderId, RequestId, SessionId};
pub use symbol::Symbol;
pub use timestamp::Timestamp;
