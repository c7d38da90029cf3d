//! Use Cases
//!
//! Application operations that coordinate domain logic through the ports.

mod dispatch_execution;

pub use dispatch_execution::{DispatchError, DispatcherConfig, ExecutionDispatcher};
