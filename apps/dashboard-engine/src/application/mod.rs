//! Application Layer
//!
//! Orchestrates the domain against the ports:
//!
//! - [`ports`]: driven ports (`BrokerPort`, `EventPublisherPort`)
//! - [`dto`]: dispatcher responses crossing the API boundary
//! - [`use_cases`]: `ExecutionDispatcher`
//! - [`services`]: `SnapshotService`, `BackgroundScheduler` and its jobs
//! - [`retry`]: backoff shared by jobs and broker reads

pub mod dto;
pub mod ports;
pub mod retry;
pub mod services;
pub mod use_cases;
