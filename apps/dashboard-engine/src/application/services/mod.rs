//! Application Services
//!
//! Long-lived services that run alongside the request path: the snapshot
//! cache and the background job scheduler.

pub mod scheduler;
mod snapshot_service;

pub use scheduler::{BackgroundScheduler, JobError, JobHandler, JobSchedule, JobSpec, JobStats, RetryPolicy};
pub use snapshot_service::{SnapshotConfig, SnapshotError, SnapshotService};
