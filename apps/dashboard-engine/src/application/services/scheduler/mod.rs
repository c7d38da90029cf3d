//! Background Scheduler
//!
//! Runs named jobs on independent timers, off the request path.
//!
//! # Guarantees
//!
//! - A job never has two runs in flight. A tick that finds the previous run
//!   still going is skipped, not queued.
//! - Each run executes on its own task. Errors and panics are caught,
//!   counted and logged; later runs are unaffected.
//! - Transient failures are retried inside the run with the job's own
//!   backoff policy.
//! - Jobs do not share a lock, so independent jobs run concurrently.

pub mod jobs;
mod schedule;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::shared::Timestamp;
use crate::observability::metrics;

pub use jobs::{AccountRefreshJob, DailyAccountSummaryJob, LedgerSweepJob, QuoteRefreshJob};
pub use crate::application::retry::{ExponentialBackoff, RetryPolicy};
pub use schedule::{DEFAULT_DAILY_TICK, DailyTrigger, JobSchedule};

/// Job run failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Worth retrying (network hiccup, rate limit, timeout).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Not worth retrying in this run.
    #[error("fatal failure: {0}")]
    Fatal(String),
}

/// Work performed by a scheduled job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Perform one run.
    async fn run(&self) -> Result<(), JobError>;
}

/// A job registration.
pub struct JobSpec {
    /// Unique job name, used in logs, metrics and [`BackgroundScheduler::stats`].
    pub name: String,
    /// When the job runs.
    pub schedule: JobSchedule,
    /// What the job does.
    pub handler: Arc<dyn JobHandler>,
    /// Retry policy for transient failures within a run.
    pub retry: RetryPolicy,
}

impl JobSpec {
    /// Create a job with the default retry policy.
    pub fn new(name: impl Into<String>, schedule: JobSchedule, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            name: name.into(),
            schedule,
            handler,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// How a finished run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Handler returned `Ok`.
    Succeeded,
    /// Handler returned an error after any retries.
    Failed,
    /// Handler panicked.
    Panicked,
}

impl RunOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Panicked => "panicked",
        }
    }
}

/// Counters for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    /// Finished runs.
    pub runs: u64,
    /// Runs that succeeded.
    pub successes: u64,
    /// Runs that failed or panicked.
    pub failures: u64,
    /// Ticks skipped because a run was still in flight.
    pub skipped: u64,
    /// Retries across all runs.
    pub retries: u64,
    /// Outcome of the most recent run.
    pub last_outcome: Option<RunOutcome>,
    /// When the most recent run finished.
    pub last_finished_at: Option<Timestamp>,
}

struct JobState {
    spec: JobSpec,
    running: Arc<tokio::sync::Mutex<()>>,
    stats: parking_lot::Mutex<JobStats>,
}

impl JobState {
    fn name(&self) -> &str {
        &self.spec.name
    }

    /// Run the handler, retrying transient failures. Returns the final result
    /// and the number of retries spent.
    async fn run_with_retry(&self) -> (Result<(), JobError>, u32) {
        let mut backoff = self.spec.retry.backoff();

        loop {
            match self.spec.handler.run().await {
                Ok(()) => return (Ok(()), backoff.attempt()),
                Err(JobError::Transient(message)) => {
                    let Some(delay) = backoff.next_backoff() else {
                        return (Err(JobError::Transient(message)), backoff.attempt());
                    };
                    tracing::warn!(
                        job = self.name(),
                        retry = backoff.attempt(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %message,
                        "Transient job failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(fatal) => return (Err(fatal), backoff.attempt()),
            }
        }
    }

    fn record(&self, outcome: RunOutcome, retries: u32, elapsed_secs: f64) {
        {
            let mut stats = self.stats.lock();
            stats.runs += 1;
            stats.retries += u64::from(retries);
            match outcome {
                RunOutcome::Succeeded => stats.successes += 1,
                RunOutcome::Failed | RunOutcome::Panicked => stats.failures += 1,
            }
            stats.last_outcome = Some(outcome);
            stats.last_finished_at = Some(Timestamp::now());
        }
        metrics::record_job_run(self.name(), outcome.as_str(), elapsed_secs);
    }

    fn record_skip(&self) {
        self.stats.lock().skipped += 1;
        metrics::record_job_run(self.name(), "skipped", 0.0);
        tracing::debug!(job = self.name(), "Previous run still in flight, skipping tick");
    }
}

/// Runs registered jobs on their schedules.
#[derive(Default)]
pub struct BackgroundScheduler {
    jobs: Vec<Arc<JobState>>,
}

impl BackgroundScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. A job registered under an existing name replaces it.
    pub fn register(&mut self, spec: JobSpec) {
        self.jobs.retain(|job| job.spec.name != spec.name);
        tracing::info!(job = %spec.name, schedule = %spec.schedule, "Registered job");
        self.jobs.push(Arc::new(JobState {
            spec,
            running: Arc::new(tokio::sync::Mutex::new(())),
            stats: parking_lot::Mutex::new(JobStats::default()),
        }));
    }

    /// Names of registered jobs, in registration order.
    #[must_use]
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// Counters for `name`.
    #[must_use]
    pub fn stats(&self, name: &str) -> Option<JobStats> {
        self.jobs
            .iter()
            .find(|job| job.name() == name)
            .map(|job| job.stats.lock().clone())
    }

    /// Start one timer task per job. Timers stop when `cancel` fires; runs
    /// already in flight are left to finish.
    pub fn start(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        self.jobs
            .iter()
            .map(|job| tokio::spawn(run_timer(Arc::clone(job), cancel.clone())))
            .collect()
    }
}

async fn run_timer(job: Arc<JobState>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(job.spec.schedule.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut trigger = match job.spec.schedule {
        JobSchedule::Every(_) => None,
        JobSchedule::DailyAt {
            time, utc_offset, ..
        } => Some(DailyTrigger::new(time, utc_offset, Utc::now())),
    };

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(job = job.name(), "Job timer stopped");
                break;
            }
            _ = interval.tick() => {}
        }

        if let Some(trigger) = trigger.as_mut()
            && !trigger.should_fire(Utc::now())
        {
            continue;
        }

        launch(&job);
    }
}

/// Start a run unless one is already in flight.
fn launch(job: &Arc<JobState>) {
    let Ok(guard) = Arc::clone(&job.running).try_lock_owned() else {
        job.record_skip();
        return;
    };

    let job = Arc::clone(job);
    tokio::spawn(async move {
        let _guard = guard;
        let started = Instant::now();

        let runner = Arc::clone(&job);
        let run = tokio::spawn(async move { runner.run_with_retry().await });

        let (outcome, retries) = match run.await {
            Ok((Ok(()), retries)) => {
                tracing::debug!(job = job.name(), retries, "Job run succeeded");
                (RunOutcome::Succeeded, retries)
            }
            Ok((Err(e), retries)) => {
                tracing::error!(job = job.name(), retries, error = %e, "Job run failed");
                (RunOutcome::Failed, retries)
            }
            Err(e) => {
                tracing::error!(job = job.name(), error = %e, "Job run panicked");
                (RunOutcome::Panicked, 0)
            }
        };

        job.record(outcome, retries, started.elapsed().as_secs_f64());
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Handler that behaves according to the 1-based call number.
    struct ScriptedHandler {
        calls: AtomicUsize,
        script: fn(usize) -> Result<(), JobError>,
        hold: Duration,
    }

    impl ScriptedHandler {
        fn new(script: fn(usize) -> Result<(), JobError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script,
                hold: Duration::ZERO,
            })
        }

        fn holding(hold: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: |_| Ok(()),
                hold,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for ScriptedHandler {
        async fn run(&self) -> Result<(), JobError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.hold.is_zero() {
                tokio::time::sleep(self.hold).await;
            }
            (self.script)(call)
        }
    }

    fn no_retry(name: &str, period: Duration, handler: Arc<dyn JobHandler>) -> JobSpec {
        JobSpec::new(name, JobSchedule::Every(period), handler).with_retry(RetryPolicy::none())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_does_not_cancel_next_run() {
        let handler = ScriptedHandler::new(|call| {
            if call == 1 {
                Err(JobError::Fatal("quote source down".to_string()))
            } else {
                Ok(())
            }
        });

        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(no_retry("quote-refresh", Duration::from_secs(30), handler.clone()));
        let cancel = CancellationToken::new();
        let handles = scheduler.start(&cancel);

        tokio::time::sleep(Duration::from_secs(65)).await;

        assert_eq!(handler.calls(), 3);
        let stats = scheduler.stats("quote-refresh").unwrap();
        assert_eq!(stats.runs, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.last_outcome, Some(RunOutcome::Succeeded));

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_run_is_caught_and_counted() {
        let handler = ScriptedHandler::new(|call| {
            assert!(call != 1, "handler bug");
            Ok(())
        });

        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(no_retry("flaky", Duration::from_secs(10), handler.clone()));
        let cancel = CancellationToken::new();
        let _handles = scheduler.start(&cancel);

        tokio::time::sleep(Duration::from_secs(15)).await;

        let stats = scheduler.stats("flaky").unwrap();
        assert_eq!(handler.calls(), 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, 1);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn busy_job_skips_ticks_instead_of_queueing() {
        let handler = ScriptedHandler::holding(Duration::from_secs(45));

        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(no_retry("slow", Duration::from_secs(10), handler.clone()));
        let cancel = CancellationToken::new();
        let _handles = scheduler.start(&cancel);

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(handler.calls(), 1);
        let stats = scheduler.stats("slow").unwrap();
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.runs, 0);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn busy_job_does_not_block_other_jobs() {
        let slow = ScriptedHandler::holding(Duration::from_secs(3600));
        let fast = ScriptedHandler::new(|_| Ok(()));

        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(no_retry("slow", Duration::from_secs(10), slow.clone()));
        scheduler.register(no_retry("fast", Duration::from_secs(10), fast.clone()));
        let cancel = CancellationToken::new();
        let _handles = scheduler.start(&cancel);

        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(slow.calls(), 1);
        assert_eq!(fast.calls(), 3);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_within_the_run() {
        let handler = ScriptedHandler::new(|call| {
            if call <= 2 {
                Err(JobError::Transient("rate limited".to_string()))
            } else {
                Ok(())
            }
        });

        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(
            JobSpec::new("account-refresh", JobSchedule::Every(Duration::from_secs(3600)), handler.clone())
                .with_retry(RetryPolicy {
                    max_retries: 3,
                    initial_backoff: Duration::from_millis(100),
                    max_backoff: Duration::from_secs(1),
                    backoff_multiplier: 2.0,
                    jitter_factor: 0.0,
                }),
        );
        let cancel = CancellationToken::new();
        let _handles = scheduler.start(&cancel);

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(handler.calls(), 3);
        let stats = scheduler.stats("account-refresh").unwrap();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.successes, 1);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_is_not_retried() {
        let handler = ScriptedHandler::new(|_| Err(JobError::Fatal("bad credentials".to_string())));

        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(JobSpec::new(
            "account-refresh",
            JobSchedule::Every(Duration::from_secs(3600)),
            handler.clone(),
        ));
        let cancel = CancellationToken::new();
        let _handles = scheduler.start(&cancel);

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(handler.calls(), 1);
        assert_eq!(scheduler.stats("account-refresh").unwrap().failures, 1);
        cancel.cancel();
    }

    #[test]
    fn registering_same_name_replaces() {
        let mut scheduler = BackgroundScheduler::new();
        scheduler.register(no_retry("a", Duration::from_secs(1), ScriptedHandler::new(|_| Ok(()))));
        scheduler.register(no_retry("b", Duration::from_secs(1), ScriptedHandler::new(|_| Ok(()))));
        scheduler.register(no_retry("a", Duration::from_secs(2), ScriptedHandler::new(|_| Ok(()))));

        assert_eq!(scheduler.job_names(), vec!["b", "a"]);
        assert!(scheduler.stats("missing").is_none());
    }
}
