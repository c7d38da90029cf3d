//! Job schedules.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};

/// How often the daily trigger is evaluated by default.
pub const DEFAULT_DAILY_TICK: Duration = Duration::from_secs(30);

/// When a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Fixed interval. The first run happens immediately.
    Every(Duration),
    /// Once per local calendar day, at or after `time` in `utc_offset`.
    /// Wall-clock time is checked every `tick`.
    DailyAt {
        /// Local time of day.
        time: NaiveTime,
        /// Offset the time is expressed in.
        utc_offset: FixedOffset,
        /// Evaluation period.
        tick: Duration,
    },
}

impl JobSchedule {
    /// Daily schedule evaluated every [`DEFAULT_DAILY_TICK`].
    #[must_use]
    pub const fn daily_at(time: NaiveTime, utc_offset: FixedOffset) -> Self {
        Self::DailyAt {
            time,
            utc_offset,
            tick: DEFAULT_DAILY_TICK,
        }
    }

    /// Period of the job's timer.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        match self {
            Self::Every(period) => *period,
            Self::DailyAt { tick, .. } => *tick,
        }
    }
}

impl fmt::Display for JobSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(period) => write!(f, "every {}ms", period.as_millis()),
            Self::DailyAt {
                time, utc_offset, ..
            } => write!(f, "daily at {time} {utc_offset}"),
        }
    }
}

/// Wall-clock gate for a daily job.
///
/// Fires at most once per local calendar day. A trigger created after the
/// configured time has passed waits for the next day.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    time: NaiveTime,
    utc_offset: FixedOffset,
    last_fired: Option<NaiveDate>,
}

impl DailyTrigger {
    /// Create a trigger as of `now`.
    #[must_use]
    pub fn new(time: NaiveTime, utc_offset: FixedOffset, now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&utc_offset);
        let last_fired = (local.time() >= time).then(|| local.date_naive());

        Self {
            time,
            utc_offset,
            last_fired,
        }
    }

    /// Whether the job should run at `now`. Records the firing when it should.
    pub fn should_fire(&mut self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.utc_offset);
        let today = local.date_naive();

        if local.time() < self.time || self.last_fired == Some(today) {
            return false;
        }

        self.last_fired = Some(today);
        true
    }

    /// Local date of the last firing.
    #[must_use]
    pub const fn last_fired(&self) -> Option<NaiveDate> {
        self.last_fired
    }
}
