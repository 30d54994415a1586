//! Time source and the per-run time values derived from it.
//!
//! The wall clock is read exactly once per run, in [`RunClock::start`].
//! Everything downstream works from the captured instant and cutoff.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::PolicyError;
use crate::retention::RetentionPolicy;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Used to pin classification in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Time values fixed at run start and shared read-only by every volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    started_at: DateTime<Utc>,
    cutoff: DateTime<Utc>,
}

impl RunClock {
    /// Capture `now` once and derive the retention cutoff from it.
    pub fn start(clock: &dyn Clock, policy: &RetentionPolicy) -> Result<Self, PolicyError> {
        let started_at = clock.now();
        let cutoff = policy.cutoff(started_at)?;
        Ok(Self { started_at, cutoff })
    }

    /// Instant the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshots created at or before this instant are expired.
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Calendar date (UTC) of the run, used in snapshot descriptions.
    pub fn today(&self) -> NaiveDate {
        self.started_at.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_run_clock_captures_once() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let policy = RetentionPolicy::new(7).unwrap();
        let run = RunClock::start(&FixedClock::at(now), &policy).unwrap();

        assert_eq!(run.started_at(), now);
        assert_eq!(run.cutoff(), now - Duration::days(7));
        assert_eq!(run.today(), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
