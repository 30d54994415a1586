//! Age-based retention of automation-created snapshots.
//!
//! # Rules
//!
//! - Only snapshots tagged `CreatedBy=AutomatedBackup` are candidates. Any
//!   other snapshot is left out of the result entirely, whatever its age.
//! - A candidate expires when its start time is at or before the cutoff.
//!   A snapshot exactly `retention_days` old is expired, not kept for one
//!   more cycle.
//! - A candidate whose start time cannot be parsed is retained.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use volsnap_id::SnapshotId;

use crate::error::PolicyError;
use crate::model::Snapshot;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Maximum age a snapshot may reach before it is eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    retention_days: u32,
}

impl RetentionPolicy {
    /// Create a policy. The window must be at least one day.
    pub fn new(retention_days: u32) -> Result<Self, PolicyError> {
        if retention_days == 0 {
            return Err(PolicyError::InvalidRetention(retention_days));
        }
        Ok(Self { retention_days })
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Absolute cutoff for a run starting at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, PolicyError> {
        let window = Duration::try_days(i64::from(self.retention_days)).ok_or(
            PolicyError::CutoffOutOfRange {
                days: self.retention_days,
            },
        )?;
        now.checked_sub_signed(window)
            .ok_or(PolicyError::CutoffOutOfRange {
                days: self.retention_days,
            })
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Outcome of classifying one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Retain,
    Expire,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::Expire => "expire",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a snapshot got its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Start time is after the cutoff.
    WithinWindow,

    /// Start time is at or before the cutoff.
    PastCutoff,

    /// Start time could not be parsed; kept to avoid deleting on bad data.
    UnknownAge,
}

/// Classification of a single candidate snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub snapshot_id: SnapshotId,
    pub decision: Decision,
    pub reason: Reason,

    /// Parsed start time, absent when unparsable.
    pub started_at: Option<DateTime<Utc>>,
}

impl Classification {
    /// Age relative to `now`, when the start time is known.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at.map(|t| now - t)
    }
}

/// Parse a provider timestamp (RFC 3339, e.g. `2024-01-02T03:04:05.000Z`).
pub fn parse_start_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Decide a single start time against the cutoff.
pub fn decide(started_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> Decision {
    if started_at <= cutoff {
        Decision::Expire
    } else {
        Decision::Retain
    }
}

/// Classify the automation-created snapshots in `snapshots` against `cutoff`.
///
/// Snapshots without the provenance marker are skipped. Input order is
/// preserved.
pub fn classify<'a, I>(snapshots: I, cutoff: DateTime<Utc>) -> Vec<Classification>
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    snapshots
        .into_iter()
        .filter(|s| s.is_automated())
        .map(|s| match parse_start_time(&s.start_time) {
            Some(started_at) => {
                let decision = decide(started_at, cutoff);
                let reason = match decision {
                    Decision::Expire => Reason::PastCutoff,
                    Decision::Retain => Reason::WithinWindow,
                };
                Classification {
                    snapshot_id: s.id.clone(),
                    decision,
                    reason,
                    started_at: Some(started_at),
                }
            }
            None => Classification {
                snapshot_id: s.id.clone(),
                decision: Decision::Retain,
                reason: Reason::UnknownAge,
                started_at: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tags;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;
    use volsnap_id::VolumeId;

    fn snapshot(id: &str, start_time: &str, automated: bool) -> Snapshot {
        let tags = if automated {
            Tags::new()
                .with("CreatedBy", "AutomatedBackup")
                .with("Name", "data")
        } else {
            Tags::new().with("Name", "manual")
        };
        Snapshot {
            id: SnapshotId::parse(id).unwrap(),
            volume_id: VolumeId::parse("vol-1").unwrap(),
            start_time: start_time.to_string(),
            description: String::new(),
            tags,
        }
    }

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_day_window_rejected() {
        assert_eq!(
            RetentionPolicy::new(0),
            Err(PolicyError::InvalidRetention(0))
        );
    }

    #[test]
    fn test_default_window() {
        assert_eq!(RetentionPolicy::default().retention_days(), 30);
    }

    #[test]
    fn test_cutoff_out_of_range() {
        let policy = RetentionPolicy::new(u32::MAX).unwrap();
        let early = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            policy.cutoff(early),
            Err(PolicyError::CutoffOutOfRange { .. })
        ));
    }

    #[test]
    fn test_seven_day_window_scenario() {
        let cutoff = RetentionPolicy::new(7).unwrap().cutoff(jan(10)).unwrap();
        let snaps = vec![
            snapshot("snap-old", "2024-01-02T00:00:00.000Z", true),
            snapshot("snap-new", "2024-01-04T00:00:00.000Z", true),
            snapshot("snap-manual", "2023-01-01T00:00:00.000Z", false),
        ];

        let result = classify(&snaps, cutoff);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].snapshot_id.as_str(), "snap-old");
        assert_eq!(result[0].decision, Decision::Expire);
        assert_eq!(result[1].snapshot_id.as_str(), "snap-new");
        assert_eq!(result[1].decision, Decision::Retain);
        assert!(result.iter().all(|c| c.snapshot_id.as_str() != "snap-manual"));
    }

    #[rstest]
    #[case("2024-01-03T00:00:00Z", Decision::Expire)]
    #[case("2024-01-03T00:00:01Z", Decision::Retain)]
    #[case("2024-01-02T23:59:59Z", Decision::Expire)]
    #[case("2024-01-03T01:00:00+01:00", Decision::Expire)]
    fn test_cutoff_is_inclusive(#[case] start: &str, #[case] expected: Decision) {
        let cutoff = RetentionPolicy::new(7).unwrap().cutoff(jan(10)).unwrap();
        assert_eq!(cutoff, jan(3));

        let result = classify(&[snapshot("snap-1", start, true)], cutoff);
        assert_eq!(result[0].decision, expected);
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-01T00:00:00Z")]
    #[case("2024-01-01")]
    fn test_unparsable_start_time_is_retained(#[case] raw: &str) {
        let result = classify(&[snapshot("snap-1", raw, true)], jan(10));
        assert_eq!(result[0].decision, Decision::Retain);
        assert_eq!(result[0].reason, Reason::UnknownAge);
        assert!(result[0].started_at.is_none());
        assert!(result[0].age(jan(10)).is_none());
    }

    #[test]
    fn test_age_reported() {
        let result = classify(&[snapshot("snap-1", "2024-01-08T00:00:00Z", true)], jan(3));
        assert_eq!(result[0].age(jan(10)), Some(Duration::days(2)));
        assert_eq!(result[0].reason, Reason::WithinWindow);
    }

    proptest! {
        #[test]
        fn prop_untagged_snapshots_never_classified(offset_days in -4000i64..4000) {
            let start = jan(10) + Duration::days(offset_days);
            let snap = snapshot("snap-x", &start.to_rfc3339(), false);
            prop_assert!(classify(&[snap], jan(10)).is_empty());
        }

        #[test]
        fn prop_decision_matches_cutoff_comparison(offset_secs in -1_000_000i64..1_000_000) {
            let cutoff = jan(3);
            let start = cutoff + Duration::seconds(offset_secs);
            let snap = snapshot("snap-x", &start.to_rfc3339(), true);
            let result = classify(&[snap], cutoff);
            let expected = if offset_secs <= 0 { Decision::Expire } else { Decision::Retain };
            prop_assert_eq!(result[0].decision, expected);
        }
    }
}
