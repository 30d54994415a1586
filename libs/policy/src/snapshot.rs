//! Naming and provenance of snapshots created by this automation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use volsnap_id::VolumeId;

use crate::tags::Tags;
use crate::{AUTOMATION_MARKER, CREATED_BY_TAG, NAME_TAG};

/// Description stamped on a new snapshot: `"{name} ({device}) backup {YYYY-MM-DD}"`.
///
/// Missing name or device render as empty strings.
pub fn describe(name: Option<&str>, device: Option<&str>, date: NaiveDate) -> String {
    format!(
        "{} ({}) backup {}",
        name.unwrap_or_default(),
        device.unwrap_or_default(),
        date.format("%Y-%m-%d")
    )
}

/// Tags applied to every snapshot this automation creates.
pub fn provenance_tags(name: Option<&str>) -> Tags {
    Tags::new()
        .with(CREATED_BY_TAG, AUTOMATION_MARKER)
        .with(NAME_TAG, name.unwrap_or_default())
}

/// Provider-side snapshot query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    /// Only snapshots of this volume.
    pub volume_id: VolumeId,

    /// Only snapshots carrying this exact tag.
    pub tag: Option<(String, String)>,
}

impl SnapshotFilter {
    /// Snapshots of `volume_id` attributed to this automation.
    pub fn automated_for(volume_id: &VolumeId) -> Self {
        Self {
            volume_id: volume_id.clone(),
            tag: Some((CREATED_BY_TAG.to_string(), AUTOMATION_MARKER.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_describe_full() {
        assert_eq!(
            describe(Some("web-root"), Some("/dev/xvda"), date()),
            "web-root (/dev/xvda) backup 2024-01-10"
        );
    }

    #[test]
    fn test_describe_missing_parts() {
        assert_eq!(describe(None, None, date()), " () backup 2024-01-10");
        assert_eq!(describe(Some("db"), None, date()), "db () backup 2024-01-10");
    }

    #[test]
    fn test_provenance_tags() {
        let tags = provenance_tags(Some("db"));
        assert!(tags.has("CreatedBy", "AutomatedBackup"));
        assert_eq!(tags.get("Name"), Some("db"));

        let unnamed = provenance_tags(None);
        assert_eq!(unnamed.get("Name"), Some(""));
    }

    #[test]
    fn test_automated_filter() {
        let vol = VolumeId::parse("vol-1").unwrap();
        let filter = SnapshotFilter::automated_for(&vol);
        assert_eq!(
            filter.tag,
            Some(("CreatedBy".to_string(), "AutomatedBackup".to_string()))
        );
    }
}
