//! Provider records as seen at discovery time.
//!
//! These are read-only copies of provider state. volsnap never mutates a
//! record in place; it asks the provider to create, tag or delete and then
//! re-reads.

use serde::{Deserialize, Serialize};
use volsnap_id::{InstanceId, SnapshotId, VolumeId};

use crate::tags::Tags;
use crate::{AUTOMATION_MARKER, CREATED_BY_TAG, NAME_TAG};

/// Attachment of a volume to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Instance the volume is attached to.
    pub instance_id: InstanceId,

    /// Device path on that instance (e.g. `/dev/xvda`).
    #[serde(default)]
    pub device: Option<String>,
}

/// A block-storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,

    #[serde(default)]
    pub tags: Tags,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Volume {
    /// Display name, taken from the `Name` tag.
    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_TAG)
    }

    /// Whether the volume is attached to `instance_id`.
    pub fn is_attached_to(&self, instance_id: &InstanceId) -> bool {
        self.attachments
            .iter()
            .any(|a| &a.instance_id == instance_id)
    }

    /// Device path of the attachment to `instance_id`, if any.
    pub fn device_for(&self, instance_id: &InstanceId) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| &a.instance_id == instance_id)
            .and_then(|a| a.device.as_deref())
    }

    /// Device path of the first attachment that reports one.
    pub fn any_device(&self) -> Option<&str> {
        self.attachments.iter().find_map(|a| a.device.as_deref())
    }
}

/// A point-in-time snapshot of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,

    pub volume_id: VolumeId,

    /// Creation timestamp exactly as the provider reported it. Parsed during
    /// classification so that a malformed value can be retained instead of
    /// failing the listing.
    pub start_time: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Tags,
}

impl Snapshot {
    /// Whether this snapshot carries the automation provenance marker and may
    /// therefore be deleted by retention.
    pub fn is_automated(&self) -> bool {
        self.tags.has(CREATED_BY_TAG, AUTOMATION_MARKER)
    }

    /// Display name, taken from the `Name` tag.
    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(attachments: Vec<(&str, Option<&str>)>) -> Volume {
        Volume {
            id: VolumeId::parse("vol-1").unwrap(),
            tags: Tags::new().with("Name", "data"),
            attachments: attachments
                .into_iter()
                .map(|(i, d)| Attachment {
                    instance_id: InstanceId::parse(i).unwrap(),
                    device: d.map(str::to_string),
                })
                .collect(),
        }
    }

    #[test]
    fn test_device_for_matches_instance() {
        let v = volume(vec![("i-a", Some("/dev/sdf")), ("i-b", Some("/dev/sdg"))]);
        let b = InstanceId::parse("i-b").unwrap();
        assert_eq!(v.device_for(&b), Some("/dev/sdg"));
        assert!(v.is_attached_to(&b));

        let c = InstanceId::parse("i-c").unwrap();
        assert_eq!(v.device_for(&c), None);
        assert!(!v.is_attached_to(&c));
    }

    #[test]
    fn test_any_device_skips_missing() {
        let v = volume(vec![("i-a", None), ("i-b", Some("/dev/sdg"))]);
        assert_eq!(v.any_device(), Some("/dev/sdg"));
    }

    #[test]
    fn test_snapshot_is_automated() {
        let mut snap = Snapshot {
            id: SnapshotId::parse("snap-1").unwrap(),
            volume_id: VolumeId::parse("vol-1").unwrap(),
            start_time: "2024-01-01T00:00:00Z".to_string(),
            description: String::new(),
            tags: Tags::new(),
        };
        assert!(!snap.is_automated());

        snap.tags.insert("CreatedBy", "Someone");
        assert!(!snap.is_automated());

        snap.tags.insert("CreatedBy", "AutomatedBackup");
        assert!(snap.is_automated());
    }
}
