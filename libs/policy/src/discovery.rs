//! Volume eligibility.
//!
//! A volume is backed up when it is attached to this instance and carries a
//! `Name` tag. Unnamed volumes are treated as ephemeral and skipped.

use serde::{Deserialize, Serialize};
use volsnap_id::{InstanceId, VolumeId};

use crate::model::Volume;
use crate::NAME_TAG;

/// Provider-side volume query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFilter {
    /// Only volumes attached to this instance.
    pub attached_instance: Option<InstanceId>,

    /// Only volumes carrying a tag with this key (any value).
    pub required_tag_key: Option<String>,

    /// Only these volumes.
    pub volume_ids: Vec<VolumeId>,
}

impl VolumeFilter {
    /// Volumes eligible for backup on `instance_id`.
    pub fn eligible_for(instance_id: &InstanceId) -> Self {
        Self {
            attached_instance: Some(instance_id.clone()),
            required_tag_key: Some(NAME_TAG.to_string()),
            volume_ids: Vec::new(),
        }
    }

    /// A single volume by id.
    pub fn by_id(volume_id: &VolumeId) -> Self {
        Self {
            attached_instance: None,
            required_tag_key: None,
            volume_ids: vec![volume_id.clone()],
        }
    }

    /// Whether `volume` satisfies every constraint of this filter.
    pub fn matches(&self, volume: &Volume) -> bool {
        if let Some(instance_id) = &self.attached_instance {
            if !volume.is_attached_to(instance_id) {
                return false;
            }
        }
        if let Some(key) = &self.required_tag_key {
            if !volume.tags.contains_key(key) {
                return false;
            }
        }
        self.volume_ids.is_empty() || self.volume_ids.contains(&volume.id)
    }
}

/// Select the ids of volumes eligible for backup on `instance_id`.
///
/// Applied to whatever the provider returned, so eligibility holds even when
/// the provider ignores part of the filter. Order is preserved and duplicates
/// are dropped.
pub fn select_volumes(volumes: &[Volume], instance_id: &InstanceId) -> Vec<VolumeId> {
    let filter = VolumeFilter::eligible_for(instance_id);
    let mut selected: Vec<VolumeId> = Vec::with_capacity(volumes.len());
    for volume in volumes.iter().filter(|v| filter.matches(v)) {
        if !selected.contains(&volume.id) {
            selected.push(volume.id.clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use crate::tags::Tags;

    fn instance(id: &str) -> InstanceId {
        InstanceId::parse(id).unwrap()
    }

    fn volume(id: &str, name: Option<&str>, attached_to: &[&str]) -> Volume {
        let mut tags = Tags::new().with("Env", "prod");
        if let Some(name) = name {
            tags.insert("Name", name);
        }
        Volume {
            id: VolumeId::parse(id).unwrap(),
            tags,
            attachments: attached_to
                .iter()
                .map(|i| Attachment {
                    instance_id: instance(i),
                    device: Some("/dev/xvdf".to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_selects_named_attached_volumes() {
        let me = instance("i-me");
        let volumes = vec![
            volume("vol-a", Some("root"), &["i-me"]),
            volume("vol-b", None, &["i-me"]),
            volume("vol-c", Some("data"), &["i-other"]),
            volume("vol-d", Some(""), &["i-me"]),
            volume("vol-e", Some("detached"), &[]),
        ];

        let ids: Vec<_> = select_volumes(&volumes, &me)
            .into_iter()
            .map(VolumeId::into_inner)
            .collect();
        assert_eq!(ids, vec!["vol-a", "vol-d"]);
    }

    #[test]
    fn test_empty_fleet_selects_nothing() {
        assert!(select_volumes(&[], &instance("i-me")).is_empty());
    }

    #[test]
    fn test_duplicate_records_collapse() {
        let me = instance("i-me");
        let v = volume("vol-a", Some("root"), &["i-me"]);
        let ids = select_volumes(&[v.clone(), v], &me);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_by_id_filter() {
        let target = VolumeId::parse("vol-b").unwrap();
        let filter = VolumeFilter::by_id(&target);
        assert!(filter.matches(&volume("vol-b", None, &[])));
        assert!(!filter.matches(&volume("vol-a", Some("x"), &["i-me"])));
    }
}
