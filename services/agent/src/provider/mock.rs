//! In-memory provider for tests and development.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;
use volsnap_id::{SnapshotId, VolumeId};
use volsnap_policy::{Snapshot, SnapshotFilter, Tags, Volume, VolumeFilter};

use super::{ProviderError, SnapshotProvider};

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListVolumes,
    CreateSnapshot { volume_id: String, description: String },
    TagResource { resource_id: String, tags: Tags },
    ListSnapshots { volume_id: String },
    DeleteSnapshot { snapshot_id: String },
}

impl MockCall {
    /// Whether this call changes provider state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            MockCall::CreateSnapshot { .. }
                | MockCall::TagResource { .. }
                | MockCall::DeleteSnapshot { .. }
        )
    }
}

#[derive(Default)]
struct MockState {
    volumes: Vec<Volume>,
    snapshots: Vec<Snapshot>,
    snapshot_counter: u64,
    calls: Vec<MockCall>,
    fail_list_volumes: bool,
    /// Resource ids whose create/tag/list/delete calls fail.
    failing: HashSet<String>,
}

/// Mock provider backed by vectors behind a mutex.
pub struct MockProvider {
    state: Mutex<MockState>,

    /// Start time stamped on newly created snapshots.
    now: DateTime<Utc>,

    /// Ignore the tag constraint of snapshot filters, as a misbehaving
    /// provider might.
    ignore_tag_filter: bool,
}

impl MockProvider {
    /// Create an empty mock provider whose new snapshots start at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            now,
            ignore_tag_filter: false,
        }
    }

    /// Return every snapshot of a volume regardless of the requested tag.
    pub fn ignoring_tag_filter(mut self) -> Self {
        self.ignore_tag_filter = true;
        self
    }

    pub fn with_volume(self, volume: Volume) -> Self {
        self.lock().volumes.push(volume);
        self
    }

    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        self.lock().snapshots.push(snapshot);
        self
    }

    /// Make every call touching `resource_id` fail.
    pub fn failing_on(self, resource_id: &str) -> Self {
        self.lock().failing.insert(resource_id.to_string());
        self
    }

    /// Make volume listing fail.
    pub fn failing_list_volumes(self) -> Self {
        self.lock().fail_list_volumes = true;
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Snapshots currently held.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.lock().snapshots.clone()
    }

    pub fn snapshot(&self, id: &str) -> Option<Snapshot> {
        self.lock()
            .snapshots
            .iter()
            .find(|s| s.id.as_str() == id)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SnapshotProvider for MockProvider {
    async fn list_volumes(&self, filter: &VolumeFilter) -> Result<Vec<Volume>, ProviderError> {
        let mut state = self.lock();
        state.calls.push(MockCall::ListVolumes);
        if state.fail_list_volumes {
            return Err(ProviderError::Api("[MOCK] describe-volumes failed".into()));
        }
        Ok(state
            .volumes
            .iter()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect())
    }

    async fn create_snapshot(
        &self,
        volume_id: &VolumeId,
        description: &str,
    ) -> Result<SnapshotId, ProviderError> {
        let mut state = self.lock();
        state.calls.push(MockCall::CreateSnapshot {
            volume_id: volume_id.to_string(),
            description: description.to_string(),
        });
        if state.failing.contains(volume_id.as_str()) {
            return Err(ProviderError::Api(format!(
                "[MOCK] create-snapshot failed for {volume_id}"
            )));
        }
        if !state.volumes.iter().any(|v| &v.id == volume_id) {
            return Err(ProviderError::NotFound(volume_id.to_string()));
        }

        state.snapshot_counter += 1;
        let id = SnapshotId::parse(&format!("snap-mock{:08x}", state.snapshot_counter))?;
        debug!(snapshot_id = %id, volume_id = %volume_id, "[MOCK] Created snapshot");

        state.snapshots.push(Snapshot {
            id: id.clone(),
            volume_id: volume_id.clone(),
            start_time: self.now.to_rfc3339_opts(SecondsFormat::Millis, true),
            description: description.to_string(),
            tags: Tags::new(),
        });
        Ok(id)
    }

    async fn tag_resource(&self, resource_id: &str, tags: &Tags) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.calls.push(MockCall::TagResource {
            resource_id: resource_id.to_string(),
            tags: tags.clone(),
        });
        if state.failing.contains(resource_id) {
            return Err(ProviderError::Api(format!(
                "[MOCK] create-tags failed for {resource_id}"
            )));
        }
        if let Some(snapshot) = state
            .snapshots
            .iter_mut()
            .find(|s| s.id.as_str() == resource_id)
        {
            snapshot.tags.merge(tags);
            return Ok(());
        }
        if let Some(volume) = state
            .volumes
            .iter_mut()
            .find(|v| v.id.as_str() == resource_id)
        {
            volume.tags.merge(tags);
            return Ok(());
        }
        Err(ProviderError::NotFound(resource_id.to_string()))
    }

    async fn list_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        let mut state = self.lock();
        state.calls.push(MockCall::ListSnapshots {
            volume_id: filter.volume_id.to_string(),
        });
        if state.failing.contains(filter.volume_id.as_str()) {
            return Err(ProviderError::Api(format!(
                "[MOCK] describe-snapshots failed for {}",
                filter.volume_id
            )));
        }
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.volume_id == filter.volume_id)
            .filter(|s| match (&filter.tag, self.ignore_tag_filter) {
                (Some((key, value)), false) => s.tags.has(key, value),
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.calls.push(MockCall::DeleteSnapshot {
            snapshot_id: snapshot_id.to_string(),
        });
        if state.failing.contains(snapshot_id.as_str()) {
            return Err(ProviderError::Api(format!(
                "[MOCK] delete-snapshot failed for {snapshot_id}"
            )));
        }
        let before = state.snapshots.len();
        state.snapshots.retain(|s| &s.id != snapshot_id);
        if state.snapshots.len() == before {
            return Err(ProviderError::NotFound(snapshot_id.to_string()));
        }
        debug!(snapshot_id = %snapshot_id, "[MOCK] Deleted snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use volsnap_id::InstanceId;
    use volsnap_policy::Attachment;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
    }

    fn volume(id: &str) -> Volume {
        Volume {
            id: VolumeId::parse(id).unwrap(),
            tags: Tags::new().with("Name", "data"),
            attachments: vec![Attachment {
                instance_id: InstanceId::parse("i-1").unwrap(),
                device: Some("/dev/sdf".into()),
            }],
        }
    }

    #[tokio::test]
    async fn test_mock_create_and_tag() {
        let provider = MockProvider::new(now()).with_volume(volume("vol-1"));
        let vol = VolumeId::parse("vol-1").unwrap();

        let id = provider.create_snapshot(&vol, "desc").await.unwrap();
        assert!(id.as_str().starts_with("snap-mock"));

        let tags = Tags::new().with("CreatedBy", "AutomatedBackup");
        provider.tag_resource(id.as_str(), &tags).await.unwrap();

        let snap = provider.snapshot(id.as_str()).unwrap();
        assert!(snap.is_automated());
        assert_eq!(snap.start_time, "2024-01-10T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_mock_delete_twice() {
        let provider = MockProvider::new(now()).with_volume(volume("vol-1"));
        let vol = VolumeId::parse("vol-1").unwrap();
        let id = provider.create_snapshot(&vol, "desc").await.unwrap();

        provider.delete_snapshot(&id).await.unwrap();
        let err = provider.delete_snapshot(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let provider = MockProvider::new(now())
            .with_volume(volume("vol-1"))
            .failing_on("vol-1");
        let vol = VolumeId::parse("vol-1").unwrap();

        assert!(provider.create_snapshot(&vol, "desc").await.is_err());
        assert_eq!(provider.calls().len(), 1);
        assert!(provider.calls()[0].is_mutation());
    }
}
