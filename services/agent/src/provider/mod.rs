//! Storage provider interface.
//!
//! The provider owns volumes and snapshots. The agent only asks it to list,
//! create, tag and delete:
//! - [`AwsCliProvider`] drives the `aws ec2` command line
//! - [`MockProvider`] keeps everything in memory for tests and development

mod aws;
mod mock;

use async_trait::async_trait;
use thiserror::Error;
use volsnap_id::{IdError, SnapshotId, VolumeId};
use volsnap_policy::{Snapshot, SnapshotFilter, Tags, Volume, VolumeFilter};

pub use aws::AwsCliProvider;
pub use mock::{MockCall, MockProvider};

/// Errors returned by a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The referenced resource does not exist (or no longer exists).
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider rejected the request.
    #[error("provider error: {0}")]
    Api(String),

    /// The provider client could not be invoked.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The provider answered with something we could not decode.
    #[error("unexpected provider response: {0}")]
    Decode(String),

    /// The provider returned an unusable identifier.
    #[error("invalid identifier from provider: {0}")]
    InvalidId(#[from] IdError),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// Block-storage provider operations used by a snapshot run.
///
/// Each call is one blocking round trip. Timeouts and retries, if any, belong
/// to the implementation.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// List volumes matching `filter`.
    async fn list_volumes(&self, filter: &VolumeFilter) -> Result<Vec<Volume>, ProviderError>;

    /// Start a snapshot of `volume_id` and return its id.
    async fn create_snapshot(
        &self,
        volume_id: &VolumeId,
        description: &str,
    ) -> Result<SnapshotId, ProviderError>;

    /// Add or overwrite tags on a resource.
    async fn tag_resource(&self, resource_id: &str, tags: &Tags) -> Result<(), ProviderError>;

    /// List snapshots matching `filter`.
    async fn list_snapshots(&self, filter: &SnapshotFilter)
        -> Result<Vec<Snapshot>, ProviderError>;

    /// Delete a snapshot. Returns [`ProviderError::NotFound`] if it is already gone.
    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), ProviderError>;
}
