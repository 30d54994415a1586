//! Provider backed by the AWS command line.
//!
//! Every operation is one `aws ec2 <op> --output json` invocation. Filters and
//! tags are passed as JSON documents so names containing commas or spaces
//! survive intact. The CLI handles credentials, pagination and its own retry
//! policy.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;
use volsnap_id::{InstanceId, SnapshotId, VolumeId};
use volsnap_policy::{Attachment, Snapshot, SnapshotFilter, Tags, Volume, VolumeFilter};

use super::{ProviderError, SnapshotProvider};

/// Error code suffix the EC2 API uses for missing resources.
const NOT_FOUND_MARKER: &str = ".NotFound";

/// Drives `aws ec2` for a single region.
pub struct AwsCliProvider {
    program: PathBuf,
    region: String,
}

impl AwsCliProvider {
    pub fn new(program: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            region: region.into(),
        }
    }

    /// Full argument list for an `ec2` operation.
    fn args(&self, operation: &str, rest: Vec<String>) -> Vec<String> {
        let mut args = vec![
            "ec2".to_string(),
            operation.to_string(),
            "--region".to_string(),
            self.region.clone(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(rest);
        args
    }

    /// Run an operation and return its stdout.
    async fn run(&self, operation: &str, rest: Vec<String>) -> Result<Vec<u8>, ProviderError> {
        let args = self.args(operation, rest);
        debug!(program = %self.program.display(), operation, "Invoking aws cli");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(operation, &stderr));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl SnapshotProvider for AwsCliProvider {
    async fn list_volumes(&self, filter: &VolumeFilter) -> Result<Vec<Volume>, ProviderError> {
        let stdout = self
            .run("describe-volumes", volume_filter_args(filter))
            .await?;
        parse_volumes(&stdout)
    }

    async fn create_snapshot(
        &self,
        volume_id: &VolumeId,
        description: &str,
    ) -> Result<SnapshotId, ProviderError> {
        let stdout = self
            .run(
                "create-snapshot",
                vec![
                    "--volume-id".to_string(),
                    volume_id.to_string(),
                    "--description".to_string(),
                    description.to_string(),
                ],
            )
            .await?;
        parse_created_snapshot(&stdout)
    }

    async fn tag_resource(&self, resource_id: &str, tags: &Tags) -> Result<(), ProviderError> {
        self.run(
            "create-tags",
            vec![
                "--resources".to_string(),
                resource_id.to_string(),
                "--tags".to_string(),
                tags_json(tags),
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        let stdout = self
            .run("describe-snapshots", snapshot_filter_args(filter))
            .await?;
        parse_snapshots(&stdout)
    }

    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), ProviderError> {
        self.run(
            "delete-snapshot",
            vec!["--snapshot-id".to_string(), snapshot_id.to_string()],
        )
        .await?;
        Ok(())
    }
}

// =============================================================================
// Request encoding
// =============================================================================

fn volume_filter_args(filter: &VolumeFilter) -> Vec<String> {
    let mut args = Vec::new();
    if !filter.volume_ids.is_empty() {
        args.push("--volume-ids".to_string());
        args.extend(filter.volume_ids.iter().map(ToString::to_string));
    }

    let mut filters = Vec::new();
    if let Some(instance_id) = &filter.attached_instance {
        filters.push(json!({"Name": "attachment.instance-id", "Values": [instance_id.as_str()]}));
    }
    if let Some(key) = &filter.required_tag_key {
        filters.push(json!({"Name": "tag-key", "Values": [key]}));
    }
    if !filters.is_empty() {
        args.push("--filters".to_string());
        args.push(serde_json::Value::Array(filters).to_string());
    }
    args
}

fn snapshot_filter_args(filter: &SnapshotFilter) -> Vec<String> {
    let mut filters = vec![json!({"Name": "volume-id", "Values": [filter.volume_id.as_str()]})];
    if let Some((key, value)) = &filter.tag {
        filters.push(json!({"Name": format!("tag:{key}"), "Values": [value]}));
    }
    vec![
        "--owner-ids".to_string(),
        "self".to_string(),
        "--filters".to_string(),
        serde_json::Value::Array(filters).to_string(),
    ]
}

fn tags_json(tags: &Tags) -> String {
    let list: Vec<_> = tags
        .iter()
        .map(|(k, v)| json!({"Key": k, "Value": v}))
        .collect();
    serde_json::Value::Array(list).to_string()
}

/// Map a failed invocation to a provider error.
fn classify_failure(operation: &str, stderr: &str) -> ProviderError {
    let message = stderr.trim();
    if message.contains(NOT_FOUND_MARKER) {
        ProviderError::NotFound(message.to_string())
    } else if message.is_empty() {
        ProviderError::Api(format!("{operation} failed with no output"))
    } else {
        ProviderError::Api(format!("{operation}: {message}"))
    }
}

// =============================================================================
// Response decoding
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsTag {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsAttachment {
    instance_id: String,
    #[serde(default)]
    device: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsVolume {
    volume_id: String,
    #[serde(default)]
    tags: Vec<AwsTag>,
    #[serde(default)]
    attachments: Vec<AwsAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVolumesOutput {
    #[serde(default)]
    volumes: Vec<AwsVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsSnapshot {
    snapshot_id: String,
    volume_id: String,
    #[serde(default)]
    start_time: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<AwsTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSnapshotsOutput {
    #[serde(default)]
    snapshots: Vec<AwsSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSnapshotOutput {
    snapshot_id: String,
}

fn into_tags(tags: Vec<AwsTag>) -> Tags {
    tags.into_iter().map(|t| (t.key, t.value)).collect()
}

fn decode<'a, T: Deserialize<'a>>(stdout: &'a [u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(stdout).map_err(|e| ProviderError::Decode(e.to_string()))
}

fn parse_volumes(stdout: &[u8]) -> Result<Vec<Volume>, ProviderError> {
    let output: DescribeVolumesOutput = decode(stdout)?;
    output
        .volumes
        .into_iter()
        .map(|v| -> Result<Volume, ProviderError> {
            let attachments = v
                .attachments
                .into_iter()
                .map(|a| -> Result<Attachment, ProviderError> {
                    Ok(Attachment {
                        instance_id: InstanceId::try_from(a.instance_id)?,
                        device: a.device,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Volume {
                id: VolumeId::try_from(v.volume_id)?,
                tags: into_tags(v.tags),
                attachments,
            })
        })
        .collect()
}

fn parse_snapshots(stdout: &[u8]) -> Result<Vec<Snapshot>, ProviderError> {
    let output: DescribeSnapshotsOutput = decode(stdout)?;
    output
        .snapshots
        .into_iter()
        .map(|s| -> Result<Snapshot, ProviderError> {
            Ok(Snapshot {
                id: SnapshotId::try_from(s.snapshot_id)?,
                volume_id: VolumeId::try_from(s.volume_id)?,
                start_time: s.start_time,
                description: s.description,
                tags: into_tags(s.tags),
            })
        })
        .collect()
}

fn parse_created_snapshot(stdout: &[u8]) -> Result<SnapshotId, ProviderError> {
    let output: CreateSnapshotOutput = decode(stdout)?;
    Ok(SnapshotId::try_from(output.snapshot_id)?)
}
