//! One snapshot run: discover, snapshot every volume, then apply retention.
//!
//! The run:
//! - Captures the clock once and derives the retention cutoff
//! - Discovers the named volumes attached to this instance
//! - Creates and tags one snapshot per volume
//! - Lists each volume's automated snapshots, classifies them and deletes
//!   the expired ones
//!
//! A volume whose snapshot could not be created or tagged in this run keeps
//! all of its existing snapshots: retention is skipped for it.
//!
//! Volumes are independent. With [`FailureMode::Isolate`] a failing volume
//! is recorded and the others proceed; with [`FailureMode::FailFast`]
//! volumes are processed one at a time and the run stops at the first
//! failure.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};
use volsnap_id::{InstanceId, SnapshotId, VolumeId};
use volsnap_policy::{
    classify, describe, provenance_tags, select_volumes, Clock, Decision, Reason, RunClock,
    SnapshotFilter, VolumeFilter,
};

use crate::config::{FailureMode, RunSettings};
use crate::error::AgentError;
use crate::provider::{ProviderError, SnapshotProvider};

/// Exit code for a run where at least one volume failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Step at which a volume failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Tag,
    List,
    Delete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Create => "create",
            Stage::Tag => "tag",
            Stage::List => "list",
            Stage::Delete => "delete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-volume operational failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeFailure {
    pub volume_id: VolumeId,
    pub snapshot_id: Option<SnapshotId>,
    pub stage: Stage,
    pub error: String,
}

impl VolumeFailure {
    fn new(volume_id: &VolumeId, stage: Stage, error: &ProviderError) -> Self {
        Self {
            volume_id: volume_id.clone(),
            snapshot_id: None,
            stage,
            error: error.to_string(),
        }
    }

    fn with_snapshot(mut self, snapshot_id: &SnapshotId) -> Self {
        self.snapshot_id = Some(snapshot_id.clone());
        self
    }
}

/// Result of asking the provider to delete an expired snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expired {
    Deleted,
    /// The provider no longer knows the snapshot; nothing left to do.
    AlreadyGone,
}

/// Retention outcome for one volume.
#[derive(Debug, Default)]
pub struct VolumeRetention {
    pub retained: usize,
    pub deleted: Vec<SnapshotId>,
    pub already_gone: Vec<SnapshotId>,
    pub failures: Vec<VolumeFailure>,
}

/// Summary of a whole run.
#[derive(Debug)]
pub struct RunReport {
    pub instance_id: InstanceId,
    pub clock: RunClock,
    pub discovered: Vec<VolumeId>,
    pub created: Vec<(VolumeId, SnapshotId)>,
    pub retained: usize,
    pub deleted: Vec<SnapshotId>,
    pub already_gone: Vec<SnapshotId>,
    pub failures: Vec<VolumeFailure>,

    /// Volumes left untouched by retention because their backup failed.
    pub retention_skipped: Vec<VolumeId>,

    /// Set when fail-fast stopped the run early.
    pub aborted: bool,
}

impl RunReport {
    fn new(instance_id: &InstanceId, clock: RunClock) -> Self {
        Self {
            instance_id: instance_id.clone(),
            clock,
            discovered: Vec::new(),
            created: Vec::new(),
            retained: 0,
            deleted: Vec::new(),
            already_gone: Vec::new(),
            failures: Vec::new(),
            retention_skipped: Vec::new(),
            aborted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            EXIT_PARTIAL_FAILURE
        }
    }

    /// Volumes with no fresh, tagged snapshot from this run.
    fn backup_failed(&self) -> HashSet<VolumeId> {
        self.failures
            .iter()
            .filter(|f| matches!(f.stage, Stage::Create | Stage::Tag))
            .map(|f| f.volume_id.clone())
            .collect()
    }

    fn absorb(&mut self, retention: VolumeRetention) {
        self.retained += retention.retained;
        self.deleted.extend(retention.deleted);
        self.already_gone.extend(retention.already_gone);
        self.failures.extend(retention.failures);
    }
}

/// Executes snapshot runs against a provider.
pub struct SnapshotRun<P: ?Sized> {
    provider: Arc<P>,
    settings: RunSettings,
}

impl<P> SnapshotRun<P>
where
    P: SnapshotProvider + ?Sized,
{
    pub fn new(provider: Arc<P>, settings: RunSettings) -> Self {
        Self { provider, settings }
    }

    fn width(&self) -> usize {
        match self.settings.failure_mode {
            FailureMode::FailFast => 1,
            FailureMode::Isolate => self.settings.concurrency.max(1),
        }
    }

    fn fail_fast(&self) -> bool {
        self.settings.failure_mode == FailureMode::FailFast
    }

    /// Run every stage for `instance_id`.
    ///
    /// Returns `Err` only when the run could not start or the volume set could
    /// not be enumerated. Per-volume failures are in the report.
    pub async fn execute(
        &self,
        instance_id: &InstanceId,
        clock: &dyn Clock,
    ) -> Result<RunReport, AgentError> {
        let run_clock = RunClock::start(clock, &self.settings.retention)?;
        info!(
            instance_id = %instance_id,
            started_at = %run_clock.started_at(),
            cutoff = %run_clock.cutoff(),
            retention_days = self.settings.retention.retention_days(),
            "Starting snapshot run"
        );

        let mut report = RunReport::new(instance_id, run_clock);
        report.discovered = self.discover(instance_id).await?;

        if report.discovered.is_empty() {
            info!(instance_id = %instance_id, "No eligible volumes, nothing to do");
            log_summary(&report);
            return Ok(report);
        }

        self.create_all(instance_id, &run_clock, &mut report).await;

        if report.aborted {
            warn!("Fail-fast: skipping retention after creation failure");
        } else {
            self.retire_all(&run_clock, &mut report).await;
        }

        log_summary(&report);
        Ok(report)
    }

    /// Ids of the named volumes attached to `instance_id`.
    pub async fn discover(&self, instance_id: &InstanceId) -> Result<Vec<VolumeId>, AgentError> {
        let volumes = self
            .provider
            .list_volumes(&VolumeFilter::eligible_for(instance_id))
            .await
            .map_err(|e| {
                error!(instance_id = %instance_id, error = %e, "Volume discovery failed");
                AgentError::Discovery(e)
            })?;

        let selected = select_volumes(&volumes, instance_id);
        for volume_id in &selected {
            info!(volume_id = %volume_id, "Volume discovered");
        }
        debug!(
            listed = volumes.len(),
            selected = selected.len(),
            "Volume discovery complete"
        );
        Ok(selected)
    }

    async fn create_all(&self, instance_id: &InstanceId, run: &RunClock, report: &mut RunReport) {
        let volumes = report.discovered.clone();
        let mut outcomes = stream::iter(volumes.iter())
            .map(|volume_id| async move {
                (volume_id, self.create_backup(volume_id, instance_id, run).await)
            })
            .buffer_unordered(self.width());

        while let Some((volume_id, outcome)) = outcomes.next().await {
            match outcome {
                Ok(snapshot_id) => report.created.push((volume_id.clone(), snapshot_id)),
                Err(failure) => {
                    report.failures.push(failure);
                    if self.fail_fast() {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }
    }

    async fn retire_all(&self, run: &RunClock, report: &mut RunReport) {
        let unprotected = report.backup_failed();
        let (skipped, volumes): (Vec<VolumeId>, Vec<VolumeId>) = report
            .discovered
            .iter()
            .cloned()
            .partition(|volume_id| unprotected.contains(volume_id));
        for volume_id in &skipped {
            warn!(
                volume_id = %volume_id,
                "No fresh backup this run, retention skipped"
            );
        }
        report.retention_skipped = skipped;

        let mut outcomes = stream::iter(volumes.iter())
            .map(|volume_id| self.evaluate_retention(volume_id, run))
            .buffer_unordered(self.width());

        while let Some(retention) = outcomes.next().await {
            let failed = !retention.failures.is_empty();
            report.absorb(retention);
            if failed && self.fail_fast() {
                report.aborted = true;
                break;
            }
        }
    }

    /// Create and tag one snapshot of `volume_id`.
    pub async fn create_backup(
        &self,
        volume_id: &VolumeId,
        instance_id: &InstanceId,
        run: &RunClock,
    ) -> Result<SnapshotId, VolumeFailure> {
        let (name, device) = self.lookup_volume(volume_id, instance_id).await;
        let description = describe(name.as_deref(), device.as_deref(), run.today());

        let snapshot_id = self
            .provider
            .create_snapshot(volume_id, &description)
            .await
            .map_err(|e| {
                error!(volume_id = %volume_id, error = %e, "Snapshot creation failed");
                VolumeFailure::new(volume_id, Stage::Create, &e)
            })?;
        info!(
            volume_id = %volume_id,
            snapshot_id = %snapshot_id,
            description = %description,
            "Snapshot created"
        );

        let tags = provenance_tags(name.as_deref());
        self.provider
            .tag_resource(snapshot_id.as_str(), &tags)
            .await
            .map_err(|e| {
                error!(
                    volume_id = %volume_id,
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "Snapshot tagging failed; snapshot will not be retired automatically"
                );
                VolumeFailure::new(volume_id, Stage::Tag, &e).with_snapshot(&snapshot_id)
            })?;
        debug!(snapshot_id = %snapshot_id, "Snapshot tagged");

        Ok(snapshot_id)
    }

    /// Current name and device of a volume. Best effort: any failure yields
    /// `None` for both.
    async fn lookup_volume(
        &self,
        volume_id: &VolumeId,
        instance_id: &InstanceId,
    ) -> (Option<String>, Option<String>) {
        match self.provider.list_volumes(&VolumeFilter::by_id(volume_id)).await {
            Ok(volumes) => match volumes.into_iter().find(|v| &v.id == volume_id) {
                Some(volume) => {
                    let name = volume.name().map(str::to_string);
                    let device = volume
                        .device_for(instance_id)
                        .or_else(|| volume.any_device())
                        .map(str::to_string);
                    (name, device)
                }
                None => {
                    warn!(volume_id = %volume_id, "Volume not found during lookup");
                    (None, None)
                }
            },
            Err(e) => {
                warn!(volume_id = %volume_id, error = %e, "Volume lookup failed");
                (None, None)
            }
        }
    }

    /// Classify the automated snapshots of `volume_id` and delete the expired
    /// ones.
    pub async fn evaluate_retention(
        &self,
        volume_id: &VolumeId,
        run: &RunClock,
    ) -> VolumeRetention {
        let mut outcome = VolumeRetention::default();

        let snapshots = match self
            .provider
            .list_snapshots(&SnapshotFilter::automated_for(volume_id))
            .await
        {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(volume_id = %volume_id, error = %e, "Snapshot listing failed");
                outcome
                    .failures
                    .push(VolumeFailure::new(volume_id, Stage::List, &e));
                return outcome;
            }
        };

        for classification in classify(&snapshots, run.cutoff()) {
            let snapshot_id = &classification.snapshot_id;
            let age_days = classification
                .age(run.started_at())
                .map(|age| age.num_days());

            if classification.reason == Reason::UnknownAge {
                warn!(
                    volume_id = %volume_id,
                    snapshot_id = %snapshot_id,
                    "Snapshot start time unparsable, keeping"
                );
            }

            info!(
                volume_id = %volume_id,
                snapshot_id = %snapshot_id,
                decision = %classification.decision,
                age_days = ?age_days,
                "Snapshot classified"
            );

            match classification.decision {
                Decision::Retain => {
                    outcome.retained += 1;
                    info!(snapshot_id = %snapshot_id, "Snapshot kept");
                }
                Decision::Expire => match self.expire(snapshot_id).await {
                    Ok(Expired::Deleted) => outcome.deleted.push(snapshot_id.clone()),
                    Ok(Expired::AlreadyGone) => outcome.already_gone.push(snapshot_id.clone()),
                    Err(e) => {
                        outcome.failures.push(
                            VolumeFailure::new(volume_id, Stage::Delete, &e)
                                .with_snapshot(snapshot_id),
                        );
                        if self.fail_fast() {
                            break;
                        }
                    }
                },
            }
        }

        outcome
    }

    /// Delete one expired snapshot.
    pub async fn expire(&self, snapshot_id: &SnapshotId) -> Result<Expired, ProviderError> {
        match self.provider.delete_snapshot(snapshot_id).await {
            Ok(()) => {
                info!(snapshot_id = %snapshot_id, "Snapshot deleted");
                Ok(Expired::Deleted)
            }
            Err(e) if e.is_not_found() => {
                info!(snapshot_id = %snapshot_id, "Snapshot already deleted");
                Ok(Expired::AlreadyGone)
            }
            Err(e) => {
                error!(snapshot_id = %snapshot_id, error = %e, "Snapshot deletion failed");
                Err(e)
            }
        }
    }
}

fn log_summary(report: &RunReport) {
    for failure in &report.failures {
        warn!(
            volume_id = %failure.volume_id,
            snapshot_id = ?failure.snapshot_id.as_ref().map(SnapshotId::as_str),
            stage = %failure.stage,
            error = %failure.error,
            "Volume failed"
        );
    }

    info!(
        instance_id = %report.instance_id,
        discovered = report.discovered.len(),
        created = report.created.len(),
        retained = report.retained,
        deleted = report.deleted.len(),
        already_gone = report.already_gone.len(),
        failures = report.failures.len(),
        retention_skipped = report.retention_skipped.len(),
        aborted = report.aborted,
        "Snapshot run finished"
    );
}
