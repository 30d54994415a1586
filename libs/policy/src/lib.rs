//! Snapshot lifecycle policy.
//!
//! Pure decision logic for automated volume snapshots:
//!
//! - **Eligibility**: which attached volumes get a snapshot ([`discovery`]).
//! - **Provenance**: how a snapshot is marked as created by this automation
//!   and described ([`snapshot`]).
//! - **Retention**: which automation-created snapshots have aged out
//!   ([`retention`]).
//!
//! # Invariants
//!
//! - A snapshot without `CreatedBy=AutomatedBackup` is never a deletion
//!   candidate, whatever its age
//! - The cutoff is computed once per run ([`RunClock`]) and every
//!   classification in that run uses the same value
//! - Decisions are deterministic given the same inputs

pub mod clock;
pub mod discovery;
pub mod error;
pub mod model;
pub mod retention;
pub mod snapshot;
pub mod tags;

pub use clock::{Clock, FixedClock, RunClock, SystemClock};
pub use discovery::{select_volumes, VolumeFilter};
pub use error::PolicyError;
pub use model::{Attachment, Snapshot, Volume};
pub use retention::{
    classify, Classification, Decision, Reason, RetentionPolicy, DEFAULT_RETENTION_DAYS,
};
pub use snapshot::{describe, provenance_tags, SnapshotFilter};
pub use tags::Tags;

/// Tag key identifying who created a snapshot.
pub const CREATED_BY_TAG: &str = "CreatedBy";

/// Value of [`CREATED_BY_TAG`] on snapshots created by this automation.
pub const AUTOMATION_MARKER: &str = "AutomatedBackup";

/// Tag key holding a resource's display name.
pub const NAME_TAG: &str = "Name";
