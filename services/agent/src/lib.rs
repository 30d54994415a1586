//! volsnap agent library
//!
//! Runs on an instance and manages the snapshots of its attached volumes.
//! Each invocation is one stateless run:
//!
//! ```text
//! preflight ─► audit log ─► identity ─► discovery ─► create + tag ─► retention
//! ```
//!
//! ## Modules
//!
//! - `config`: command-line/environment settings
//! - `identity`: instance id and region from the metadata service
//! - `logging`: bounded audit log and tracing setup
//! - `preflight`: required tool checks
//! - `provider`: storage provider trait, AWS CLI and mock implementations
//! - `run`: the snapshot run itself

pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod preflight;
pub mod provider;
pub mod run;

pub use config::{Cli, Config, FailureMode, RunSettings};
pub use error::AgentError;
pub use identity::{Identity, MetadataClient};
pub use provider::{AwsCliProvider, MockProvider, ProviderError, SnapshotProvider};
pub use run::{RunReport, SnapshotRun, VolumeFailure};
