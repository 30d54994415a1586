//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use volsnap_policy::{RetentionPolicy, DEFAULT_RETENTION_DAYS};

use crate::error::AgentError;
use crate::identity::DEFAULT_METADATA_URL;
use crate::logging::{DEFAULT_LOG_FILE, DEFAULT_LOG_MAX_LINES};

/// Upper bound on concurrent per-volume workers.
pub const MAX_CONCURRENCY: usize = 32;

/// Snapshot every named volume attached to this instance and retire
/// automation-created snapshots older than the retention window.
#[derive(Debug, Clone, Parser)]
#[command(name = "volsnap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Days an automated snapshot is kept before it is deleted.
    #[arg(long, env = "VOLSNAP_RETENTION_DAYS", default_value_t = DEFAULT_RETENTION_DAYS)]
    pub retention_days: u32,

    /// Audit log file.
    #[arg(long, env = "VOLSNAP_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Number of most recent audit log lines kept across runs.
    #[arg(long, env = "VOLSNAP_LOG_MAX_LINES", default_value_t = DEFAULT_LOG_MAX_LINES)]
    pub log_max_lines: usize,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, env = "VOLSNAP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Volumes processed in parallel.
    #[arg(long, env = "VOLSNAP_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Stop at the first per-volume failure instead of continuing.
    #[arg(long, env = "VOLSNAP_FAIL_FAST")]
    pub fail_fast: bool,

    /// Region to operate in. Derived from the availability zone when unset.
    #[arg(long, env = "VOLSNAP_REGION")]
    pub region: Option<String>,

    /// Instance metadata service base URL.
    #[arg(long, env = "VOLSNAP_METADATA_URL", default_value = DEFAULT_METADATA_URL)]
    pub metadata_url: String,

    /// Metadata request timeout in seconds.
    #[arg(long = "metadata-timeout", env = "VOLSNAP_METADATA_TIMEOUT", default_value_t = 5)]
    pub metadata_timeout_secs: u64,

    /// AWS command line executable (name on PATH or a path).
    #[arg(long, env = "VOLSNAP_AWS_CLI", default_value = "aws")]
    pub aws_cli: PathBuf,
}

/// What to do when one volume fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Record the failure and keep going with the other volumes.
    #[default]
    Isolate,

    /// Stop scheduling new work after the first failure.
    FailFast,
}

/// Settings for a single snapshot run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub retention: RetentionPolicy,
    pub concurrency: usize,
    pub failure_mode: FailureMode,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            concurrency: 4,
            failure_mode: FailureMode::Isolate,
        }
    }
}

/// Validated agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub run: RunSettings,
    pub log_file: PathBuf,
    pub log_max_lines: usize,
    pub log_level: String,
    pub region_override: Option<String>,
    pub metadata_url: String,
    pub metadata_timeout: Duration,
    pub aws_cli: PathBuf,
}

impl Config {
    /// Validate parsed arguments.
    pub fn from_cli(cli: Cli) -> Result<Self, AgentError> {
        let retention = RetentionPolicy::new(cli.retention_days)
            .map_err(|e| AgentError::Config(e.to_string()))?;

        if cli.log_max_lines == 0 {
            return Err(AgentError::Config(
                "log_max_lines must be at least 1".to_string(),
            ));
        }

        if cli.metadata_timeout_secs == 0 {
            return Err(AgentError::Config(
                "metadata_timeout must be at least 1 second".to_string(),
            ));
        }

        let region_override = cli
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let failure_mode = if cli.fail_fast {
            FailureMode::FailFast
        } else {
            FailureMode::Isolate
        };

        Ok(Self {
            run: RunSettings {
                retention,
                concurrency: cli.concurrency.clamp(1, MAX_CONCURRENCY),
                failure_mode,
            },
            log_file: cli.log_file,
            log_max_lines: cli.log_max_lines,
            log_level: cli.log_level,
            region_override,
            metadata_url: cli.metadata_url,
            metadata_timeout: Duration::from_secs(cli.metadata_timeout_secs),
            aws_cli: cli.aws_cli,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("volsnap").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_cli(parse(&[])).unwrap();
        assert_eq!(config.run.retention.retention_days(), 30);
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.run.failure_mode, FailureMode::Isolate);
        assert_eq!(config.log_file, PathBuf::from("/var/log/volsnap.log"));
        assert_eq!(config.log_max_lines, 5000);
        assert_eq!(config.aws_cli, PathBuf::from("aws"));
        assert_eq!(config.metadata_url, "http://169.254.169.254/latest");
        assert!(config.region_override.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_cli(parse(&[
            "--retention-days",
            "7",
            "--fail-fast",
            "--concurrency",
            "100",
            "--region",
            " eu-west-1 ",
            "--log-file",
            "/tmp/v.log",
        ]))
        .unwrap();
        assert_eq!(config.run.retention.retention_days(), 7);
        assert_eq!(config.run.failure_mode, FailureMode::FailFast);
        assert_eq!(config.run.concurrency, MAX_CONCURRENCY);
        assert_eq!(config.region_override.as_deref(), Some("eu-west-1"));
        assert_eq!(config.log_file, PathBuf::from("/tmp/v.log"));
    }

    #[test]
    fn test_metadata_timeout_flag() {
        let config = Config::from_cli(parse(&["--metadata-timeout", "2"])).unwrap();
        assert_eq!(config.metadata_timeout, Duration::from_secs(2));
        assert!(Cli::try_parse_from(["volsnap", "--metadata-timeout-secs", "2"]).is_err());
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let config = Config::from_cli(parse(&["--concurrency", "0"])).unwrap();
        assert_eq!(config.run.concurrency, 1);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_cli(parse(&["--retention-days", "0"])).is_err());
        assert!(Config::from_cli(parse(&["--log-max-lines", "0"])).is_err());
        assert!(Cli::try_parse_from(["volsnap", "--retention-days", "-1"]).is_err());
    }

    #[test]
    fn test_no_subcommands() {
        assert!(Cli::try_parse_from(["volsnap", "create"]).is_err());
    }
}
