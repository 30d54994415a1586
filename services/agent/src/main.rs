//! volsnap - snapshot the volumes attached to this instance and retire
//! automated snapshots past their retention window.
//!
//! Exit codes:
//! - `0`: every volume succeeded (or there was nothing to do)
//! - `1`: a precondition failed or volumes could not be enumerated
//! - `2`: at least one volume failed; the others were still processed

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use volsnap_agent::{
    logging, preflight, AgentError, AwsCliProvider, Cli, Config, MetadataClient, RunReport,
    SnapshotRun,
};
use volsnap_policy::SystemClock;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("volsnap: {e}");
            return ExitCode::from(1);
        }
    };

    // Required tools are checked before touching the log file.
    let aws_cli = match preflight::require_tool(&config.aws_cli) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("volsnap: {e}");
            return ExitCode::from(1);
        }
    };

    let audit = match logging::init(&config.log_file, config.log_max_lines, &config.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("volsnap: {e}");
            return ExitCode::from(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %audit.path().display(),
        aws_cli = %aws_cli.display(),
        "volsnap starting"
    );

    match run(&config, aws_cli).await {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            let agent_error = e.downcast_ref::<AgentError>();
            let reason = agent_error
                .map(AgentError::reason_code)
                .unwrap_or("unknown");
            // Preconditions fail before any provider call is made.
            let precondition = agent_error.is_some_and(AgentError::is_precondition);
            error!(reason, precondition, error = %e, "volsnap failed");
            for cause in e.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::from(1)
        }
    }
}

async fn run(config: &Config, aws_cli: std::path::PathBuf) -> Result<RunReport> {
    let metadata = MetadataClient::new(&config.metadata_url, config.metadata_timeout)
        .map_err(AgentError::from)?;
    let identity = metadata
        .resolve(config.region_override.as_deref())
        .await
        .map_err(AgentError::from)?;

    let provider = Arc::new(AwsCliProvider::new(aws_cli, identity.region.clone()));
    let snapshot_run = SnapshotRun::new(provider, config.run.clone());

    let report = snapshot_run
        .execute(&identity.instance_id, &SystemClock)
        .await
        .with_context(|| format!("snapshot run for {} failed", identity.instance_id))?;
    Ok(report)
}
