//! Error types for the agent.

use std::path::PathBuf;

use thiserror::Error;
use volsnap_policy::PolicyError;

use crate::identity::IdentityError;
use crate::provider::ProviderError;

/// Run-level errors. Every variant aborts the run before or instead of
/// per-volume processing.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid configuration.
    #[error("config_invalid: {0}")]
    Config(String),

    /// A required external tool is not installed.
    #[error("tool_missing: {tool} not found (looked for {searched})")]
    ToolMissing { tool: String, searched: String },

    /// Audit log could not be prepared.
    #[error("audit_log_unavailable: {path}: {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging_init_failed: {0}")]
    LoggingInit(String),

    /// Host identity could not be resolved.
    #[error("identity_unresolved: {0}")]
    Identity(#[from] IdentityError),

    /// Volume discovery failed as a whole.
    #[error("discovery_failed: {0}")]
    Discovery(#[source] ProviderError),

    /// Retention policy could not be applied.
    #[error("policy_invalid: {0}")]
    Policy(#[from] PolicyError),
}

impl AgentError {
    /// Standardized reason code, used as a log field.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AgentError::Config(_) => "config_invalid",
            AgentError::ToolMissing { .. } => "tool_missing",
            AgentError::AuditLog { .. } => "audit_log_unavailable",
            AgentError::LoggingInit(_) => "logging_init_failed",
            AgentError::Identity(_) => "identity_unresolved",
            AgentError::Discovery(_) => "discovery_failed",
            AgentError::Policy(_) => "policy_invalid",
        }
    }

    /// Whether the error was raised before any provider call was made.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, AgentError::Discovery(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_match_display_prefix() {
        let errors = vec![
            AgentError::Config("bad".into()),
            AgentError::ToolMissing {
                tool: "aws".into(),
                searched: "PATH".into(),
            },
            AgentError::LoggingInit("twice".into()),
            AgentError::Policy(PolicyError::InvalidRetention(0)),
            AgentError::Discovery(ProviderError::Api("boom".into())),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.reason_code()));
        }
    }

    #[test]
    fn test_discovery_is_not_precondition() {
        assert!(!AgentError::Discovery(ProviderError::Api("x".into())).is_precondition());
        assert!(AgentError::Config("x".into()).is_precondition());
    }
}
