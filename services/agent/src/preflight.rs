//! Dependency presence checks run before anything else.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AgentError;

/// Locate `tool`, either as a path or by searching `PATH`.
///
/// Returns the resolved executable path.
pub fn require_tool(tool: &Path) -> Result<PathBuf, AgentError> {
    require_tool_in(tool, env::var_os("PATH").as_deref())
}

/// Same as [`require_tool`] with an explicit search path.
pub fn require_tool_in(tool: &Path, search_path: Option<&OsStr>) -> Result<PathBuf, AgentError> {
    // Anything with a separator is taken as a path, not a name to search for.
    if tool.components().count() > 1 || tool.is_absolute() {
        if is_executable(tool) {
            debug!(tool = %tool.display(), "Found required tool");
            return Ok(tool.to_path_buf());
        }
        return Err(AgentError::ToolMissing {
            tool: tool.display().to_string(),
            searched: tool.display().to_string(),
        });
    }

    let dirs: Vec<PathBuf> = search_path
        .map(|p| env::split_paths(p).collect())
        .unwrap_or_default();

    for dir in &dirs {
        let candidate = dir.join(tool);
        if is_executable(&candidate) {
            debug!(tool = %candidate.display(), "Found required tool");
            return Ok(candidate);
        }
    }

    Err(AgentError::ToolMissing {
        tool: tool.display().to_string(),
        searched: if dirs.is_empty() {
            "an empty PATH".to_string()
        } else {
            format!("PATH ({} directories)", dirs.len())
        },
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
