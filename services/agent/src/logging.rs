//! Audit log and tracing setup.
//!
//! Every decision the run takes is emitted as a structured `tracing` event.
//! Events are written as JSON lines to the audit file and mirrored to stderr
//! in compact form. The audit file keeps only its most recent lines: it is
//! trimmed once, when the sink is acquired at run start.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AgentError;

/// Default audit log location.
pub const DEFAULT_LOG_FILE: &str = "/var/log/volsnap.log";

/// Default number of lines kept across runs.
pub const DEFAULT_LOG_MAX_LINES: usize = 5000;

/// Append-only audit file.
#[derive(Debug)]
pub struct AuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditSink {
    /// Trim the file at `path` to its last `max_lines` lines, then open it
    /// for appending. Creates the file and its parent directory if needed.
    pub fn open(path: &Path, max_lines: usize) -> Result<Arc<Self>, AgentError> {
        let audit_err = |source: io::Error| AgentError::AuditLog {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(audit_err)?;
        }

        trim_to_last_lines(path, max_lines).map_err(audit_err)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(audit_err)?;

        Ok(Arc::new(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> std::sync::MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Writer handed to the tracing layer; one per event.
pub struct AuditWriter(Arc<AuditSink>);

impl Write for AuditWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.file().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.file().flush()
    }
}

/// Keeps the audit sink alive for the duration of a run and flushes it on
/// release.
#[must_use = "dropping the guard releases the audit log"]
#[derive(Debug)]
pub struct AuditGuard {
    sink: Arc<AuditSink>,
}

impl AuditGuard {
    pub fn path(&self) -> &Path {
        self.sink.path()
    }
}

impl Drop for AuditGuard {
    fn drop(&mut self) {
        let _ = self.sink.file().flush();
    }
}

/// Keep only the last `max_lines` lines of `path`. Returns how many lines
/// were dropped. A missing file is not an error.
pub fn trim_to_last_lines(path: &Path, max_lines: usize) -> io::Result<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut kept: VecDeque<Vec<u8>> = VecDeque::with_capacity(max_lines.min(8192));
    let mut total = 0usize;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    while reader.read_until(b'\n', &mut line)? > 0 {
        total += 1;
        if kept.len() == max_lines {
            kept.pop_front();
        }
        if max_lines > 0 {
            kept.push_back(std::mem::take(&mut line));
        } else {
            line.clear();
        }
    }

    let dropped = total - kept.len();
    if dropped == 0 {
        return Ok(0);
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".trim");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut tmp = File::create(&tmp_path)?;
        for line in &kept {
            tmp.write_all(line)?;
        }
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(dropped)
}

/// Build the subscriber: JSON lines into the audit sink, compact text to
/// stderr. `RUST_LOG` overrides `default_level`.
pub fn subscriber(sink: Arc<AuditSink>, default_level: &str) -> impl Subscriber + Send + Sync {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let audit_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(move || AuditWriter(Arc::clone(&sink)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(audit_layer)
        .with(stderr_layer)
}

/// Acquire the audit log and install the global subscriber.
pub fn init(path: &Path, max_lines: usize, default_level: &str) -> Result<AuditGuard, AgentError> {
    let sink = AuditSink::open(path, max_lines)?;
    subscriber(Arc::clone(&sink), default_level)
        .try_init()
        .map_err(|e| AgentError::LoggingInit(e.to_string()))?;
    Ok(AuditGuard { sink })
}
