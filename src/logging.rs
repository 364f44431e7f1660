//! Optional decision log.
//!
//! When the config names a `log_file`, every evaluated deletion appends one
//! JSON line describing the decision. Logging is best-effort: failures are
//! swallowed and never influence the decision or the exit code.

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// One decision log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    /// "allow" or "block".
    pub decision: String,
    pub command: String,
    /// Number of resolved targets (0 for unresolvable commands).
    pub targets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(decision: &str, command: &str, targets: usize, reason: Option<String>) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            decision: decision.to_string(),
            command: command.to_string(),
            targets,
            reason,
        }
    }
}

/// Append one entry to the decision log.
///
/// # Errors
///
/// Returns any I/O errors from creating the parent directory or appending;
/// callers ignore them.
pub fn append_entry(log_file: &Path, entry: &LogEntry) -> io::Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let line = serde_json::to_string(entry).map_err(io::Error::other)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}
