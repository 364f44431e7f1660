//! Claude Code hook envelope handling.
//!
//! The host writes one JSON envelope on stdin for the `PreToolUse` hook.
//! Deserialization goes through a wire-shape struct and extracts the Bash
//! command (or the absence of one) while converting, so the rest of the
//! pipeline never sees the raw JSON structure. Anything that fails to parse
//! is reported as an error kind the caller maps to an allow (fail open).

use serde::Deserialize;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

/// Raw wire shape of the envelope. Every field is optional on the wire;
/// missing pieces collapse to defaults and are sorted out in the conversion.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEnvelope {
    tool_name: String,
    tool_input: WireToolInput,
    cwd: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireToolInput {
    command: serde_json::Value,
}

/// One invocation's input, with the Bash command already extracted.
///
/// Envelopes for other tools, or with a missing/empty/non-string command,
/// simply carry no command; such invocations are allowed without analysis.
#[derive(Debug, Deserialize)]
#[serde(from = "WireEnvelope")]
pub struct Envelope {
    command: Option<String>,
    cwd: Option<PathBuf>,
}

impl From<WireEnvelope> for Envelope {
    fn from(wire: WireEnvelope) -> Self {
        let command = match (wire.tool_name.as_str(), wire.tool_input.command) {
            ("Bash", serde_json::Value::String(cmd)) if !cmd.is_empty() => Some(cmd),
            _ => None,
        };
        let cwd = (!wire.cwd.is_empty()).then(|| PathBuf::from(wire.cwd));
        Self { command, cwd }
    }
}

/// Error type for reading and parsing the envelope.
#[derive(Debug)]
pub enum EnvelopeError {
    /// Stdin could not be read.
    Io(serde_json::Error),
    /// The input was not a valid envelope.
    Json(serde_json::Error),
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read hook input: {e}"),
            Self::Json(e) => write!(f, "malformed hook input: {e}"),
        }
    }
}

impl Envelope {
    /// The Bash command to analyse, when this envelope carries one.
    #[must_use]
    pub fn bash_command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// The invocation's working directory, falling back to the process cwd.
    #[must_use]
    pub fn cwd_or_process(&self) -> PathBuf {
        self.cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

/// Read and parse the hook envelope from a reader (stdin in production).
///
/// # Errors
///
/// Returns [`EnvelopeError::Io`] if the reader fails, or
/// [`EnvelopeError::Json`] if the input is not a valid envelope.
pub fn read_envelope<R: Read>(reader: R) -> Result<Envelope, EnvelopeError> {
    serde_json::from_reader(reader).map_err(|err| match err.classify() {
        serde_json::error::Category::Io => EnvelopeError::Io(err),
        _ => EnvelopeError::Json(err),
    })
}

/// Configure colored output based on TTY detection.
///
/// Disables colors if stderr is not a terminal (e.g., piped to a file).
pub fn configure_colors() {
    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
}
