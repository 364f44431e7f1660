// Forbid unsafe code in production, but allow in tests
#![cfg_attr(not(test), forbid(unsafe_code))]
//! Deletion guard (dlg) library.
//!
//! A `PreToolUse` hook for Claude Code's Bash tool that prevents an agent
//! from silently destroying data outside a set of trusted zones, while never
//! blocking legitimate work.
//!
//! # Architecture
//!
//! ```text
//! stdin envelope
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────────┐
//! │ Classifier (three tiers, checked in order)       │
//! │  obfuscation → dry-run templates → verb table    │
//! └──────────────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────────┐
//! │ Zone labels: workspace / whitelist / tmp / out   │
//! └──────────────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────────┐
//! │ Gate: backup trusted targets ∥ prompt for the    │
//! │ rest, then exit 0 (allow) or 2 (block)           │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Every stage fails open: an internal error anywhere collapses to exit 0.
//! State between invocations lives only on disk (the backup layouts and the
//! centralized manifest); the configuration file is re-read every time.

pub mod backup;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dryrun;
pub mod hook;
pub mod logging;
pub mod manifest;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod prompt;
pub mod shellwords;
pub mod zone;

// Re-export commonly used types
pub use classifier::{classify_command, Classification, SourceTier, Target};
pub use config::{BackupMode, Config};
pub use hook::{read_envelope, Envelope, EnvelopeError};
pub use manifest::{BackupRecord, ManifestStore};
pub use pipeline::{Decision, Outcome, EXIT_ALLOW, EXIT_BLOCK};
pub use prompt::{Confirm, PromptOutcome, TtyPrompt};
pub use zone::{ZoneLabel, Zones};
