//! Configuration loading.
//!
//! The configuration lives at `<home>/.claude/claude-code-protect.json` and
//! is owned by the user (slash commands edit it; this hook only reads it).
//! It is re-read on every invocation — no caching. Unknown keys are ignored,
//! and a missing or unparseable file degrades to all defaults.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Config file name under `<home>/.claude/`.
pub const CONFIG_FILE_NAME: &str = "claude-code-protect.json";

/// Default backup root directory name under `<home>/.claude/`.
pub const DEFAULT_BACKUP_DIR_NAME: &str = "claude-code-protect-backups";

/// Where backups are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupMode {
    /// Everything under one `<backup_root>/files/` directory plus a manifest.
    #[default]
    Centralized,
    /// A `.claude-backups/` directory inside each zone root.
    PerFolder,
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Centralized => write!(f, "centralized"),
            Self::PerFolder => write!(f, "per-folder"),
        }
    }
}

/// On-disk shape of the config file. All fields optional; unknown keys are
/// ignored by serde's default behavior.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    backup_mode: Option<String>,
    backup_root: Option<String>,
    whitelisted_folders: Option<Vec<String>>,
    log_file: Option<String>,
}

/// Effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub backup_mode: BackupMode,
    pub backup_root: PathBuf,
    /// Canonicalized whitelist roots.
    pub whitelisted_folders: Vec<PathBuf>,
    /// Optional JSON-lines decision log.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_mode: BackupMode::default(),
            backup_root: Self::default_backup_root(),
            whitelisted_folders: Vec::new(),
            log_file: None,
        }
    }
}

impl Config {
    /// Path of the user's config file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join(CONFIG_FILE_NAME)
    }

    /// Default backup root when the config does not name one.
    #[must_use]
    pub fn default_backup_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join(DEFAULT_BACKUP_DIR_NAME)
    }

    /// Load the active configuration.
    ///
    /// Returns the config plus an optional one-line note for stderr when the
    /// file existed but could not be used.
    #[must_use]
    pub fn load() -> (Self, Option<String>) {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path (tests use this directly).
    #[must_use]
    pub fn load_from(path: &Path) -> (Self, Option<String>) {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return (Self::default(), None);
            }
            Err(err) => {
                return (
                    Self::default(),
                    Some(format!(
                        "config {} unreadable ({err}); using defaults",
                        path.display()
                    )),
                );
            }
        };

        match serde_json::from_str::<RawConfig>(&contents) {
            Ok(raw) => (Self::from_raw(raw), None),
            Err(err) => (
                Self::default(),
                Some(format!(
                    "config {} is not valid JSON ({err}); using defaults",
                    path.display()
                )),
            ),
        }
    }

    fn from_raw(raw: RawConfig) -> Self {
        let backup_mode = match raw.backup_mode.as_deref() {
            Some("per-folder") => BackupMode::PerFolder,
            _ => BackupMode::Centralized,
        };

        let backup_root = raw
            .backup_root
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(Self::default_backup_root, |s| {
                paths::canonicalize_lenient(&paths::expand_tilde(s))
            });

        let whitelisted_folders = raw
            .whitelisted_folders
            .unwrap_or_default()
            .iter()
            .map(|s| paths::canonicalize_lenient(&paths::expand_tilde(s)))
            .collect();

        let log_file = raw
            .log_file
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(paths::expand_tilde);

        Self {
            backup_mode,
            backup_root,
            whitelisted_folders,
            log_file,
        }
    }
}
