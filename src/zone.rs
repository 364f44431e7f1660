//! Zone classification for resolved deletion targets.
//!
//! Every target gets exactly one label. Evaluation order is fixed: workspace
//! first, then whitelist, then tmp, else outside. Classification is purely
//! lexical over canonicalized paths, so symlink indirection cannot move a
//! target between zones.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::paths;

/// Environment variable naming the workspace root.
pub const ENV_PROJECT_DIR: &str = "CLAUDE_PROJECT_DIR";

/// Zone a resolved path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneLabel {
    Workspace,
    Whitelist,
    Tmp,
    Outside,
}

impl ZoneLabel {
    /// Trusted zones get backups; deletion proceeds without a prompt.
    #[must_use]
    pub const fn is_trusted(self) -> bool {
        matches!(self, Self::Workspace | Self::Whitelist | Self::Tmp)
    }

    /// Zones whose contents are backed up before deletion.
    #[must_use]
    pub const fn is_backed_up(self) -> bool {
        matches!(self, Self::Workspace | Self::Whitelist)
    }
}

impl fmt::Display for ZoneLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workspace => write!(f, "workspace"),
            Self::Whitelist => write!(f, "whitelist"),
            Self::Tmp => write!(f, "tmp"),
            Self::Outside => write!(f, "outside"),
        }
    }
}

/// The zone roots active for one invocation.
#[derive(Debug, Clone)]
pub struct Zones {
    workspace: PathBuf,
    whitelisted: Vec<PathBuf>,
    tmp_roots: Vec<PathBuf>,
}

impl Zones {
    /// Resolve zone roots from the environment, cwd, and configuration.
    ///
    /// The workspace is `CLAUDE_PROJECT_DIR` when set and non-empty, else the
    /// invocation's cwd. Whitelist entries come canonicalized from the config.
    #[must_use]
    pub fn resolve(cwd: &Path, config: &Config) -> Self {
        let project_dir = env::var(ENV_PROJECT_DIR)
            .ok()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);
        Self::resolve_with_project_dir(cwd, config, project_dir.as_deref())
    }

    /// [`Zones::resolve`] with the project dir passed explicitly.
    #[must_use]
    pub fn resolve_with_project_dir(
        cwd: &Path,
        config: &Config,
        project_dir: Option<&Path>,
    ) -> Self {
        let workspace = match project_dir {
            Some(dir) => paths::canonicalize_lenient(dir),
            None => paths::canonicalize_lenient(cwd),
        };

        let mut tmp_roots: Vec<PathBuf> = ["/tmp", "/var/tmp", "/private/tmp"]
            .iter()
            .map(|s| paths::canonicalize_lenient(Path::new(s)))
            .collect();
        let platform_tmp = paths::canonicalize_lenient(&env::temp_dir());
        if !tmp_roots.contains(&platform_tmp) {
            tmp_roots.push(platform_tmp);
        }
        tmp_roots.dedup();

        Self {
            workspace,
            whitelisted: config.whitelisted_folders.clone(),
            tmp_roots,
        }
    }

    /// The workspace root.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Classify a canonicalized path.
    ///
    /// Returns the label and, for backed-up zones, the zone root the backup
    /// engine should group the target under.
    #[must_use]
    pub fn classify(&self, path: &Path) -> (ZoneLabel, Option<&Path>) {
        if paths::is_within(path, &self.workspace) {
            return (ZoneLabel::Workspace, Some(self.workspace.as_path()));
        }
        for root in &self.whitelisted {
            if paths::is_within(path, root) {
                return (ZoneLabel::Whitelist, Some(root.as_path()));
            }
        }
        for tmp in &self.tmp_roots {
            if paths::is_within(path, tmp) {
                return (ZoneLabel::Tmp, None);
            }
        }
        (ZoneLabel::Outside, None)
    }
}
