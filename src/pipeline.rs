//! The command-to-decision pipeline.
//!
//! One invocation runs the stages in order: envelope → classifier → zone
//! labels → (backup ∥ prompt) → decision. The entry point returns an
//! [`Outcome`] describing the decision plus the stdout/stderr lines to
//! emit; the binary applies the side effects and maps the decision to the
//! exit code. Keeping effects out of this function's signature is what
//! makes the fail-open discipline testable.
//!
//! Decision table:
//!
//! | Classification | Zones | Decision |
//! |---|---|---|
//! | not a deletion | — | allow |
//! | deletion | all workspace/whitelist/tmp | back up non-tmp, allow |
//! | deletion | any outside | prompt; `y` → allow, else block |
//! | unresolvable | — | prompt; `y` → allow, else block |

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::backup;
use crate::classifier::{self, Classification, Target};
use crate::config::Config;
use crate::hook::Envelope;
use crate::logging::{self, LogEntry};
use crate::prompt::{Confirm, PromptOutcome, TtyPrompt};
use crate::zone::{ZoneLabel, Zones};

/// Exit code for an allowed command.
pub const EXIT_ALLOW: i32 = 0;
/// Exit code for a blocked command.
pub const EXIT_BLOCK: i32 = 2;

/// The pipeline's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block { reason: String },
}

/// Everything one invocation produced: the decision plus output lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    /// Informational lines for stdout (skip reasons, backup locations).
    pub notes: Vec<String>,
    /// Lines for stderr (block reasons).
    pub diagnostics: Vec<String>,
}

impl Outcome {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            notes: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn block(reason: String) -> Self {
        Self {
            diagnostics: vec![reason.clone()],
            decision: Decision::Block { reason },
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.decision {
            Decision::Allow => EXIT_ALLOW,
            Decision::Block { .. } => EXIT_BLOCK,
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self.decision, Decision::Allow)
    }
}

/// Run the pipeline for one envelope (production entry point).
#[must_use]
pub fn run(envelope: &Envelope, config: &Config) -> Outcome {
    let cwd = envelope.cwd_or_process();
    let zones = Zones::resolve(&cwd, config);
    run_with(envelope, config, &zones, &TtyPrompt)
}

/// [`run`] with the zone roots and prompt seam passed explicitly.
#[must_use]
pub fn run_with(
    envelope: &Envelope,
    config: &Config,
    zones: &Zones,
    prompter: &dyn Confirm,
) -> Outcome {
    let Some(command) = envelope.bash_command() else {
        return Outcome::allow();
    };
    let cwd = envelope.cwd_or_process();

    let classification = classifier::classify_command(command, &cwd);
    let outcome = match classification {
        Classification::NotDeletion => Outcome::allow(),
        Classification::Unresolvable { ref reason } => {
            gate_unresolvable(command, reason, prompter)
        }
        Classification::Deletion { ref targets, .. } => {
            gate_deletion(command, targets, zones, config, prompter)
        }
    };

    log_decision(config, command, &classification, &outcome);
    outcome
}

fn gate_unresolvable(command: &str, reason: &str, prompter: &dyn Confirm) -> Outcome {
    let message = format!(
        "\nDeletion guard: cannot enumerate deletion targets:\n  {command}\n  ({reason})\nAllow this deletion? [y/N] "
    );
    match prompter.confirm(&message) {
        PromptOutcome::Approved => Outcome::allow(),
        outcome => Outcome::block(format!(
            "Deletion guard: unable to verify whether target paths are inside the \
             workspace or /tmp ({}). Rewrite using explicit file paths (avoid $(...), \
             backtick subshells, eval, or base64-piped commands).",
            deny_detail(outcome)
        )),
    }
}

fn gate_deletion(
    command: &str,
    targets: &[Target],
    zones: &Zones,
    config: &Config,
    prompter: &dyn Confirm,
) -> Outcome {
    let mut backed_up: BTreeMap<PathBuf, Vec<Target>> = BTreeMap::new();
    let mut outside: Vec<PathBuf> = Vec::new();

    for target in targets {
        match zones.classify(&target.path) {
            (ZoneLabel::Workspace | ZoneLabel::Whitelist, Some(root)) => {
                backed_up
                    .entry(root.to_path_buf())
                    .or_default()
                    .push(target.clone());
            }
            (ZoneLabel::Tmp, _) => {} // allowed silently, no backup
            _ => outside.push(target.path.clone()),
        }
    }

    if !outside.is_empty() {
        let mut listing = String::new();
        for path in &outside {
            let _ = writeln!(listing, "  {}", path.display());
        }
        let message = format!(
            "\nDeletion guard: deletion with targets outside the workspace:\n  {command}\n{listing}Allow deletion? [y/N] "
        );
        match prompter.confirm(&message) {
            PromptOutcome::Approved => {}
            outcome => {
                let blocked = outside
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Outcome::block(format!(
                    "Deletion guard: deleting files outside the workspace or /tmp is not \
                     allowed and the user has not confirmed this operation ({}).\nBlocked: {blocked}",
                    deny_detail(outcome)
                ));
            }
        }
    }

    // Prompt settled (or unnecessary); trusted targets get their backups
    // before the decision is returned.
    let notes = backup::backup_groups(&backed_up, config, command);
    Outcome {
        decision: Decision::Allow,
        notes,
        diagnostics: Vec::new(),
    }
}

const fn deny_detail(outcome: PromptOutcome) -> &'static str {
    match outcome {
        PromptOutcome::Denied => "denied at the prompt",
        PromptOutcome::TimedOut => "no response within 30s",
        PromptOutcome::Unavailable => "no controlling terminal",
        PromptOutcome::Approved => "approved",
    }
}

fn log_decision(
    config: &Config,
    command: &str,
    classification: &Classification,
    outcome: &Outcome,
) {
    let Some(log_file) = config.log_file.as_deref() else {
        return;
    };
    let targets = match classification {
        Classification::Deletion { targets, .. } => targets.len(),
        _ => 0,
    };
    let (decision, reason) = match &outcome.decision {
        Decision::Allow => ("allow", None),
        Decision::Block { reason } => ("block", Some(reason.clone())),
    };
    let _ = logging::append_entry(log_file, &LogEntry::new(decision, command, targets, reason));
}
