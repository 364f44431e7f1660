//! CLI argument parsing and subcommand handling.
//!
//! The binary's default mode (no subcommand) is the hook: read the envelope
//! from stdin, decide, exit. The subcommands here are operator conveniences
//! for inspecting what the hook would do and what it has stored.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::classifier::{self, Classification};
use crate::config::Config;
use crate::manifest::ManifestStore;
use crate::zone::{ZoneLabel, Zones};

/// Deletion guard for Claude Code's Bash tool.
///
/// Runs as a `PreToolUse` hook: deletions inside the workspace or a
/// whitelisted folder are backed up and allowed, deletions elsewhere need a
/// y/N confirmation on the terminal.
#[derive(Parser, Debug)]
#[command(name = "dlg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how a command would be classified, without deciding anything
    #[command(name = "test")]
    TestCommand {
        /// Command to classify
        command: String,

        /// Working directory to resolve relative paths against
        #[arg(long)]
        cwd: Option<PathBuf>,
    },

    /// Write a sample configuration file
    #[command(name = "init")]
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List backed-up items from the centralized manifest
    #[command(name = "backups")]
    Backups,
}

/// Run a subcommand, returning the process exit code.
#[must_use]
pub fn run_command(command: Command) -> i32 {
    match command {
        Command::TestCommand { command, cwd } => run_test(&command, cwd),
        Command::Init { force } => run_init(force),
        Command::Backups => run_backups(),
    }
}

fn run_test(command: &str, cwd: Option<PathBuf>) -> i32 {
    let cwd = cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/"));
    let (config, note) = Config::load();
    if let Some(note) = note {
        eprintln!("{} {note}", "note:".yellow());
    }
    let zones = Zones::resolve(&cwd, &config);

    match classifier::classify_command(command, &cwd) {
        Classification::NotDeletion => {
            println!("{} not a deletion; would allow", "ok".green().bold());
            0
        }
        Classification::Unresolvable { reason } => {
            println!(
                "{} unresolvable: {reason}; would prompt [y/N]",
                "??".yellow().bold()
            );
            2
        }
        Classification::Deletion { targets, .. } => {
            let mut any_outside = false;
            for target in &targets {
                let (label, _) = zones.classify(&target.path);
                if label == ZoneLabel::Outside {
                    any_outside = true;
                }
                let kind = if target.is_dir { "dir " } else { "file" };
                println!(
                    "  {kind} {} {}",
                    format!("[{label}]").cyan(),
                    target.path.display()
                );
            }
            if targets.is_empty() {
                println!("{} deletion with no targets; would allow", "ok".green().bold());
                0
            } else if any_outside {
                println!("{} outside targets; would prompt [y/N]", "!!".red().bold());
                2
            } else {
                println!(
                    "{} trusted zones only; would back up and allow",
                    "ok".green().bold()
                );
                0
            }
        }
    }
}

fn run_init(force: bool) -> i32 {
    let path = Config::config_path();
    if path.exists() && !force {
        eprintln!(
            "{} {} already exists (use --force to overwrite)",
            "error:".red().bold(),
            path.display()
        );
        return 1;
    }

    let sample = serde_json::json!({
        "backup_mode": "centralized",
        "backup_root": Config::default_backup_root().display().to_string(),
        "whitelisted_folders": [],
    });
    let result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, format!("{}\n", serde_json::to_string_pretty(&sample)?))
    })();

    match result {
        Ok(()) => {
            println!("Wrote {}", path.display());
            0
        }
        Err(err) => {
            eprintln!("{} could not write {}: {err}", "error:".red().bold(), path.display());
            1
        }
    }
}

fn run_backups() -> i32 {
    let (config, note) = Config::load();
    if let Some(note) = note {
        eprintln!("{} {note}", "note:".yellow());
    }

    let store = ManifestStore::for_backup_root(&config.backup_root);
    match store.load() {
        Ok((records, maintenance)) => {
            if records.is_empty() {
                println!("No backups recorded in {}", store.path().display());
            }
            for record in &records {
                println!(
                    "{}  {}  {}  {} bytes\n      {} {}",
                    record.backed_up_at.bright_black(),
                    record.id.cyan(),
                    record.backup_filename,
                    record.size_bytes,
                    "from".bright_black(),
                    record.original_path
                );
            }
            if maintenance.parse_errors > 0 {
                eprintln!(
                    "{} skipped {} malformed manifest line(s)",
                    "note:".yellow(),
                    maintenance.parse_errors
                );
            }
            0
        }
        Err(err) => {
            eprintln!(
                "{} could not read {}: {err}",
                "error:".red().bold(),
                store.path().display()
            );
            1
        }
    }
}
