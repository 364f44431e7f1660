//! Deletion guard (dlg) for Claude Code.
//!
//! Runs before every Bash command as a `PreToolUse` hook. Deletions inside
//! the workspace or a whitelisted folder are backed up and allowed;
//! deletions elsewhere (or commands whose targets cannot be enumerated)
//! require a y/N confirmation on the controlling terminal.
//!
//! Exit behavior:
//!   - Exit 0 = allow (including every internal-error path: fail open)
//!   - Exit 2 = block (deny, timeout, or no terminal to ask on)
//!
//! Stdout carries informational diagnostics for the host (skip reasons,
//! backup locations); stderr carries block reasons.

use clap::Parser;
use colored::Colorize;
use deletion_guard::cli::{self, Cli};
use deletion_guard::config::Config;
use deletion_guard::hook;
use deletion_guard::pipeline::{self, Decision};
use std::io;

fn main() {
    hook::configure_colors();

    let cli = Cli::parse();
    if let Some(command) = cli.command {
        std::process::exit(cli::run_command(command));
    }

    // Hook mode. The outermost boundary: a panic anywhere in the pipeline
    // must never stop the user, so it collapses to an allow.
    let code = std::panic::catch_unwind(run_hook).unwrap_or_else(|_| {
        eprintln!("[deletion-guard] internal error (failing open)");
        pipeline::EXIT_ALLOW
    });
    std::process::exit(code);
}

/// Read the envelope, run the pipeline, apply its side effects.
fn run_hook() -> i32 {
    let envelope = match hook::read_envelope(io::stdin().lock()) {
        Ok(envelope) => envelope,
        Err(err) => {
            // Malformed input is the host's bug, not the user's problem.
            eprintln!("[deletion-guard] {err}; allowing");
            return pipeline::EXIT_ALLOW;
        }
    };

    let (config, config_note) = Config::load();
    if let Some(note) = config_note {
        eprintln!("[deletion-guard] {note}");
    }

    let outcome = pipeline::run(&envelope, &config);

    for note in &outcome.notes {
        println!("{}", sanitize(note));
    }
    if let Decision::Block { .. } = outcome.decision {
        for diagnostic in &outcome.diagnostics {
            eprintln!("{}", sanitize(diagnostic).red());
        }
    }

    outcome.exit_code()
}

/// Strip control characters that could confuse the host's output parser.
fn sanitize(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_control() && c != '\n' { ' ' } else { c })
        .collect()
}
