//! Dry-run expansion for implicit deletions.
//!
//! `find … -delete` and `git clean -f…` name their victims only at run time.
//! This module re-executes them in a provably non-destructive form (`find`
//! with `-print` substituted, `git clean` with `-n`) to enumerate what they
//! would delete. Re-execution runs in the original cwd with a restricted
//! environment and a hard wall-clock deadline; any irregularity is an error
//! the classifier maps to `Unresolvable`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Wall-clock budget for one dry-run subprocess.
pub const DRY_RUN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on captured stdout; larger output is treated as a failure.
const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Environment variables forwarded to dry-run subprocesses.
const SAFE_ENV: &[&str] = &["PATH", "HOME", "LANG", "TERM"];

/// Why a dry run could not enumerate targets.
#[derive(Debug)]
pub enum DryRunError {
    /// The non-destructive command line could not be constructed.
    Rebuild(&'static str),
    /// The subprocess could not be spawned or awaited.
    Io(io::Error),
    /// The subprocess exceeded [`DRY_RUN_TIMEOUT`].
    Timeout,
    /// The subprocess exited non-zero.
    Failed(Option<i32>),
    /// Output exceeded the capture cap.
    OversizeOutput,
}

impl std::fmt::Display for DryRunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebuild(what) => write!(f, "could not build dry-run command: {what}"),
            Self::Io(e) => write!(f, "dry run failed to execute: {e}"),
            Self::Timeout => write!(f, "dry run exceeded {}s", DRY_RUN_TIMEOUT.as_secs()),
            Self::Failed(Some(code)) => write!(f, "dry run exited with status {code}"),
            Self::Failed(None) => write!(f, "dry run was terminated by a signal"),
            Self::OversizeOutput => write!(f, "dry run produced too much output"),
        }
    }
}

/// Enumerate what `find … -delete` / `find … -exec rm …` would remove.
///
/// Rebuilds the argument list without `-delete` and without any
/// `-exec`/`-execdir`/`-ok` clause, appends `-print`, and runs it.
///
/// # Errors
///
/// Any rebuild, spawn, timeout, exit-status, or output-size problem.
pub fn expand_find(words: &[String], cwd: &Path) -> Result<Vec<PathBuf>, DryRunError> {
    let args = build_find_print(words)?;
    let output = run_captured(&words[0], &args, cwd)?;
    Ok(stdout_lines(&output)
        .map(|line| resolve_line(line, cwd))
        .collect())
}

/// Enumerate what `git clean -f…` would remove via `git clean -n`.
///
/// # Errors
///
/// Any rebuild, spawn, timeout, exit-status, or output-size problem.
pub fn expand_git_clean(words: &[String], cwd: &Path) -> Result<Vec<PathBuf>, DryRunError> {
    let args = build_git_clean_dry(words)?;
    let output = run_captured(&words[0], &args, cwd)?;
    Ok(stdout_lines(&output)
        .filter_map(|line| line.strip_prefix("Would remove "))
        .map(|rest| resolve_line(rest, cwd))
        .collect())
}

/// Rebuild `find` arguments with destructive actions replaced by `-print`.
fn build_find_print(words: &[String]) -> Result<Vec<String>, DryRunError> {
    let mut args = Vec::with_capacity(words.len());
    let mut iter = words.iter().skip(1).peekable();
    let mut removed_action = false;

    while let Some(word) = iter.next() {
        match word.as_str() {
            "-delete" => removed_action = true,
            "-exec" | "-execdir" | "-ok" => {
                removed_action = true;
                // Consume through the clause terminator (';' or '+').
                let mut terminated = false;
                for inner in iter.by_ref() {
                    if inner == ";" || inner == "+" {
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return Err(DryRunError::Rebuild("unterminated -exec clause"));
                }
            }
            _ => args.push(word.clone()),
        }
    }

    if !removed_action {
        return Err(DryRunError::Rebuild("no destructive find action to strip"));
    }
    args.push("-print".to_string());
    Ok(args)
}

/// Rebuild `git clean` arguments with force flags stripped and `-n` added.
fn build_git_clean_dry(words: &[String]) -> Result<Vec<String>, DryRunError> {
    let clean_idx = words
        .iter()
        .position(|w| w == "clean")
        .ok_or(DryRunError::Rebuild("not a git clean command"))?;

    let mut args: Vec<String> = Vec::with_capacity(words.len() + 1);
    args.extend(words[1..=clean_idx].iter().cloned());
    args.push("-n".to_string());

    for word in &words[clean_idx + 1..] {
        if word == "--force" {
            continue;
        }
        if word.starts_with('-') && !word.starts_with("--") && word.len() > 1 {
            let kept: String = word.chars().skip(1).filter(|&c| c != 'f').collect();
            if kept.is_empty() {
                continue;
            }
            args.push(format!("-{kept}"));
            continue;
        }
        args.push(word.clone());
    }

    Ok(args)
}

fn resolve_line(line: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(line);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn stdout_lines(output: &Output) -> impl Iterator<Item = &str> {
    std::str::from_utf8(&output.stdout)
        .unwrap_or("")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Run a command with captured output, a restricted environment, and the
/// dry-run deadline. Polls `try_wait` and kills on expiry.
fn run_captured(program: &str, args: &[String], cwd: &Path) -> Result<Output, DryRunError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for key in SAFE_ENV {
        if let Ok(value) = std::env::var(key) {
            command.env(key, value);
        }
    }

    let mut child = command.spawn().map_err(DryRunError::Io)?;
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if start.elapsed() > DRY_RUN_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DryRunError::Timeout);
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(err) => return Err(DryRunError::Io(err)),
        }
    }

    let output = child.wait_with_output().map_err(DryRunError::Io)?;
    if !output.status.success() {
        return Err(DryRunError::Failed(output.status.code()));
    }
    if output.stdout.len() > MAX_OUTPUT_BYTES {
        return Err(DryRunError::OversizeOutput);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn find_delete_becomes_print() {
        let args = build_find_print(&words("find . -name *.log -delete")).unwrap();
        assert_eq!(args, words(". -name *.log -print"));
    }

    #[test]
    fn find_exec_clause_is_stripped() {
        let args = build_find_print(&words("find . -type f -exec rm {} ;")).unwrap();
        assert_eq!(args, words(". -type f -print"));

        let args = build_find_print(&words("find . -execdir rm -f {} + -name x")).unwrap();
        assert_eq!(args, words(". -name x -print"));
    }

    #[test]
    fn find_without_action_or_terminator_fails() {
        assert!(matches!(
            build_find_print(&words("find . -name x")),
            Err(DryRunError::Rebuild(_))
        ));
        assert!(matches!(
            build_find_print(&words("find . -exec rm {}")),
            Err(DryRunError::Rebuild(_))
        ));
    }

    #[test]
    fn git_clean_force_flags_become_dry_run() {
        let args = build_git_clean_dry(&words("git clean -fd")).unwrap();
        assert_eq!(args, words("clean -n -d"));

        let args = build_git_clean_dry(&words("git clean -ffxd sub/")).unwrap();
        assert_eq!(args, words("clean -n -xd sub/"));

        let args = build_git_clean_dry(&words("git clean --force -d")).unwrap();
        assert_eq!(args, words("clean -n -d"));

        // A lone -f disappears entirely.
        let args = build_git_clean_dry(&words("git clean -f")).unwrap();
        assert_eq!(args, words("clean -n"));
    }

    #[test]
    fn find_dry_run_enumerates_real_files() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("x.log"), b"x").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/y.log"), b"y").unwrap();
        std::fs::write(temp.path().join("keep.txt"), b"k").unwrap();

        let mut found =
            expand_find(&words("find . -name *.log -delete"), temp.path()).unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![temp.path().join("./sub/y.log"), temp.path().join("./x.log")]
        );
    }

    #[test]
    fn failing_dry_run_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = expand_find(
            &words("find /definitely/not/a/dir -delete"),
            temp.path(),
        );
        assert!(matches!(result, Err(DryRunError::Failed(_))));
    }
}
