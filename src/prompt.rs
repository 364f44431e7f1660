//! Interactive confirmation on the controlling terminal.
//!
//! Stdin and stdout belong to the hook protocol, so the prompt opens
//! `/dev/tty` directly for both writing and reading. A reader thread feeds a
//! channel; the main thread waits at most [`PROMPT_TIMEOUT`]. Anything other
//! than an affirmative answer within the deadline counts as a deny.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Inactivity deadline for the prompt.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the controlling terminal.
const TTY_PATH: &str = "/dev/tty";

/// Outcome of a confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The user answered `y`/`Y`.
    Approved,
    /// The user answered anything else (including an empty line).
    Denied,
    /// No answer within [`PROMPT_TIMEOUT`].
    TimedOut,
    /// There is no controlling terminal to ask on.
    Unavailable,
}

impl PromptOutcome {
    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// True when the answer's first non-whitespace character is `y` or `Y`.
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim_start().chars().next(), Some('y' | 'Y'))
}

/// The confirmation seam the decision gate talks through.
///
/// Production uses [`TtyPrompt`]; tests substitute canned outcomes.
pub trait Confirm {
    fn confirm(&self, message: &str) -> PromptOutcome;
}

/// The real prompt, backed by `/dev/tty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtyPrompt;

impl Confirm for TtyPrompt {
    fn confirm(&self, message: &str) -> PromptOutcome {
        confirm_on_tty(message)
    }
}

/// Write `message` to the terminal and read a single-line y/N response.
#[must_use]
pub fn confirm_on_tty(message: &str) -> PromptOutcome {
    let Ok(mut tty_out) = OpenOptions::new().write(true).open(TTY_PATH) else {
        return PromptOutcome::Unavailable;
    };
    if tty_out
        .write_all(message.as_bytes())
        .and_then(|()| tty_out.flush())
        .is_err()
    {
        return PromptOutcome::Unavailable;
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let Ok(tty_in) = File::open(TTY_PATH) else {
            let _ = tx.send(None);
            return;
        };
        let mut line = String::new();
        let result = BufReader::new(tty_in).read_line(&mut line);
        let _ = tx.send(result.ok().map(|_| line));
    });

    // The reader thread may outlive the timeout while blocked on the tty;
    // the process exits shortly after, which releases the handle.
    match rx.recv_timeout(PROMPT_TIMEOUT) {
        Ok(Some(answer)) => {
            if is_affirmative(&answer) {
                PromptOutcome::Approved
            } else {
                PromptOutcome::Denied
            }
        }
        Ok(None) => PromptOutcome::Unavailable,
        Err(_) => PromptOutcome::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("Y"));
        assert!(is_affirmative("  yes please"));
        assert!(is_affirmative("y\n"));
    }

    #[test]
    fn non_affirmative_answers() {
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("sure"));
        assert!(!is_affirmative(" N y"));
    }
}
