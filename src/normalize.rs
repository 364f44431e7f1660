//! Wrapper prefix stripping.
//!
//! Strips leading environment assignments (`FOO=bar`) and common wrapper
//! commands (`sudo`, `env`, `time`, `nice`) from a word list so the verb
//! table sees the actual command verb.
//!
//! # Design Principles
//!
//! - **Conservative**: only strip when the syntax is unambiguous; an
//!   unrecognized wrapper flag stops the stripping rather than guessing.
//! - **Preserve original**: callers keep the full word list; this module
//!   returns the index where the real command starts.

/// A wrapper that was stripped from the front of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrippedWrapper {
    EnvAssignment,
    Sudo,
    Env,
    Time,
    Nice,
}

/// `sudo` flags that consume a following argument.
const SUDO_ARG_FLAGS: &[&str] = &[
    "-u", "-g", "-h", "-p", "-C", "-r", "-U", "-D", "-t", "-T",
];

/// Result of stripping: the verb-start index plus what was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSegment {
    /// Index into the original word list where the command verb starts.
    pub verb_start: usize,
    /// Wrappers stripped, in order.
    pub stripped: Vec<StrippedWrapper>,
}

impl NormalizedSegment {
    /// The words of the actual command, wrappers removed.
    #[must_use]
    pub fn command_words<'a>(&self, words: &'a [String]) -> &'a [String] {
        &words[self.verb_start.min(words.len())..]
    }
}

/// True for `NAME=value` tokens with a POSIX identifier on the left.
#[must_use]
pub fn is_env_assignment(token: &str) -> bool {
    let Some(eq) = token.find('=') else {
        return false;
    };
    if eq == 0 {
        return false;
    }
    let name = &token[..eq];
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

/// Strip leading assignments and wrapper prefixes from a word list.
#[must_use]
pub fn strip_wrappers(words: &[String]) -> NormalizedSegment {
    let mut i = 0;
    let mut stripped = Vec::new();

    while i < words.len() {
        let word = &words[i];

        if is_env_assignment(word) {
            stripped.push(StrippedWrapper::EnvAssignment);
            i += 1;
            continue;
        }

        match basename(word) {
            "sudo" => {
                stripped.push(StrippedWrapper::Sudo);
                i += 1;
                while i < words.len() {
                    let flag = words[i].as_str();
                    if flag == "--" {
                        i += 1;
                        break;
                    }
                    if !flag.starts_with('-') || flag == "-" {
                        break;
                    }
                    if SUDO_ARG_FLAGS.contains(&flag) {
                        i += 2; // flag + value
                    } else {
                        i += 1;
                    }
                }
            }
            "env" => {
                stripped.push(StrippedWrapper::Env);
                i += 1;
                while i < words.len() {
                    let token = words[i].as_str();
                    if token == "--" {
                        i += 1;
                        break;
                    }
                    if token == "-u" {
                        i += 2;
                    } else if token == "-i" || token == "-0" {
                        i += 1;
                    } else if is_env_assignment(token) {
                        i += 1;
                    } else {
                        break;
                    }
                }
            }
            "time" => {
                stripped.push(StrippedWrapper::Time);
                i += 1;
                if words.get(i).map(String::as_str) == Some("-p") {
                    i += 1;
                }
            }
            "nice" => {
                stripped.push(StrippedWrapper::Nice);
                i += 1;
                match words.get(i).map(String::as_str) {
                    Some("-n") => i += 2,
                    Some(flag) if flag.starts_with("-n") || flag.starts_with("--adjustment") => {
                        i += 1;
                    }
                    _ => {}
                }
            }
            _ => break,
        }
    }

    NormalizedSegment {
        verb_start: i,
        stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn bare_command_untouched() {
        let w = words("rm -rf foo");
        let norm = strip_wrappers(&w);
        assert_eq!(norm.verb_start, 0);
        assert!(norm.stripped.is_empty());
    }

    #[test]
    fn strips_sudo_and_flags() {
        let w = words("sudo rm foo");
        assert_eq!(strip_wrappers(&w).command_words(&w), &words("rm foo")[..]);

        let w = words("sudo -u root rm foo");
        assert_eq!(strip_wrappers(&w).command_words(&w), &words("rm foo")[..]);

        let w = words("sudo -E -- rm foo");
        assert_eq!(strip_wrappers(&w).command_words(&w), &words("rm foo")[..]);
    }

    #[test]
    fn strips_env_assignments_and_env() {
        let w = words("FOO=1 BAR=2 rm foo");
        assert_eq!(strip_wrappers(&w).command_words(&w), &words("rm foo")[..]);

        let w = words("env -i PATH=/bin rm foo");
        assert_eq!(strip_wrappers(&w).command_words(&w), &words("rm foo")[..]);
    }

    #[test]
    fn strips_stacked_wrappers() {
        let w = words("sudo env FOO=1 nice -n 10 time rm foo");
        assert_eq!(strip_wrappers(&w).command_words(&w), &words("rm foo")[..]);
    }

    #[test]
    fn absolute_wrapper_path() {
        let w = words("/usr/bin/sudo /bin/rm foo");
        assert_eq!(
            strip_wrappers(&w).command_words(&w),
            &words("/bin/rm foo")[..]
        );
    }

    #[test]
    fn assignment_detection() {
        assert!(is_env_assignment("FOO=bar"));
        assert!(is_env_assignment("_x9=1"));
        assert!(!is_env_assignment("=bar"));
        assert!(!is_env_assignment("9x=1"));
        assert!(!is_env_assignment("rm"));
        assert!(!is_env_assignment("a-b=c"));
    }
}
