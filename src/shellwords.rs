//! Quote-aware shell lexing.
//!
//! This is a lightweight, purpose-built lexer, not a shell grammar. It
//! recognizes single/double quotes, backslash escapes, and the top-level
//! separators `&&`, `||`, `;`, and `|`. Command substitution never reaches
//! this module: the classifier rejects `$(`/backtick forms beforehand.

/// Error from [`split_words`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSplitError {
    /// A single or double quote was never closed.
    UnterminatedQuote,
}

impl std::fmt::Display for WordSplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote => write!(f, "unterminated quote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Normal,
    SingleQuote,
    DoubleQuote,
    EscapeNormal,
    EscapeDouble,
}

/// Split a command line into top-level segments on `&&`, `||`, `;`, and `|`.
///
/// Separators inside quotes are literal. Empty segments (e.g. from `;;`) are
/// dropped. The segments keep their original quoting for [`split_words`].
#[must_use]
pub fn split_segments(command: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut state = LexState::Normal;
    let mut chars = command.chars().peekable();

    let mut flush = |current: &mut String, segments: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
        current.clear();
    };

    while let Some(ch) = chars.next() {
        match state {
            LexState::Normal => match ch {
                '\'' => {
                    state = LexState::SingleQuote;
                    current.push('\'');
                }
                '"' => {
                    state = LexState::DoubleQuote;
                    current.push('"');
                }
                '\\' => {
                    state = LexState::EscapeNormal;
                    current.push('\\');
                }
                '&' if chars.peek() == Some(&'&') => {
                    chars.next();
                    flush(&mut current, &mut segments);
                }
                '|' => {
                    // `||` and `|` separate identically here.
                    if chars.peek() == Some(&'|') {
                        chars.next();
                    }
                    flush(&mut current, &mut segments);
                }
                ';' => flush(&mut current, &mut segments),
                c => current.push(c),
            },
            LexState::SingleQuote => {
                current.push(ch);
                if ch == '\'' {
                    state = LexState::Normal;
                }
            }
            LexState::DoubleQuote => match ch {
                '"' => {
                    current.push('"');
                    state = LexState::Normal;
                }
                '\\' => {
                    current.push('\\');
                    state = LexState::EscapeDouble;
                }
                c => current.push(c),
            },
            LexState::EscapeNormal => {
                current.push(ch);
                state = LexState::Normal;
            }
            LexState::EscapeDouble => {
                current.push(ch);
                state = LexState::DoubleQuote;
            }
        }
    }

    flush(&mut current, &mut segments);
    segments
}

/// POSIX-ish word splitting with quote handling.
///
/// Quotes group, backslashes escape, and the quote characters themselves are
/// removed from the produced words, mirroring what the shell hands the verb.
///
/// # Errors
///
/// Returns [`WordSplitError::UnterminatedQuote`] when a quote never closes;
/// the classifier treats that segment conservatively.
pub fn split_words(segment: &str) -> Result<Vec<String>, WordSplitError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut state = LexState::Normal;

    for ch in segment.chars() {
        match state {
            LexState::Normal => match ch {
                '\'' => {
                    state = LexState::SingleQuote;
                    in_word = true;
                }
                '"' => {
                    state = LexState::DoubleQuote;
                    in_word = true;
                }
                '\\' => {
                    state = LexState::EscapeNormal;
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            LexState::SingleQuote => {
                if ch == '\'' {
                    state = LexState::Normal;
                } else {
                    current.push(ch);
                }
            }
            LexState::DoubleQuote => match ch {
                '"' => state = LexState::Normal,
                '\\' => state = LexState::EscapeDouble,
                c => current.push(c),
            },
            LexState::EscapeNormal => {
                current.push(ch);
                state = LexState::Normal;
            }
            LexState::EscapeDouble => {
                // Inside double quotes, backslash only escapes a few chars.
                if !matches!(ch, '"' | '\\' | '$' | '`') {
                    current.push('\\');
                }
                current.push(ch);
                state = LexState::DoubleQuote;
            }
        }
    }

    match state {
        LexState::Normal => {
            if in_word {
                words.push(current);
            }
            Ok(words)
        }
        LexState::EscapeNormal => {
            // Trailing backslash: keep it literal.
            current.push('\\');
            words.push(current);
            Ok(words)
        }
        _ => Err(WordSplitError::UnterminatedQuote),
    }
}
