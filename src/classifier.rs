//! Three-tier deletion classifier.
//!
//! Decides whether a shell command deletes files and, when it does, which
//! paths it targets. The tiers are checked in a fixed order:
//!
//! 1. **Tier 3 — obfuscation** (checked first): `$(…)`, backticks, `eval`,
//!    `base64 | sh`, and inline interpreters carrying deletion identifiers.
//!    These forms hide their targets, so `eval "rm -rf /"` is never
//!    optimistically resolved.
//! 2. **Tier 2 — dry-run templates**: `find … -delete`/`-exec rm` and
//!    `git clean -f…` are re-executed non-destructively to enumerate targets.
//! 3. **Tier 1 — direct verbs**: a verb table with per-verb option sets;
//!    remaining tokens resolve to paths.
//!
//! Segments (split on top-level `&&`, `||`, `;`, `|`) are analysed
//! independently and merged conservatively: any unresolvable segment makes
//! the whole command unresolvable.

use memchr::memmem;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::dryrun;
use crate::normalize;
use crate::paths;
use crate::shellwords;

/// How a target was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTier {
    /// Parsed directly from the command's arguments.
    Direct,
    /// Enumerated by a dry-run re-execution.
    DryRun,
}

/// A resolved deletion target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Canonicalized absolute path.
    pub path: PathBuf,
    /// Whether the path currently refers to a directory.
    pub is_dir: bool,
    /// Where the target came from (diagnostics only).
    pub tier: SourceTier,
}

impl Target {
    fn resolved(path: PathBuf, tier: SourceTier) -> Self {
        let path = paths::canonicalize_lenient(&path);
        let is_dir = path.is_dir();
        Self { path, is_dir, tier }
    }
}

/// Classifier verdict for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The command does not delete anything.
    NotDeletion,
    /// The command deletes the listed targets.
    Deletion {
        targets: Vec<Target>,
        tier: SourceTier,
    },
    /// Deletion targets cannot be enumerated without executing the command.
    Unresolvable { reason: String },
}

// ---------------------------------------------------------------------------
// Verb table
// ---------------------------------------------------------------------------

/// A deletion verb with the options it understands.
struct VerbSpec {
    /// Lowercased verb name matched against the command basename.
    name: &'static str,
    /// Single-character flags accepted in clusters (`-rf`).
    short_flags: &'static [char],
    /// Whole-token options (lowercased), `--long` or PowerShell `-Word`.
    long_flags: &'static [&'static str],
    /// Options that consume the following token.
    value_flags: &'static [&'static str],
}

const VERBS: &[VerbSpec] = &[
    VerbSpec {
        name: "rm",
        short_flags: &['r', 'R', 'f', 'i', 'I', 'v', 'd'],
        long_flags: &[
            "--recursive",
            "--force",
            "--interactive",
            "--verbose",
            "--dir",
            "--one-file-system",
            "--preserve-root",
            "--no-preserve-root",
            "--help",
            "--version",
        ],
        value_flags: &[],
    },
    VerbSpec {
        name: "rmdir",
        short_flags: &['p', 'v'],
        long_flags: &["--parents", "--ignore-fail-on-non-empty", "--verbose"],
        value_flags: &[],
    },
    VerbSpec {
        name: "unlink",
        short_flags: &[],
        long_flags: &["--help", "--version"],
        value_flags: &[],
    },
    VerbSpec {
        name: "shred",
        short_flags: &['f', 'u', 'v', 'z', 'x'],
        long_flags: &[
            "--force",
            "--remove",
            "--verbose",
            "--zero",
            "--exact",
            "--iterations",
            "--size",
        ],
        value_flags: &["-n", "-s"],
    },
    VerbSpec {
        name: "trash",
        short_flags: &['f', 'i', 'r', 'v', 'd'],
        long_flags: &["--force", "--interactive", "--verbose"],
        value_flags: &[],
    },
    VerbSpec {
        name: "trash-put",
        short_flags: &['f', 'i', 'r', 'v', 'd'],
        long_flags: &["--force", "--interactive", "--verbose"],
        value_flags: &[],
    },
    VerbSpec {
        name: "rimraf",
        short_flags: &['r', 'f', 'g', 'v'],
        long_flags: &["--glob", "--no-glob", "--verbose", "--preserve-root"],
        value_flags: &[],
    },
    VerbSpec {
        name: "del",
        short_flags: &[],
        long_flags: &[],
        value_flags: &[],
    },
    VerbSpec {
        name: "erase",
        short_flags: &[],
        long_flags: &[],
        value_flags: &[],
    },
    VerbSpec {
        name: "rd",
        short_flags: &[],
        long_flags: &[],
        value_flags: &[],
    },
    VerbSpec {
        name: "remove-item",
        short_flags: &[],
        long_flags: &[
            "-recurse", "-force", "-confirm", "-whatif", "-verbose", "-path", "-literalpath",
        ],
        value_flags: &["-erroraction"],
    },
    VerbSpec {
        name: "ri",
        short_flags: &[],
        long_flags: &[
            "-recurse", "-force", "-confirm", "-whatif", "-verbose", "-path", "-literalpath",
        ],
        value_flags: &["-erroraction"],
    },
];

fn verb_spec(name: &str) -> Option<&'static VerbSpec> {
    let lower = name.to_ascii_lowercase();
    VERBS.iter().find(|spec| spec.name == lower)
}

// ---------------------------------------------------------------------------
// Quick rejection
// ---------------------------------------------------------------------------

/// Substrings (lowercased) that must appear for any tier to possibly match.
const REJECT_NEEDLES: &[&str] = &[
    "rm", "rd", "ri", "del", "erase", "unlink", "shred", "trash", "remove", "find", "git",
    "eval", "base64", "python", "node", "perl", "$(", "`",
];

static FINDERS: LazyLock<Vec<memmem::Finder<'static>>> = LazyLock::new(|| {
    REJECT_NEEDLES.iter().map(|n| memmem::Finder::new(n)).collect()
});

/// True when no deletion-relevant substring appears; such commands are
/// allowed without any further work (the hot path).
#[inline]
fn quick_reject(lowercased: &str) -> bool {
    let bytes = lowercased.as_bytes();
    FINDERS.iter().all(|finder| finder.find(bytes).is_none())
}

// ---------------------------------------------------------------------------
// Tier 3 — obfuscation
// ---------------------------------------------------------------------------

static EVAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\beval\b").unwrap());
static BASE64_PIPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bbase64\b.*\|\s*(?:ba)?sh\b|\bbase64\b.*\|\s*python").unwrap());
static INLINE_INTERP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpython[23]?(?:\.\d+)?\s+-c\b|\bnode\s+-e\b|\bperl\s+-e\b").unwrap()
});

/// Deletion identifiers that make an inline interpreter suspicious.
const DELETION_IDENTIFIERS: &[&str] = &[
    "rmtree",
    "unlink",
    "remove",
    "rmSync",
    "rmdirSync",
    "unlinkSync",
    "fs.rm",
];

fn obfuscation_reason(command: &str, lower: &str) -> Option<&'static str> {
    // Opaque payloads are unresolvable regardless of any visible verb: the
    // deletion (if there is one) lives inside content we cannot read.
    if BASE64_PIPE_RE.is_match(command) {
        return Some("base64-piped script hides what is actually executed");
    }
    if INLINE_INTERP_RE.is_match(command)
        && DELETION_IDENTIFIERS.iter().any(|id| command.contains(id))
    {
        return Some("inline interpreter performs deletions out of band");
    }

    // Substitution and eval hide targets, but only matter when a deletion
    // is in play somewhere: `echo $(date)` stays a non-deletion.
    if mentions_deletion_identifier(lower) {
        if command.contains("$(") {
            return Some("command substitution $(...) hides deletion targets");
        }
        if command.contains('`') {
            return Some("backtick substitution hides deletion targets");
        }
        if EVAL_RE.is_match(command) {
            return Some("eval hides what is actually executed");
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Per-segment analysis
// ---------------------------------------------------------------------------

enum SegmentResult {
    NotDeletion,
    Targets(Vec<Target>, SourceTier),
    Unresolvable(String),
}

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

fn segment_mentions_deletion(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    !quick_reject(&lower)
}

/// Detect `find … -delete` / `find … -exec|-execdir|-ok rm …`.
fn is_find_deletion(words: &[String]) -> bool {
    if basename(&words[0]) != "find" {
        return false;
    }
    let mut iter = words.iter().skip(1).peekable();
    while let Some(word) = iter.next() {
        match word.as_str() {
            "-delete" => return true,
            "-exec" | "-execdir" | "-ok" => {
                if iter.peek().is_some_and(|next| basename(next) == "rm") {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Detect `git clean` with a force flag (`-f` in any cluster, or `--force`).
fn is_git_clean_force(words: &[String]) -> bool {
    if basename(&words[0]) != "git" || words.get(1).map(String::as_str) != Some("clean") {
        return false;
    }
    words[2..].iter().any(|word| {
        word == "--force"
            || (word.starts_with('-') && !word.starts_with("--") && word.contains('f'))
    })
}

/// Detect `xargs rm` / `xargs unlink` (targets arrive via a pipe).
fn is_xargs_deletion(words: &[String]) -> bool {
    if basename(&words[0]) != "xargs" {
        return false;
    }
    words[1..]
        .iter()
        .any(|word| matches!(basename(word), "rm" | "unlink"))
}

/// Resolve one path token: `$VAR` and `~` expansion, cwd join, glob check,
/// lenient canonicalization.
fn resolve_token(token: &str, cwd: &Path, tier: SourceTier) -> Result<Target, String> {
    let expanded = paths::expand_env_vars(token);
    let expanded_path = if expanded.starts_with('~') {
        paths::expand_tilde(&expanded)
    } else {
        PathBuf::from(&expanded)
    };
    let absolute = if expanded_path.is_absolute() {
        expanded_path
    } else {
        cwd.join(expanded_path)
    };

    let has_glob = expanded.contains(['*', '?', '[']);
    if has_glob && !absolute.exists() {
        return Err(format!("glob pattern '{token}' cannot be enumerated"));
    }

    Ok(Target::resolved(absolute, tier))
}

/// Parse the argument list of a tier-1 deletion verb.
fn parse_verb_targets(
    spec: &VerbSpec,
    words: &[String],
    cwd: &Path,
) -> Result<Vec<Target>, String> {
    let mut targets = Vec::new();
    let mut end_of_flags = false;
    let mut skip_value = false;

    for word in &words[1..] {
        if skip_value {
            skip_value = false;
            continue;
        }
        if !end_of_flags && word == "--" {
            end_of_flags = true;
            continue;
        }
        if !end_of_flags && word.starts_with('-') && word.len() > 1 {
            let lower = word.to_ascii_lowercase();
            let base = lower.split('=').next().unwrap_or(&lower);

            if spec.value_flags.contains(&base) {
                if !lower.contains('=') {
                    skip_value = true;
                }
                continue;
            }
            if spec.long_flags.contains(&base) {
                continue;
            }
            if !word.starts_with("--")
                && word.len() > 1
                && word[1..].chars().all(|c| spec.short_flags.contains(&c))
                && !spec.short_flags.is_empty()
            {
                continue;
            }
            return Err(format!(
                "option '{word}' is not recognized for {}",
                spec.name
            ));
        }

        targets.push(resolve_token(word, cwd, SourceTier::Direct)?);
    }

    Ok(targets)
}

fn analyze_segment(segment: &str, cwd: &Path) -> SegmentResult {
    let words = match shellwords::split_words(segment) {
        Ok(words) => words,
        Err(err) => {
            // Only escalate lexing trouble when the segment smells like a
            // deletion; otherwise it is not our problem.
            if segment_mentions_deletion(segment) {
                return SegmentResult::Unresolvable(format!("{err} in deletion command"));
            }
            return SegmentResult::NotDeletion;
        }
    };

    let normalized = normalize::strip_wrappers(&words);
    let words = normalized.command_words(&words);
    if words.is_empty() {
        return SegmentResult::NotDeletion;
    }

    // Tier 2: dry-run templates.
    if is_find_deletion(words) {
        return match dryrun::expand_find(words, cwd) {
            Ok(found) => SegmentResult::Targets(
                found
                    .into_iter()
                    .map(|p| Target::resolved(p, SourceTier::DryRun))
                    .collect(),
                SourceTier::DryRun,
            ),
            Err(err) => SegmentResult::Unresolvable(err.to_string()),
        };
    }
    if is_git_clean_force(words) {
        return match dryrun::expand_git_clean(words, cwd) {
            Ok(found) => SegmentResult::Targets(
                found
                    .into_iter()
                    .map(|p| Target::resolved(p, SourceTier::DryRun))
                    .collect(),
                SourceTier::DryRun,
            ),
            Err(err) => SegmentResult::Unresolvable(err.to_string()),
        };
    }

    if is_xargs_deletion(words) {
        return SegmentResult::Unresolvable(
            "xargs deletion reads its targets from a pipe".to_string(),
        );
    }

    // Tier 1: direct verbs.
    let Some(spec) = verb_spec(basename(&words[0])) else {
        return SegmentResult::NotDeletion;
    };
    match parse_verb_targets(spec, words, cwd) {
        Ok(targets) => SegmentResult::Targets(targets, SourceTier::Direct),
        Err(reason) => SegmentResult::Unresolvable(reason),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Classify a shell command.
///
/// `cwd` anchors relative paths and dry-run re-execution.
#[must_use]
pub fn classify_command(command: &str, cwd: &Path) -> Classification {
    if command.trim().is_empty() {
        return Classification::NotDeletion;
    }

    // Hot path: nothing deletion-shaped anywhere in the command.
    let lower = command.to_ascii_lowercase();
    if quick_reject(&lower) {
        return Classification::NotDeletion;
    }

    // Tier 3 runs on the raw string before any segment parsing, so that
    // obfuscated forms are never optimistically resolved.
    if let Some(reason) = obfuscation_reason(command, &lower) {
        return Classification::Unresolvable {
            reason: reason.to_string(),
        };
    }

    let mut all_targets: Vec<Target> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut any_deletion = false;
    let mut tier = SourceTier::Direct;

    for segment in shellwords::split_segments(command) {
        match analyze_segment(&segment, cwd) {
            SegmentResult::NotDeletion => {}
            SegmentResult::Targets(targets, segment_tier) => {
                any_deletion = true;
                if segment_tier == SourceTier::DryRun {
                    tier = SourceTier::DryRun;
                }
                for target in targets {
                    if seen.insert(target.path.clone()) {
                        all_targets.push(target);
                    }
                }
            }
            SegmentResult::Unresolvable(reason) => {
                return Classification::Unresolvable { reason };
            }
        }
    }

    if any_deletion {
        Classification::Deletion {
            targets: all_targets,
            tier,
        }
    } else {
        Classification::NotDeletion
    }
}

/// True when the command mentions any deletion verb or identifier; gates the
/// tier-3 verdict so `echo $(date)` stays a non-deletion.
fn mentions_deletion_identifier(lower: &str) -> bool {
    const HINTS: &[&str] = &[
        "rm", "rd ", "ri ", "del", "erase", "unlink", "shred", "trash", "rmtree", "remove",
        "find", "clean",
    ];
    HINTS.iter().any(|hint| lower.contains(hint))
}
