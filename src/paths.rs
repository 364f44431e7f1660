//! Path utilities shared by the classifier, zone labelling, and backup engine.
//!
//! Everything here is lexical or read-only filesystem inspection; nothing in
//! this module mutates the tree.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Directory names that are never backed up. Deleting them is still allowed
/// in trusted zones; only the backup is skipped.
pub const SKIP_NAMES: &[&str] = &[
    // VCS
    ".git",
    ".svn",
    ".hg",
    // Python environments & caches
    "venv",
    ".venv",
    "env",
    "__pypackages__",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".tox",
    // Node
    "node_modules",
    // Build outputs
    "dist",
    "build",
    "out",
    "target",
    ".output",
    ".next",
    ".nuxt",
    ".svelte-kit",
    ".astro",
    // Mobile / JVM
    "Pods",
    ".gradle",
    // Coverage
    "coverage",
    ".nyc_output",
    // Caches & editor state
    ".cache",
    ".idea",
    ".vscode",
    // Temp
    "tmp",
    "temp",
    ".tmp",
];

/// Path-segment suffixes treated like skip names (Python dist metadata).
pub const SKIP_SUFFIXES: &[&str] = &[".egg-info", ".dist-info"];

/// Expand a leading `~` or `~/` using the current home directory.
#[must_use]
pub fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
        return PathBuf::from(value);
    }

    let Some(rest) = value.strip_prefix("~/") else {
        return PathBuf::from(value);
    };
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(value);
    };
    home.join(rest)
}

/// Expand `$NAME` and `${NAME}` references from the process environment.
///
/// Unset variables are left literal, matching the semantics the agent's shell
/// would have applied had the variable been exported nowhere.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    if !value.contains('$') {
        return value.to_string();
    }

    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            // Copy the whole UTF-8 character, not just one byte.
            let ch_len = utf8_len(bytes[i]);
            out.push_str(&value[i..i + ch_len]);
            i += ch_len;
            continue;
        }

        // `${NAME}` form
        if i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(close) = value[i + 2..].find('}') {
                let name = &value[i + 2..i + 2 + close];
                if is_valid_var_name(name) {
                    if let Ok(val) = std::env::var(name) {
                        out.push_str(&val);
                        i += close + 3;
                        continue;
                    }
                }
            }
            out.push('$');
            i += 1;
            continue;
        }

        // `$NAME` form
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && is_var_byte(bytes[end], end == start) {
            end += 1;
        }
        if end > start {
            let name = &value[start..end];
            if let Ok(val) = std::env::var(name) {
                out.push_str(&val);
                i = end;
                continue;
            }
        }
        out.push('$');
        i += 1;
    }

    out
}

const fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b < 0xE0 => 2,
        b if b < 0xF0 => 3,
        _ => 4,
    }
}

fn is_valid_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

const fn is_var_byte(b: u8, first: bool) -> bool {
    if first {
        b.is_ascii_alphabetic() || b == b'_'
    } else {
        b.is_ascii_alphanumeric() || b == b'_'
    }
}

/// Canonicalize a path, tolerating components that do not exist.
///
/// Symlinks are resolved through the deepest existing ancestor; the
/// non-existing tail is re-appended with `.` and `..` folded lexically.
/// Symlink indirection therefore cannot move a real target out of the zone
/// its resolved location belongs to.
#[must_use]
pub fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }

    let mut base = path.to_path_buf();
    let mut tail: Vec<OsString> = Vec::new();
    while !base.exists() {
        match base.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                base.pop();
            }
            None => break,
        }
    }

    let mut out = base.canonicalize().unwrap_or(base);
    for name in tail.iter().rev() {
        if name == ".." {
            out.pop();
        } else if name != "." {
            out.push(name);
        }
    }
    out
}

/// True when `path` equals `root` or lies beneath it.
///
/// Both sides must already be canonicalized; the test is purely lexical.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// True when any component of `path` is a skip name or carries a skip suffix.
#[must_use]
pub fn has_skip_component(path: &Path) -> bool {
    path.components().any(|component| {
        let Component::Normal(name) = component else {
            return false;
        };
        let Some(name) = name.to_str() else {
            return false;
        };
        SKIP_NAMES.contains(&name) || SKIP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    })
}

/// Size in bytes of a file, or of a directory tree with skip components
/// excluded (what a filtered backup would actually copy).
#[must_use]
pub fn backup_size(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }

    let mut total = 0;
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let child = entry.path();
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if SKIP_NAMES.contains(&name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                continue;
            }
        }
        total += backup_size(&child);
    }
    total
}

/// Total size of all regular files under `path` (no skip filtering).
#[must_use]
pub fn tree_size(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }

    let mut total = 0;
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        total += tree_size(&entry.path());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expansion_uses_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/notes.txt"), home.join("notes.txt"));
        assert_eq!(expand_tilde("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn env_expansion_known_and_unknown() {
        std::env::set_var("DLG_TEST_VAR", "alpha");
        assert_eq!(expand_env_vars("$DLG_TEST_VAR/x"), "alpha/x");
        assert_eq!(expand_env_vars("${DLG_TEST_VAR}_y"), "alpha_y");
        // Unset variables stay literal.
        assert_eq!(
            expand_env_vars("$DLG_DEFINITELY_UNSET/x"),
            "$DLG_DEFINITELY_UNSET/x"
        );
        assert_eq!(expand_env_vars("no vars here"), "no vars here");
        assert_eq!(expand_env_vars("$"), "$");
        std::env::remove_var("DLG_TEST_VAR");
    }

    #[test]
    fn lenient_canonicalize_keeps_missing_tail() {
        let temp = tempfile::tempdir().unwrap();
        let real = temp.path().canonicalize().unwrap();
        let missing = temp.path().join("nope/deeper.txt");
        assert_eq!(canonicalize_lenient(&missing), real.join("nope/deeper.txt"));

        let dotted = temp.path().join("nope/../other.txt");
        assert_eq!(canonicalize_lenient(&dotted), real.join("other.txt"));
    }

    #[test]
    fn lenient_canonicalize_resolves_symlinked_ancestor() {
        let temp = tempfile::tempdir().unwrap();
        let real_dir = temp.path().join("real");
        std::fs::create_dir(&real_dir).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real_dir, &link).unwrap();

        let via_link = link.join("missing.txt");
        let expected = real_dir.canonicalize().unwrap().join("missing.txt");
        assert_eq!(canonicalize_lenient(&via_link), expected);
    }

    #[test]
    fn boundary_is_inside() {
        let root = Path::new("/w");
        assert!(is_within(Path::new("/w"), root));
        assert!(is_within(Path::new("/w/a/b"), root));
        assert!(!is_within(Path::new("/wx"), root));
        assert!(!is_within(Path::new("/"), root));
    }

    #[test]
    fn skip_components() {
        assert!(has_skip_component(Path::new("/w/node_modules/left-pad")));
        assert!(has_skip_component(Path::new("/w/.git")));
        assert!(has_skip_component(Path::new("/w/env/bin/python")));
        assert!(has_skip_component(Path::new("/w/.svelte-kit/output")));
        assert!(has_skip_component(Path::new("/w/tmp/scratch.bin")));
        assert!(has_skip_component(Path::new("/w/pkg.egg-info/PKG-INFO")));
        assert!(!has_skip_component(Path::new("/w/src/main.rs")));
        assert!(!has_skip_component(Path::new("/w/gitlog.txt")));
        assert!(!has_skip_component(Path::new("/w/environment.yml")));
    }

    #[test]
    fn backup_size_skips_filtered_dirs() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.bin"), vec![0u8; 100]).unwrap();
        let nm = temp.path().join("node_modules");
        std::fs::create_dir(&nm).unwrap();
        std::fs::write(nm.join("big.bin"), vec![0u8; 100_000]).unwrap();

        assert_eq!(backup_size(temp.path()), 100);
        assert_eq!(tree_size(temp.path()), 100_100);
    }
}
