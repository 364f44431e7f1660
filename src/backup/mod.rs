//! Backup engine.
//!
//! Invoked for every workspace/whitelist target before the deletion is
//! allowed. Two on-disk layouts exist: centralized (one `files/` directory
//! plus a JSONL manifest) and per-folder (a `.claude-backups/` directory
//! inside each zone root). Backup failures never change the decision; they
//! are reported on stdout and the deletion proceeds.

mod centralized;
mod per_folder;

pub use per_folder::{ensure_gitignore, GITIGNORE_ENTRY, PER_FOLDER_SIZE_CAP};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::Target;
use crate::config::{BackupMode, Config};
use crate::paths;

/// Copy a file preserving its mode and mtime.
pub(crate) fn copy_file_preserving(src: &Path, dest: &Path) -> std::io::Result<u64> {
    let meta = fs::metadata(src)?;
    let bytes = fs::copy(src, dest)?;
    fs::set_permissions(dest, meta.permissions())?;
    if let Ok(mtime) = meta.modified() {
        let file = fs::OpenOptions::new().write(true).open(dest)?;
        let _ = file.set_modified(mtime);
    }
    Ok(bytes)
}

/// Recursively copy a directory, excluding skip-set descendants.
///
/// Returns the number of bytes copied. Directory symlinks are not followed.
pub(crate) fn copy_dir_filtered(src: &Path, dest: &Path) -> std::io::Result<u64> {
    fs::create_dir_all(dest)?;
    let mut bytes = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let child = entry.path();
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if paths::SKIP_NAMES.contains(&name)
                || paths::SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
            {
                continue;
            }
        }

        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            bytes += copy_dir_filtered(&child, &target)?;
        } else if file_type.is_file() {
            bytes += copy_file_preserving(&child, &target)?;
        } else if file_type.is_symlink() {
            // Copy the referent when it is a file; skip dangling links and
            // directory links (loop hazard).
            if child.metadata().map(|m| m.is_file()).unwrap_or(false) {
                bytes += copy_file_preserving(&child, &target)?;
            }
        }
    }

    Ok(bytes)
}

/// Back up every group of trusted targets, returning stdout notes.
///
/// `groups` maps each zone root to the targets beneath it. Targets that no
/// longer exist are silently skipped; skip-set targets are reported.
#[must_use]
pub fn backup_groups(
    groups: &BTreeMap<PathBuf, Vec<Target>>,
    config: &Config,
    command: &str,
) -> Vec<String> {
    let mut notes = Vec::new();

    match config.backup_mode {
        BackupMode::Centralized => {
            for (zone_root, targets) in groups {
                centralized::backup_group(
                    &config.backup_root,
                    zone_root,
                    targets,
                    command,
                    &mut notes,
                );
            }
            centralized::warn_if_oversized(&config.backup_root, &mut notes);
        }
        BackupMode::PerFolder => {
            per_folder::backup_invocation(groups, &mut notes);
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SourceTier;
    use crate::manifest::ManifestStore;

    fn target(path: &Path) -> Target {
        Target {
            path: path.to_path_buf(),
            is_dir: path.is_dir(),
            tier: SourceTier::Direct,
        }
    }

    fn config_centralized(backup_root: &Path) -> Config {
        Config {
            backup_mode: BackupMode::Centralized,
            backup_root: backup_root.to_path_buf(),
            whitelisted_folders: Vec::new(),
            log_file: None,
        }
    }

    fn config_per_folder() -> Config {
        Config {
            backup_mode: BackupMode::PerFolder,
            backup_root: PathBuf::from("/unused"),
            whitelisted_folders: Vec::new(),
            log_file: None,
        }
    }

    #[test]
    fn centralized_file_backup_writes_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        let root = temp.path().join("backups");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("a.txt"), vec![b'x'; 100]).unwrap();

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&ws.join("a.txt"))]);
        let notes = backup_groups(&groups, &config_centralized(&root), "rm a.txt");

        assert!(notes.iter().any(|n| n.contains("Backed up")));
        let entries: Vec<_> = fs::read_dir(root.join("files")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        let name = name.to_str().unwrap().to_string();
        assert!(name.starts_with("a_") && name.ends_with(".txt"), "{name}");

        let (records, _) = ManifestStore::for_backup_root(&root).load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_path, ws.join("a.txt").display().to_string());
        assert_eq!(records[0].workspace, ws.display().to_string());
        assert_eq!(records[0].size_bytes, 100);
        assert!(!records[0].is_dir);
        assert_eq!(records[0].command, "rm a.txt");
        assert_eq!(records[0].backup_filename, name);
    }

    #[test]
    fn centralized_directory_backup_filters_skip_set() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        let root = temp.path().join("backups");
        let dir = ws.join("project");
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::create_dir_all(dir.join("node_modules/dep")).unwrap();
        fs::write(dir.join("src/lib.rs"), b"pub fn f() {}").unwrap();
        fs::write(dir.join("node_modules/dep/index.js"), b"x").unwrap();

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&dir)]);
        let notes = backup_groups(&groups, &config_centralized(&root), "rm -rf project");
        assert!(notes.iter().any(|n| n.contains("Backed up")));

        let entries: Vec<_> = fs::read_dir(root.join("files")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let copied = entries[0].as_ref().unwrap().path();
        assert!(copied.join("src/lib.rs").exists());
        assert!(!copied.join("node_modules").exists());

        let (records, _) = ManifestStore::for_backup_root(&root).load().unwrap();
        assert!(records[0].is_dir);
    }

    #[test]
    fn skip_set_target_reports_and_skips() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        let nm = ws.join("node_modules");
        fs::create_dir_all(&nm).unwrap();
        let root = temp.path().join("backups");

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&nm)]);
        let notes = backup_groups(&groups, &config_centralized(&root), "rm -rf node_modules");

        assert!(notes.iter().any(|n| n.contains("Skip")));
        assert!(!root.join("files").exists() || fs::read_dir(root.join("files")).unwrap().count() == 0);
    }

    #[test]
    fn missing_target_is_silently_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        let root = temp.path().join("backups");

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&ws.join("ghost.txt"))]);
        let notes = backup_groups(&groups, &config_centralized(&root), "rm ghost.txt");
        assert!(notes.is_empty());
    }

    #[test]
    fn per_folder_mirrors_relative_paths() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        fs::create_dir_all(ws.join("sub")).unwrap();
        fs::write(ws.join("sub/a.txt"), b"hello").unwrap();

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&ws.join("sub/a.txt"))]);
        let notes = backup_groups(&groups, &config_per_folder(), "rm sub/a.txt");
        assert!(notes.iter().any(|n| n.contains("Backed up")));

        let backups_dir = ws.join(".claude-backups");
        let invocations: Vec<_> = fs::read_dir(&backups_dir).unwrap().collect();
        assert_eq!(invocations.len(), 1);
        let inv = invocations[0].as_ref().unwrap().path();
        assert_eq!(fs::read(inv.join("sub/a.txt")).unwrap(), b"hello");

        let gitignore = fs::read_to_string(ws.join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l.trim() == ".claude-backups/"));
    }

    #[test]
    fn per_folder_cap_skips_all_backups() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("big.bin"), vec![0u8; 11 * 1024 * 1024]).unwrap();

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&ws.join("big.bin"))]);
        let notes = backup_groups(&groups, &config_per_folder(), "rm big.bin");

        assert!(notes.iter().any(|n| n.contains("size exceeds 10MB")));
        assert!(!ws.join(".claude-backups").exists());
    }

    #[test]
    fn per_folder_cap_is_cumulative_across_targets() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("one.bin"), vec![0u8; 6 * 1024 * 1024]).unwrap();
        fs::write(ws.join("two.bin"), vec![0u8; 6 * 1024 * 1024]).unwrap();

        let mut groups = BTreeMap::new();
        groups.insert(
            ws.clone(),
            vec![target(&ws.join("one.bin")), target(&ws.join("two.bin"))],
        );
        let notes = backup_groups(&groups, &config_per_folder(), "rm one.bin two.bin");

        assert!(notes.iter().any(|n| n.contains("size exceeds 10MB")));
        assert!(!ws.join(".claude-backups").exists());
    }

    #[test]
    fn per_folder_under_cap_backs_up() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("nine.bin"), vec![0u8; 9 * 1024 * 1024]).unwrap();

        let mut groups = BTreeMap::new();
        groups.insert(ws.clone(), vec![target(&ws.join("nine.bin"))]);
        let notes = backup_groups(&groups, &config_per_folder(), "rm nine.bin");

        assert!(notes.iter().any(|n| n.contains("Backed up")));
        assert!(ws.join(".claude-backups").exists());
    }

    #[test]
    fn copied_file_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("script.sh");
        fs::write(&src, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o755)).unwrap();

        let dest = temp.path().join("copy.sh");
        copy_file_preserving(&src, &dest).unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
