//! Per-folder backup layout.
//!
//! Backups live inside each zone root under
//! `.claude-backups/<YYYY-MM-DD_HH-MM-SS>_<pid>/`, mirroring the target's
//! path relative to that root. The `<ts>_<pid>` directory is unique per
//! invocation, so two parallel invocations never share one. A 10 MB cap on
//! the combined size of all items in the invocation keeps this mode cheap;
//! over the cap, the backup is skipped (reported once) and the deletion
//! still proceeds.

use chrono::Local;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::classifier::Target;
use crate::paths;

/// Combined size cap for one invocation's backups.
pub const PER_FOLDER_SIZE_CAP: u64 = 10 * 1024 * 1024;

/// The line maintained in each zone root's `.gitignore`.
pub const GITIGNORE_ENTRY: &str = ".claude-backups/";

/// Directory name inside each zone root.
const BACKUPS_DIR: &str = ".claude-backups";

/// Back up all groups for this invocation, honoring the combined size cap.
pub fn backup_invocation(groups: &BTreeMap<PathBuf, Vec<Target>>, notes: &mut Vec<String>) {
    let mut total = 0u64;
    for (_, targets) in groups.iter() {
        for target in targets {
            if !target.path.exists() || paths::has_skip_component(&target.path) {
                continue;
            }
            total += paths::backup_size(&target.path);
        }
    }

    if total > PER_FOLDER_SIZE_CAP {
        notes.push(format!(
            "Backup skipped: size exceeds 10MB (total {} MB)",
            total / (1024 * 1024)
        ));
        return;
    }

    let stamp = format!(
        "{}_{}",
        Local::now().format("%Y-%m-%d_%H-%M-%S"),
        std::process::id()
    );

    for (zone_root, targets) in groups {
        backup_group(zone_root, targets, &stamp, notes);
    }
}

fn backup_group(zone_root: &Path, targets: &[Target], stamp: &str, notes: &mut Vec<String>) {
    let invocation_dir = zone_root.join(BACKUPS_DIR).join(stamp);
    let mut created = false;

    for target in targets {
        if !target.path.exists() {
            continue;
        }
        if paths::has_skip_component(&target.path) {
            notes.push(format!("Skip (skip list): {}", target.path.display()));
            continue;
        }

        if !created {
            if let Err(err) = fs::create_dir_all(&invocation_dir) {
                notes.push(format!(
                    "Backup unavailable ({err}): {}",
                    invocation_dir.display()
                ));
                return;
            }
            ensure_gitignore(zone_root);
            created = true;
        }

        let rel = target
            .path
            .strip_prefix(zone_root)
            .map_or_else(|_| PathBuf::from(target.path.file_name().unwrap_or_default()), Path::to_path_buf);
        let dest = invocation_dir.join(&rel);

        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            if target.is_dir {
                super::copy_dir_filtered(&target.path, &dest)?;
            } else {
                super::copy_file_preserving(&target.path, &dest)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => notes.push(format!(
                "Backed up: {} -> {}/{stamp}/{}",
                rel.display(),
                BACKUPS_DIR,
                rel.display()
            )),
            Err(err) => notes.push(format!("Backup failed for {} ({err})", rel.display())),
        }
    }
}

/// Make sure `.claude-backups/` is ignored in the zone root's `.gitignore`.
///
/// Read-modify-write under an advisory lock on the gitignore file itself.
/// Lock contention or any I/O failure skips the update: the entry is
/// cosmetic, and a missed append is repaired by the next invocation.
pub fn ensure_gitignore(zone_root: &Path) {
    let path = zone_root.join(".gitignore");
    let Ok(mut file) = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
    else {
        return;
    };
    if file.try_lock_exclusive().is_err() {
        return;
    }

    let mut content = String::new();
    if file.read_to_string(&mut content).is_err() {
        let _ = FileExt::unlock(&file);
        return;
    }

    let present = content
        .lines()
        .any(|line| matches!(line.trim(), ".claude-backups/" | ".claude-backups"));
    if !present {
        let mut tail = String::new();
        if !content.is_empty() && !content.ends_with('\n') {
            tail.push('\n');
        }
        tail.push_str(GITIGNORE_ENTRY);
        tail.push('\n');
        let _ = file
            .seek(SeekFrom::End(0))
            .and_then(|_| file.write_all(tail.as_bytes()));
    }

    let _ = FileExt::unlock(&file);
}
