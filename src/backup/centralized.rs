//! Centralized backup layout.
//!
//! Everything lands under `<backup_root>/files/` with a collision-safe
//! 6-hex suffix, and every backed-up item appends one record to
//! `<backup_root>/manifest.jsonl`. Copies are staged as `.tmp-<id>` siblings
//! and renamed into place so concurrent invocations never observe a partial
//! backup under its final name.

use chrono::{Local, SecondsFormat};
use rand::Rng;
use std::fs;
use std::path::Path;

use crate::classifier::Target;
use crate::manifest::{BackupRecord, ManifestStore};
use crate::paths;

/// Directory under the backup root holding the copies.
pub const FILES_DIR: &str = "files";

/// Warn once the files directory grows past this.
const WARN_BYTES: u64 = 500 * 1024 * 1024;

/// Attempts at a fresh id before giving up on one backup.
const ID_ATTEMPTS: u32 = 8;

/// Generate a 6-hex-character backup id.
fn generate_id() -> String {
    let bytes: [u8; 3] = rand::thread_rng().gen();
    format!("{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2])
}

/// `stem_<id>.ext` for files, `name_<id>` for directories.
fn backup_name(target: &Path, id: &str, is_dir: bool) -> String {
    if is_dir {
        let name = target
            .file_name()
            .map_or_else(|| "dir".to_string(), |n| n.to_string_lossy().into_owned());
        return format!("{name}_{id}");
    }
    let stem = target
        .file_stem()
        .map_or_else(|| "file".to_string(), |s| s.to_string_lossy().into_owned());
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{stem}_{id}{ext}")
}

/// Back up one zone root's targets into the centralized layout.
pub fn backup_group(
    backup_root: &Path,
    zone_root: &Path,
    targets: &[Target],
    command: &str,
    notes: &mut Vec<String>,
) {
    let files_dir = backup_root.join(FILES_DIR);
    if let Err(err) = fs::create_dir_all(&files_dir) {
        notes.push(format!(
            "Backup unavailable ({err}): {}",
            files_dir.display()
        ));
        return;
    }
    let store = ManifestStore::for_backup_root(backup_root);

    for target in targets {
        if !target.path.exists() {
            continue;
        }
        if paths::has_skip_component(&target.path) {
            notes.push(format!("Skip (skip list): {}", target.path.display()));
            continue;
        }

        match backup_one(&files_dir, target, command, zone_root, &store) {
            Ok(backup_filename) => notes.push(format!(
                "Backed up: {} -> {}/{FILES_DIR}/{backup_filename}",
                target.path.display(),
                backup_root.display()
            )),
            Err(err) => notes.push(format!(
                "Backup failed ({err}): {}",
                target.path.display()
            )),
        }
    }
}

fn backup_one(
    files_dir: &Path,
    target: &Target,
    command: &str,
    zone_root: &Path,
    store: &ManifestStore,
) -> std::io::Result<String> {
    // Pick an unused id; the 6-hex space makes conflicts rare enough that a
    // handful of retries either succeeds or something is wrong.
    let mut chosen = None;
    for _ in 0..ID_ATTEMPTS {
        let id = generate_id();
        let name = backup_name(&target.path, &id, target.is_dir);
        if !files_dir.join(&name).exists() {
            chosen = Some((id, name));
            break;
        }
    }
    let Some((id, name)) = chosen else {
        return Err(std::io::Error::other("could not find an unused backup name"));
    };

    let staging = files_dir.join(format!(".tmp-{id}"));
    let dest = files_dir.join(&name);

    let copy_result = if target.is_dir {
        super::copy_dir_filtered(&target.path, &staging)
    } else {
        super::copy_file_preserving(&target.path, &staging)
    };
    let size_bytes = match copy_result {
        Ok(bytes) => bytes,
        Err(err) => {
            remove_staging(&staging, target.is_dir);
            return Err(err);
        }
    };
    if let Err(err) = fs::rename(&staging, &dest) {
        remove_staging(&staging, target.is_dir);
        return Err(err);
    }

    let record = BackupRecord {
        id,
        backup_filename: name.clone(),
        original_path: target.path.display().to_string(),
        backed_up_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        workspace: zone_root.display().to_string(),
        is_dir: target.is_dir,
        size_bytes,
        command: command.to_string(),
    };
    store.append(&record)?;

    Ok(name)
}

fn remove_staging(staging: &Path, is_dir: bool) {
    if is_dir {
        let _ = fs::remove_dir_all(staging);
    } else {
        let _ = fs::remove_file(staging);
    }
}

/// Emit at most one warning per invocation when `files/` grows too large.
pub fn warn_if_oversized(backup_root: &Path, notes: &mut Vec<String>) {
    let files_dir = backup_root.join(FILES_DIR);
    if !files_dir.exists() {
        return;
    }
    let total = paths::tree_size(&files_dir);
    if total > WARN_BYTES {
        notes.push(format!(
            "Warning: backup folder is {}MB ({}). Run /claude-code-protect:backup-clear to free space.",
            total / (1024 * 1024),
            backup_root.display()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_six_hex_chars() {
        for _ in 0..64 {
            let id = generate_id();
            assert_eq!(id.len(), 6);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn backup_names_keep_stem_and_extension() {
        assert_eq!(
            backup_name(Path::new("/w/Button.tsx"), "a3b7c9", false),
            "Button_a3b7c9.tsx"
        );
        assert_eq!(
            backup_name(Path::new("/w/Makefile"), "a3b7c9", false),
            "Makefile_a3b7c9"
        );
        assert_eq!(
            backup_name(Path::new("/w/src"), "a3b7c9", true),
            "src_a3b7c9"
        );
    }

    #[test]
    fn no_tmp_leftovers_after_successful_backup() {
        use crate::classifier::SourceTier;

        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("f.txt"), b"data").unwrap();
        let root = temp.path().join("backups");

        let target = Target {
            path: ws.join("f.txt"),
            is_dir: false,
            tier: SourceTier::Direct,
        };
        let mut notes = Vec::new();
        backup_group(&root, &ws, &[target], "rm f.txt", &mut notes);

        let leftover = fs::read_dir(root.join(FILES_DIR))
            .unwrap()
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().starts_with(".tmp-"));
        assert!(!leftover);
    }

    #[test]
    fn oversize_warning_fires_only_past_threshold() {
        let temp = tempfile::tempdir().unwrap();
        let files = temp.path().join(FILES_DIR);
        fs::create_dir_all(&files).unwrap();
        fs::write(files.join("small.bin"), vec![0u8; 1024]).unwrap();

        let mut notes = Vec::new();
        warn_if_oversized(temp.path(), &mut notes);
        assert!(notes.is_empty());
    }
}
