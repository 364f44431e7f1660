//! Backup manifest for centralized mode.
//!
//! A small JSONL-backed record store that is:
//! - Append-friendly for concurrent hook invocations
//! - Deterministic in serialization (one record per line, `\n`-terminated)
//! - Fail-tolerant on read (corrupt lines are skipped, not fatal)
//!
//! Writers take an exclusive advisory lock around a single-line append;
//! readers take a shared lock and skip malformed lines defensively.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Manifest file name under the backup root.
pub const MANIFEST_FILE: &str = "manifest.jsonl";

/// One backed-up item (a manifest line).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupRecord {
    /// 6-hex suffix shared with the backup filename.
    pub id: String,
    /// Name under `<backup_root>/files/`.
    pub backup_filename: String,
    /// Canonicalized path the item was deleted from.
    pub original_path: String,
    /// ISO-8601 timestamp with offset.
    pub backed_up_at: String,
    /// Zone root the item belonged to.
    pub workspace: String,
    pub is_dir: bool,
    pub size_bytes: u64,
    /// The shell command that triggered the backup.
    pub command: String,
}

/// Stats produced while loading the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestMaintenance {
    pub parse_errors: usize,
}

/// Manifest store wrapper.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The manifest for a given backup root.
    #[must_use]
    pub fn for_backup_root(backup_root: &Path) -> Self {
        Self::new(backup_root.join(MANIFEST_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record under an exclusive advisory lock.
    ///
    /// The lock is held only for the duration of the single-line append, so
    /// parallel invocations interleave whole lines, never partial ones.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while opening, locking, or writing
    /// the manifest file.
    pub fn append(&self, record: &BackupRecord) -> io::Result<()> {
        let mut file = open_locked(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        let line = serde_json::to_string(record).map_err(io::Error::other)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_data()?;
        Ok(())
    }

    /// Load all well-formed records under a shared lock.
    ///
    /// Malformed lines are skipped and counted; a missing manifest is empty.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while opening or locking the file.
    pub fn load(&self) -> io::Result<(Vec<BackupRecord>, ManifestMaintenance)> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok((Vec::new(), ManifestMaintenance::default()));
            }
            Err(err) => return Err(err),
        };
        file.lock_shared()?;

        let mut maintenance = ManifestMaintenance::default();
        let mut records = Vec::new();
        for line in BufReader::new(&file).lines() {
            let Ok(line) = line else {
                maintenance.parse_errors += 1;
                continue;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<BackupRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(_) => maintenance.parse_errors += 1,
            }
        }

        let _ = FileExt::unlock(&file);
        Ok((records, maintenance))
    }
}

fn open_locked(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> BackupRecord {
        BackupRecord {
            id: id.to_string(),
            backup_filename: format!("a_{id}.txt"),
            original_path: "/w/a.txt".to_string(),
            backed_up_at: "2026-08-02T10:00:00+00:00".to_string(),
            workspace: "/w".to_string(),
            is_dir: false,
            size_bytes: 100,
            command: "rm a.txt".to_string(),
        }
    }

    #[test]
    fn append_then_load_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let store = ManifestStore::for_backup_root(temp.path());

        store.append(&record("a3b7c9")).unwrap();
        store.append(&record("0f1e2d")).unwrap();

        let (records, maintenance) = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a3b7c9");
        assert_eq!(records[1].id, "0f1e2d");
        assert_eq!(maintenance.parse_errors, 0);
    }

    #[test]
    fn missing_manifest_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = ManifestStore::for_backup_root(&temp.path().join("nope"));
        let (records, maintenance) = store.load().unwrap();
        assert!(records.is_empty());
        assert_eq!(maintenance.parse_errors, 0);
    }

    #[test]
    fn reader_skips_malformed_lines() {
        let temp = tempfile::tempdir().unwrap();
        let store = ManifestStore::for_backup_root(temp.path());
        store.append(&record("abc123")).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap();
        writeln!(file, "{{truncated").unwrap();
        drop(file);
        store.append(&record("def456")).unwrap();

        let (records, maintenance) = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(maintenance.parse_errors, 1);
    }

    #[test]
    fn concurrent_appends_stay_line_atomic() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let root = root.clone();
                std::thread::spawn(move || {
                    let store = ManifestStore::for_backup_root(&root);
                    store.append(&record(&format!("{n:06x}"))).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = ManifestStore::for_backup_root(&root);
        let (records, maintenance) = store.load().unwrap();
        assert_eq!(records.len(), 8);
        assert_eq!(maintenance.parse_errors, 0);
    }

    #[test]
    fn record_serializes_expected_fields() {
        let json = serde_json::to_string(&record("a3b7c9")).unwrap();
        for field in [
            "\"id\"",
            "\"backup_filename\"",
            "\"original_path\"",
            "\"backed_up_at\"",
            "\"workspace\"",
            "\"is_dir\"",
            "\"size_bytes\"",
            "\"command\"",
        ] {
            assert!(json.contains(field), "missing {field} in {json}");
        }
        assert!(!json.contains('\n'));
    }
}
