//! Durable install-state store backed by a single JSON file.
//!
//! The planner reads it to classify Skip steps; the executor is its only
//! writer. Every write goes through a temporary file followed by an atomic
//! rename, so a crash mid-write never corrupts previously recorded
//! entries. A missing file means nothing is installed yet.

use crate::error::AppVetError;
use crate::models::InstallRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Handle to the persisted install-state file. The in-memory map is the
/// source of truth between flushes; a `Mutex` enforces the single-writer
/// discipline when independent executors share one store.
pub struct StateStore {
    path: PathBuf,
    records: Mutex<HashMap<String, InstallRecord>>,
}

impl StateStore {
    /// Opens the store at `path`, loading existing records. A missing file
    /// is treated as an empty store, not an error.
    pub fn open(path: &Path) -> Result<Self, AppVetError> {
        let records = match fs::read_to_string(path) {
            Ok(raw) => {
                let parsed: HashMap<String, InstallRecord> = serde_json::from_str(&raw)?;
                log::info!(
                    "Loaded {} install record(s) from {}",
                    parsed.len(),
                    path.display()
                );
                parsed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No state file at {}; starting with an empty store",
                    path.display()
                );
                HashMap::new()
            }
            Err(e) => return Err(AppVetError::StateIo(e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    /// Whether `id` is recorded as installed at exactly `version`. A
    /// version mismatch reads as not installed so the planner schedules a
    /// re-install.
    pub fn is_installed(&self, id: &str, version: &str) -> bool {
        let records = self.records.lock().unwrap();
        records
            .get(id)
            .map(|r| r.installed && r.version == version)
            .unwrap_or(false)
    }

    /// Inserts or replaces the record for its identifier and persists the
    /// whole store atomically before returning.
    pub fn record(&self, record: InstallRecord) -> Result<(), AppVetError> {
        let mut records = self.records.lock().unwrap();
        log::info!(
            "Recording install of '{}' at version {}",
            record.identifier,
            record.version
        );
        records.insert(record.identifier.clone(), record);
        self.persist(&records)
    }

    /// Snapshot of every record currently in the store.
    pub fn load(&self) -> HashMap<String, InstallRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Forces the current in-memory contents to disk. `record` already
    /// persists on every call; this exists for explicit shutdown paths.
    pub fn flush(&self) -> Result<(), AppVetError> {
        let records = self.records.lock().unwrap();
        self.persist(&records)
    }

    fn persist(&self, records: &HashMap<String, InstallRecord>) -> Result<(), AppVetError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        // Write the full snapshot next to the target, then atomically
        // replace it. Renames across filesystems are not atomic, which is
        // why the temp file lives in the same directory.
        let tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&tmp, records)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppVetError::StateIo(e.error))?;
        log::debug!(
            "Persisted {} install record(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, version: &str) -> InstallRecord {
        InstallRecord {
            identifier: id.into(),
            version: version.into(),
            installed: true,
            installed_at: Utc::now(),
            artifact_path: format!("/tmp/{}.exe", id),
            dependencies: vec![],
        }
    }

    #[test]
    fn missing_file_means_nothing_installed() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.json")).unwrap();
        assert!(store.load().is_empty());
        assert!(!store.is_installed("anything", "1.0.0"));
    }

    #[test]
    fn record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::open(&path).unwrap();
        store.record(record("vim", "9.1")).unwrap();
        drop(store);

        let reopened = StateStore::open(&path).unwrap();
        assert!(reopened.is_installed("vim", "9.1"));
        assert_eq!(reopened.load().len(), 1);
    }

    #[test]
    fn version_mismatch_reads_as_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.json")).unwrap();
        store.record(record("vim", "9.0")).unwrap();
        assert!(store.is_installed("vim", "9.0"));
        assert!(!store.is_installed("vim", "9.1"));
    }

    #[test]
    fn rerecording_replaces_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.json")).unwrap();
        store.record(record("vim", "9.0")).unwrap();
        store.record(record("vim", "9.1")).unwrap();
        let records = store.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records["vim"].version, "9.1");
    }

    #[test]
    fn malformed_state_file_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ this is not json").unwrap();
        assert!(matches!(
            StateStore::open(&path),
            Err(AppVetError::StateMalformed(_))
        ));
    }
}
