// storage.rs — Durable changeset persistence.
//
// Each changeset lives in its own directory:
//
//   <changesets>/<id>/metadata.json — identity, status, base snapshot, stats
//   <changesets>/<id>/changes.json  — ordered array of change records
//
// Metadata is small and rewritten on every status change; changes grow with
// the batch. Each file is written through a temp file and renamed, so a
// single file is never half-written. There is no cross-file atomicity:
// changes are written before metadata, and callers only call `save()` once
// all in-memory checks for an operation have passed.
//
// Dot-entries in the changesets directory (`.active`, `.lock`) belong to
// other components and are skipped by `list()`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_changeset::{
    validate_changeset_id, ChangeRecord, Changeset, ChangesetStats, ChangesetStatus,
};

use crate::error::StagingError;

const METADATA_FILE: &str = "metadata.json";
const CHANGES_FILE: &str = "changes.json";

/// On-disk shape of `metadata.json`.
///
/// `status` is kept as a raw string so legacy names can be mapped at this
/// boundary; `stats` is written for human readers and ignored on load.
#[derive(Debug, Serialize, Deserialize)]
struct ChangesetMetadata {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_snapshot: Option<String>,
    #[serde(default)]
    stats: ChangesetStats,
}

/// File-backed store of changesets, one directory per id.
pub struct ChangesetStorage {
    dir: PathBuf,
}

impl ChangesetStorage {
    /// Create a store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StagingError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StagingError::IoError {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create and persist a new, empty changeset.
    pub fn create(
        &self,
        id: &str,
        name: &str,
        description: Option<String>,
        base_snapshot: Option<String>,
    ) -> Result<Changeset, StagingError> {
        let path = self.changeset_dir(id)?;
        if path.exists() {
            return Err(StagingError::AlreadyExists(id.to_string()));
        }
        let changeset = Changeset::new(id, name, description, base_snapshot);
        self.save(&changeset)?;
        tracing::debug!("created changeset directory {}", path.display());
        Ok(changeset)
    }

    /// Load a changeset. Returns `None` when its directory does not exist.
    pub fn load(&self, id: &str) -> Result<Option<Changeset>, StagingError> {
        let path = self.changeset_dir(id)?;
        if !path.is_dir() {
            return Ok(None);
        }

        let metadata_path = path.join(METADATA_FILE);
        if !metadata_path.exists() {
            return Err(StagingError::Corrupt {
                id: id.to_string(),
                reason: format!("missing {}", METADATA_FILE),
            });
        }
        let metadata: ChangesetMetadata = read_json(&metadata_path)?;
        if metadata.id != id {
            return Err(StagingError::Corrupt {
                id: id.to_string(),
                reason: format!("metadata names id '{}'", metadata.id),
            });
        }

        let (status, legacy) = ChangesetStatus::from_stored(&metadata.status)?;
        if legacy {
            tracing::debug!(
                "changeset '{}' has legacy status '{}', reading as '{}'",
                id,
                metadata.status,
                status
            );
        }

        let changes_path = path.join(CHANGES_FILE);
        let changes: Vec<ChangeRecord> = if changes_path.exists() {
            read_json(&changes_path)?
        } else {
            tracing::warn!("changeset '{}' has no {}, treating as empty", id, CHANGES_FILE);
            Vec::new()
        };

        Ok(Some(Changeset {
            id: metadata.id,
            name: metadata.name,
            description: metadata.description,
            created: metadata.created,
            modified: metadata.modified,
            status,
            base_snapshot: metadata.base_snapshot,
            changes,
        }))
    }

    /// Persist a changeset (creates or overwrites both files).
    pub fn save(&self, changeset: &Changeset) -> Result<(), StagingError> {
        let path = self.changeset_dir(&changeset.id)?;
        fs::create_dir_all(&path).map_err(|source| StagingError::IoError {
            path: path.clone(),
            source,
        })?;

        let changes = serde_json::to_string_pretty(&changeset.changes)?;
        write_atomic(&path.join(CHANGES_FILE), changes.as_bytes())?;

        let metadata = ChangesetMetadata {
            id: changeset.id.clone(),
            name: changeset.name.clone(),
            description: changeset.description.clone(),
            created: changeset.created,
            modified: changeset.modified,
            status: changeset.status.to_string(),
            base_snapshot: changeset.base_snapshot.clone(),
            stats: changeset.stats(),
        };
        let metadata = serde_json::to_string_pretty(&metadata)?;
        write_atomic(&path.join(METADATA_FILE), metadata.as_bytes())?;
        Ok(())
    }

    /// List every readable changeset, oldest first.
    ///
    /// Directories that fail to load are skipped with a warning so one
    /// corrupt changeset does not hide the others.
    pub fn list(&self) -> Result<Vec<Changeset>, StagingError> {
        let mut changesets = Vec::new();

        let entries = fs::read_dir(&self.dir).map_err(|source| StagingError::IoError {
            path: self.dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| StagingError::IoError {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            if validate_changeset_id(&name).is_err() {
                tracing::warn!("skipping changeset directory with unsafe name '{}'", name);
                continue;
            }
            match self.load(&name) {
                Ok(Some(changeset)) => changesets.push(changeset),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping unreadable changeset '{}': {}", name, e),
            }
        }

        changesets.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(changesets)
    }

    /// Delete a changeset directory. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> Result<bool, StagingError> {
        let path = self.changeset_dir(id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&path).map_err(|source| StagingError::IoError { path, source })?;
        Ok(true)
    }

    /// Append a change to a stored changeset and persist it.
    ///
    /// Returns the updated changeset; the new record is last.
    pub fn add_change(&self, id: &str, change: ChangeRecord) -> Result<Changeset, StagingError> {
        let mut changeset = self
            .load(id)?
            .ok_or_else(|| StagingError::NotFound(id.to_string()))?;
        changeset.add_change(change)?;
        self.save(&changeset)?;
        Ok(changeset)
    }

    /// Remove every change for `element_id` and persist the renumbered list.
    ///
    /// Returns how many records were removed.
    pub fn remove_change(&self, id: &str, element_id: &str) -> Result<usize, StagingError> {
        let mut changeset = self
            .load(id)?
            .ok_or_else(|| StagingError::NotFound(id.to_string()))?;
        let removed = changeset.remove_changes_for(element_id)?;
        self.save(&changeset)?;
        Ok(removed)
    }

    /// Directory for a changeset id. Validates the id first.
    fn changeset_dir(&self, id: &str) -> Result<PathBuf, StagingError> {
        validate_changeset_id(id)?;
        Ok(self.dir.join(id))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StagingError> {
    let json = fs::read_to_string(path).map_err(|source| StagingError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Write through a sibling temp file and rename over the target.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StagingError> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|source| StagingError::IoError {
                path: temp_path.clone(),
                source,
            })?;
        file.write_all(data)
            .and_then(|_| file.sync_all())
            .map_err(|source| StagingError::IoError {
                path: temp_path.clone(),
                source,
            })?;
    }
    fs::rename(&temp_path, path).map_err(|source| StagingError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_changeset::ChangesetError;
    use strata_model::Element;
    use tempfile::tempdir;

    fn add(id: &str) -> ChangeRecord {
        ChangeRecord::add("api", Element::new(id, "endpoint", id))
    }

    #[test]
    fn create_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path().join("changesets")).unwrap();

        let created = storage
            .create("demo-1", "demo", Some("first".into()), Some("hash".into()))
            .unwrap();
        let loaded = storage.load("demo-1").unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(dir.path().join("changesets/demo-1/metadata.json").exists());
        assert!(dir.path().join("changesets/demo-1/changes.json").exists());
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        assert!(storage.load("nope").unwrap().is_none());
    }

    #[test]
    fn create_twice_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        storage.create("demo-1", "demo", None, None).unwrap();
        assert!(matches!(
            storage.create("demo-1", "demo", None, None),
            Err(StagingError::AlreadyExists(_))
        ));
    }

    #[test]
    fn add_and_remove_change_persist() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        storage.create("demo-1", "demo", None, None).unwrap();

        storage.add_change("demo-1", add("e1")).unwrap();
        storage.add_change("demo-1", add("e2")).unwrap();
        storage.add_change("demo-1", add("e3")).unwrap();
        assert_eq!(storage.remove_change("demo-1", "e2").unwrap(), 1);

        let loaded = storage.load("demo-1").unwrap().unwrap();
        let ids: Vec<&str> = loaded.changes.iter().map(|c| c.element_id.as_str()).collect();
        let seqs: Vec<usize> = loaded.changes.iter().map(|c| c.sequence_number).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn add_change_to_missing_changeset_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        assert!(matches!(
            storage.add_change("ghost", add("e1")),
            Err(StagingError::NotFound(_))
        ));
    }

    #[test]
    fn stored_stats_are_ignored_on_load() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        storage.create("demo-1", "demo", None, None).unwrap();
        storage.add_change("demo-1", add("e1")).unwrap();

        let metadata_path = dir.path().join("demo-1").join(METADATA_FILE);
        let mut metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&metadata_path).unwrap()).unwrap();
        metadata["stats"]["additions"] = serde_json::json!(99);
        fs::write(&metadata_path, metadata.to_string()).unwrap();

        let loaded = storage.load("demo-1").unwrap().unwrap();
        assert_eq!(loaded.stats().additions, 1);
    }

    #[test]
    fn legacy_status_is_mapped_on_load() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        storage.create("old-1", "old", None, None).unwrap();

        let metadata_path = dir.path().join("old-1").join(METADATA_FILE);
        let json = fs::read_to_string(&metadata_path)
            .unwrap()
            .replace("\"staged\"", "\"applied\"");
        fs::write(&metadata_path, json).unwrap();

        let mut loaded = storage.load("old-1").unwrap().unwrap();
        assert_eq!(loaded.status, ChangesetStatus::Committed);

        // Saving rewrites the current name.
        loaded.name = "old renamed".into();
        storage.save(&loaded).unwrap();
        let raw = fs::read_to_string(&metadata_path).unwrap();
        assert!(raw.contains("\"committed\""));
    }

    #[test]
    fn list_skips_dot_entries_and_corrupt_dirs() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        storage.create("a-1", "a", None, None).unwrap();
        storage.create("b-1", "b", None, None).unwrap();
        fs::write(dir.path().join(".active"), "a-1").unwrap();
        fs::create_dir_all(dir.path().join(".lock")).unwrap();
        fs::create_dir_all(dir.path().join("broken")).unwrap();

        let listed = storage.list().unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a-1"));
        assert!(ids.contains(&"b-1"));
    }

    #[test]
    fn delete_removes_directory() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path()).unwrap();
        storage.create("demo-1", "demo", None, None).unwrap();
        assert!(storage.delete("demo-1").unwrap());
        assert!(!storage.delete("demo-1").unwrap());
        assert!(storage.load("demo-1").unwrap().is_none());
    }

    #[test]
    fn unsafe_ids_rejected_before_io() {
        let dir = tempdir().unwrap();
        let storage = ChangesetStorage::new(dir.path().join("changesets")).unwrap();
        for id in ["../../etc/passwd", "", "a|b"] {
            assert!(matches!(
                storage.load(id),
                Err(StagingError::Changeset(ChangesetError::InvalidArgument { .. }))
                    | Err(StagingError::Changeset(ChangesetError::PathTraversal { .. }))
                    | Err(StagingError::Changeset(ChangesetError::IllegalCharacter { .. }))
            ));
            assert!(storage.create(id, "x", None, None).is_err());
            assert!(storage.delete(id).is_err());
        }
        // Nothing escaped the store directory.
        assert!(!dir.path().join("etc").exists());
    }
}
