// active.rs — The persisted active-changeset pointer.
//
// `<changesets>/.active` holds the id of the single active changeset, or is
// empty. It is plain durable state read on every call, so separate
// invocations (and separate processes) observe the same answer.

use std::fs;
use std::path::{Path, PathBuf};

use strata_changeset::validate_changeset_id;

use crate::error::StagingError;
use crate::storage::write_atomic;

/// Reads and writes the `.active` marker file.
pub struct ActivePointer {
    path: PathBuf,
}

impl ActivePointer {
    pub fn new(changesets_dir: impl AsRef<Path>) -> Self {
        Self {
            path: changesets_dir.as_ref().join(".active"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The active changeset id, if any.
    ///
    /// A marker whose content is not a safe id is treated as unset.
    pub fn read(&self) -> Result<Option<String>, StagingError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|source| StagingError::IoError {
            path: self.path.clone(),
            source,
        })?;
        let id = content.trim();
        if id.is_empty() {
            return Ok(None);
        }
        if let Err(e) = validate_changeset_id(id) {
            tracing::warn!("ignoring active marker with unsafe id: {}", e);
            return Ok(None);
        }
        Ok(Some(id.to_string()))
    }

    /// Point the marker at `id`.
    pub fn set(&self, id: &str) -> Result<(), StagingError> {
        validate_changeset_id(id)?;
        write_atomic(&self.path, id.as_bytes())
    }

    /// Empty the marker.
    pub fn clear(&self) -> Result<(), StagingError> {
        if !self.path.exists() {
            return Ok(());
        }
        write_atomic(&self.path, b"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unset_marker_reads_none() {
        let dir = tempdir().unwrap();
        let pointer = ActivePointer::new(dir.path());
        assert_eq!(pointer.read().unwrap(), None);
        pointer.clear().unwrap();
        assert_eq!(pointer.read().unwrap(), None);
    }

    #[test]
    fn set_then_clear() {
        let dir = tempdir().unwrap();
        let pointer = ActivePointer::new(dir.path());
        pointer.set("demo-1").unwrap();
        assert_eq!(pointer.read().unwrap().as_deref(), Some("demo-1"));

        pointer.set("demo-2").unwrap();
        assert_eq!(pointer.read().unwrap().as_deref(), Some("demo-2"));

        pointer.clear().unwrap();
        assert_eq!(pointer.read().unwrap(), None);
        assert!(pointer.path().exists());
    }

    #[test]
    fn unsafe_marker_content_is_ignored() {
        let dir = tempdir().unwrap();
        let pointer = ActivePointer::new(dir.path());
        fs::write(pointer.path(), "../../etc\n").unwrap();
        assert_eq!(pointer.read().unwrap(), None);
        assert!(pointer.set("../x").is_err());
    }
}
