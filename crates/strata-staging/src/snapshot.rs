// snapshot.rs — Whole-model content hashing for drift detection.
//
// A snapshot is a SHA-256 digest (64 lowercase hex chars) over a canonical
// serialization of every layer. Layers are visited in name order and
// elements live in ordered maps, so an unchanged model always produces the
// same digest, and any element add/update/delete anywhere changes it.
//
// Each layer contributes `name \0 json(elements) \0` so that moving an
// element between layers is not hash-neutral.

use std::path::Path;

use sha2::{Digest, Sha256};
use strata_model::Model;

use crate::error::StagingError;

/// Computes model snapshot hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotManager;

impl SnapshotManager {
    pub fn new() -> Self {
        Self
    }

    /// Hash the in-memory state of a model.
    pub fn capture_snapshot(&self, model: &Model) -> Result<String, StagingError> {
        let mut hasher = Sha256::new();
        for layer in model.layers() {
            hasher.update(layer.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(serde_json::to_vec(&layer.elements)?);
            hasher.update([0u8]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Hash the model as currently persisted under `model_root`.
    ///
    /// Loading from disk makes the hash reflect edits saved by any other
    /// Model instance, which is what drift detection needs.
    pub fn capture_persisted(&self, model_root: &Path) -> Result<String, StagingError> {
        let model = Model::load(model_root)?;
        self.capture_snapshot(&model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_model::{Element, ElementPatch, Layer};
    use tempfile::tempdir;

    fn model(root: &Path) -> Model {
        let mut model = Model::init(root, "snap").unwrap();
        model.add_layer(Layer::new("api")).unwrap();
        model.add_layer(Layer::new("data")).unwrap();
        model
            .get_layer_mut("api")
            .unwrap()
            .add_element(Element::new("api.endpoint.ping", "endpoint", "Ping"))
            .unwrap();
        model
    }

    #[test]
    fn snapshot_is_deterministic_and_hex() {
        let dir = tempdir().unwrap();
        let model = model(dir.path());
        let snapshots = SnapshotManager::new();
        let a = snapshots.capture_snapshot(&model).unwrap();
        let b = snapshots.capture_snapshot(&model.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn snapshot_changes_on_add_update_delete() {
        let dir = tempdir().unwrap();
        let mut model = model(dir.path());
        let snapshots = SnapshotManager::new();
        let s0 = snapshots.capture_snapshot(&model).unwrap();

        let layer = model.get_layer_mut("data").unwrap();
        layer
            .add_element(Element::new("data.table.users", "table", "Users"))
            .unwrap();
        let s1 = snapshots.capture_snapshot(&model).unwrap();
        assert_ne!(s0, s1);

        let element = model
            .get_layer_mut("data")
            .unwrap()
            .get_element_mut("data.table.users")
            .unwrap();
        ElementPatch::new().set("rows", 10).apply(element);
        let s2 = snapshots.capture_snapshot(&model).unwrap();
        assert_ne!(s1, s2);

        model
            .get_layer_mut("data")
            .unwrap()
            .delete_element("data.table.users");
        let s3 = snapshots.capture_snapshot(&model).unwrap();
        assert_ne!(s2, s3);
        assert_eq!(s0, s3);
    }

    #[test]
    fn moving_element_between_layers_changes_snapshot() {
        let dir = tempdir().unwrap();
        let mut model = model(dir.path());
        let snapshots = SnapshotManager::new();
        let before = snapshots.capture_snapshot(&model).unwrap();

        let element = model
            .get_layer_mut("api")
            .unwrap()
            .delete_element("api.endpoint.ping")
            .unwrap();
        model
            .get_layer_mut("data")
            .unwrap()
            .add_element(element)
            .unwrap();
        assert_ne!(before, snapshots.capture_snapshot(&model).unwrap());
    }

    #[test]
    fn persisted_snapshot_matches_saved_model() {
        let dir = tempdir().unwrap();
        let model = model(dir.path());
        model.save_manifest().unwrap();
        model.save_layer("api").unwrap();
        model.save_layer("data").unwrap();

        let snapshots = SnapshotManager::new();
        assert_eq!(
            snapshots.capture_snapshot(&model).unwrap(),
            snapshots.capture_persisted(dir.path()).unwrap()
        );
    }
}
