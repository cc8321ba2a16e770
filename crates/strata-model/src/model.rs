// model.rs — The file-persisted layered model.
//
// Layout on disk:
//   <root>/manifest.json        — model name, version, ordered layer names
//   <root>/layers/<name>.json   — one file per layer, elements keyed by id
//
// A Model is loaded eagerly. Mutations are in-memory until `save_layer` /
// `save_manifest` are called, so a caller can mutate a clone and only
// persist it once everything succeeded.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::ModelError;

/// Model-level metadata persisted as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// Layer names in declaration order.
    #[serde(default)]
    pub layers: Vec<String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            layers: Vec::new(),
        }
    }
}

/// A named partition of the model containing typed elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub elements: BTreeMap<String, Element>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: BTreeMap::new(),
        }
    }

    pub fn get_element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    /// Add an element. Fails if an element with the same id exists.
    pub fn add_element(&mut self, element: Element) -> Result<(), ModelError> {
        if self.elements.contains_key(&element.id) {
            return Err(ModelError::DuplicateElement {
                layer: self.name.clone(),
                element_id: element.id,
            });
        }
        self.elements.insert(element.id.clone(), element);
        Ok(())
    }

    /// Remove an element, returning it if it was present.
    pub fn delete_element(&mut self, id: &str) -> Option<Element> {
        self.elements.remove(id)
    }

    /// All elements in id order.
    pub fn list_elements(&self) -> Vec<&Element> {
        self.elements.values().collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// The whole model: a manifest plus its loaded layers.
#[derive(Debug, Clone)]
pub struct Model {
    root: PathBuf,
    manifest: Manifest,
    layers: BTreeMap<String, Layer>,
}

impl Model {
    /// Create a new, empty model rooted at `root` and persist its manifest.
    pub fn init(root: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, ModelError> {
        let root = root.as_ref().to_path_buf();
        let layers_dir = root.join("layers");
        fs::create_dir_all(&layers_dir).map_err(|source| ModelError::IoError {
            path: layers_dir.clone(),
            source,
        })?;
        let model = Self {
            root,
            manifest: Manifest::new(name),
            layers: BTreeMap::new(),
        };
        model.save_manifest()?;
        Ok(model)
    }

    /// Load a model and every layer its manifest declares.
    ///
    /// A declared layer whose file is missing loads as an empty layer.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ModelError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join("manifest.json");
        let json = fs::read_to_string(&manifest_path).map_err(|source| ModelError::IoError {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: Manifest = serde_json::from_str(&json)?;

        let mut layers = BTreeMap::new();
        for name in &manifest.layers {
            let path = layer_file(&root, name)?;
            let layer = if path.exists() {
                let json = fs::read_to_string(&path).map_err(|source| ModelError::IoError {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str::<Layer>(&json)?
            } else {
                Layer::new(name.clone())
            };
            layers.insert(name.clone(), layer);
        }

        tracing::debug!(
            "loaded model '{}' with {} layers from {}",
            manifest.name,
            layers.len(),
            root.display()
        );

        Ok(Self {
            root,
            manifest,
            layers,
        })
    }

    /// Re-read the model from disk, discarding in-memory changes.
    pub fn reload(&mut self) -> Result<(), ModelError> {
        *self = Self::load(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn get_layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn get_layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.get_mut(name)
    }

    /// Layers in name order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Register a new layer (in memory; call `save_layer` + `save_manifest`).
    pub fn add_layer(&mut self, layer: Layer) -> Result<(), ModelError> {
        validate_layer_name(&layer.name)?;
        if self.layers.contains_key(&layer.name) {
            return Err(ModelError::DuplicateLayer(layer.name));
        }
        self.manifest.layers.push(layer.name.clone());
        self.layers.insert(layer.name.clone(), layer);
        Ok(())
    }

    /// Find which layer holds an element id, if any.
    pub fn find_element(&self, id: &str) -> Option<(&Layer, &Element)> {
        self.layers
            .values()
            .find_map(|layer| layer.get_element(id).map(|element| (layer, element)))
    }

    /// Total element count across all layers.
    pub fn element_count(&self) -> usize {
        self.layers.values().map(Layer::len).sum()
    }

    /// Persist one layer to `<root>/layers/<name>.json`.
    pub fn save_layer(&self, name: &str) -> Result<(), ModelError> {
        let layer = self
            .layers
            .get(name)
            .ok_or_else(|| ModelError::LayerNotFound(name.to_string()))?;
        let path = layer_file(&self.root, name)?;
        let json = serde_json::to_string_pretty(layer)?;
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!("saved layer '{}' ({} elements)", name, layer.len());
        Ok(())
    }

    /// Persist `manifest.json`.
    pub fn save_manifest(&self) -> Result<(), ModelError> {
        let path = self.root.join("manifest.json");
        let json = serde_json::to_string_pretty(&self.manifest)?;
        write_atomic(&path, json.as_bytes())
    }
}

/// Layer names become file names, so they are restricted.
fn validate_layer_name(name: &str) -> Result<(), ModelError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ModelError::InvalidLayerName(name.to_string()))
    }
}

fn layer_file(root: &Path, name: &str) -> Result<PathBuf, ModelError> {
    validate_layer_name(name)?;
    Ok(root.join("layers").join(format!("{}.json", name)))
}

/// Write through a sibling temp file and rename over the target.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), ModelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ModelError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|source| ModelError::IoError {
                path: temp_path.clone(),
                source,
            })?;
        file.write_all(data)
            .and_then(|_| file.sync_all())
            .map_err(|source| ModelError::IoError {
                path: temp_path.clone(),
                source,
            })?;
    }
    fs::rename(&temp_path, path).map_err(|source| ModelError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn model_with_api_layer(root: &Path) -> Model {
        let mut model = Model::init(root, "demo").unwrap();
        model.add_layer(Layer::new("api")).unwrap();
        model.save_layer("api").unwrap();
        model.save_manifest().unwrap();
        model
    }

    #[test]
    fn init_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut model = model_with_api_layer(dir.path());
        model
            .get_layer_mut("api")
            .unwrap()
            .add_element(Element::new("api.endpoint.ping", "endpoint", "Ping"))
            .unwrap();
        model.save_layer("api").unwrap();

        let loaded = Model::load(dir.path()).unwrap();
        assert_eq!(loaded.manifest().name, "demo");
        assert_eq!(loaded.manifest().layers, vec!["api".to_string()]);
        assert!(loaded
            .get_layer("api")
            .unwrap()
            .get_element("api.endpoint.ping")
            .is_some());
    }

    #[test]
    fn duplicate_element_rejected() {
        let mut layer = Layer::new("api");
        layer.add_element(Element::new("a", "t", "A")).unwrap();
        let err = layer.add_element(Element::new("a", "t", "A")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateElement { .. }));
    }

    #[test]
    fn delete_missing_element_is_none() {
        let mut layer = Layer::new("api");
        assert!(layer.delete_element("nope").is_none());
    }

    #[test]
    fn duplicate_layer_rejected() {
        let dir = tempdir().unwrap();
        let mut model = model_with_api_layer(dir.path());
        let err = model.add_layer(Layer::new("api")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateLayer(_)));
    }

    #[test]
    fn layer_name_with_path_separator_rejected() {
        let dir = tempdir().unwrap();
        let mut model = Model::init(dir.path(), "demo").unwrap();
        let err = model.add_layer(Layer::new("../escape")).unwrap_err();
        assert!(matches!(err, ModelError::InvalidLayerName(_)));
    }

    #[test]
    fn declared_layer_without_file_loads_empty() {
        let dir = tempdir().unwrap();
        let mut model = Model::init(dir.path(), "demo").unwrap();
        model.add_layer(Layer::new("business")).unwrap();
        model.save_manifest().unwrap();

        let loaded = Model::load(dir.path()).unwrap();
        assert!(loaded.get_layer("business").unwrap().is_empty());
    }

    #[test]
    fn reload_discards_unsaved_changes() {
        let dir = tempdir().unwrap();
        let mut model = model_with_api_layer(dir.path());
        model
            .get_layer_mut("api")
            .unwrap()
            .add_element(Element::new("a", "t", "A"))
            .unwrap();
        assert_eq!(model.element_count(), 1);

        model.reload().unwrap();
        assert_eq!(model.element_count(), 0);
    }

    #[test]
    fn find_element_across_layers() {
        let dir = tempdir().unwrap();
        let mut model = model_with_api_layer(dir.path());
        model.add_layer(Layer::new("data")).unwrap();
        model
            .get_layer_mut("data")
            .unwrap()
            .add_element(Element::new("data.table.users", "table", "Users"))
            .unwrap();

        let (layer, element) = model.find_element("data.table.users").unwrap();
        assert_eq!(layer.name, "data");
        assert_eq!(element.name, "Users");
        assert!(model.find_element("missing").is_none());
    }
}
