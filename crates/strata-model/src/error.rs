// error.rs — Error types for the model subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, mutating, or saving a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize model data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The named layer does not exist in the model.
    #[error("layer not found: '{0}'")]
    LayerNotFound(String),

    /// A layer with this name is already registered.
    #[error("layer already exists: '{0}'")]
    DuplicateLayer(String),

    /// An element with this id already exists in the layer.
    #[error("element '{element_id}' already exists in layer '{layer}'")]
    DuplicateElement { layer: String, element_id: String },

    /// A layer name that cannot be used as a file name.
    #[error("invalid layer name: '{0}'")]
    InvalidLayerName(String),

    /// An element patch could not produce a complete element.
    #[error("incomplete element '{element_id}': {reason}")]
    IncompleteElement { element_id: String, reason: String },
}
