// error.rs — Error types for the staging subsystem.
//
// Drift is deliberately absent here: a drifted commit is a reported outcome
// (`CommitResult::drift_warning`), not an error.

use std::path::PathBuf;

use strata_changeset::ChangesetError;
use strata_model::ModelError;
use thiserror::Error;

/// Errors that can occur during staging-area operations.
#[derive(Debug, Error)]
pub enum StagingError {
    /// An operation that needs the model ran before one was bound.
    #[error("no model bound to the staging area (required by {operation})")]
    NoModelBound { operation: &'static str },

    /// Id validation, transition, or change-shape failure.
    #[error(transparent)]
    Changeset(#[from] ChangesetError),

    /// No changeset directory exists for this id.
    #[error("changeset not found: '{0}'")]
    NotFound(String),

    /// `create` was called with an id whose directory already exists.
    #[error("changeset already exists: '{0}'")]
    AlreadyExists(String),

    /// A changeset directory exists but its files cannot be used.
    #[error("corrupt changeset '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize changeset data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The model collaborator failed outside of a commit.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The would-be model after commit violates the validator's rules.
    #[error("validation failed with {} error(s):\n{}", .errors.len(), .errors.join("\n"))]
    ValidationFailed { errors: Vec<String> },

    /// Writing the committed model failed; already-written layers were restored.
    #[error("failed to persist commit of changeset '{id}': {source}")]
    Persistence { id: String, source: ModelError },

    /// A change applied directly to the model (no active changeset) failed.
    #[error("cannot apply change to '{element_id}': {reason}")]
    DirectApplyFailed { element_id: String, reason: String },

    /// The advisory project lock could not be acquired in time.
    #[error("timed out after {waited_ms}ms waiting for lock at {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    /// The staging config file could not be parsed.
    #[error("invalid config at {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
}
