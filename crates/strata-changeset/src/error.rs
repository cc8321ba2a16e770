// error.rs — Error types for the changeset subsystem.

use thiserror::Error;

/// Errors that can occur during changeset operations.
#[derive(Debug, Error)]
pub enum ChangesetError {
    /// The changeset id is missing, not a string, or blank.
    #[error("invalid changeset id: {reason}")]
    InvalidArgument { reason: String },

    /// The changeset id would escape the changesets directory.
    #[error("invalid changeset id '{id}': path separators and '..' are not allowed")]
    PathTraversal { id: String },

    /// The changeset id contains a character that is unsafe in file names.
    #[error("invalid changeset id '{id}': character '{character}' is not allowed")]
    IllegalCharacter { id: String, character: char },

    /// Invalid status transition (e.g., Committed → Staged via stage()).
    #[error("invalid status transition for changeset '{id}' from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    /// Changes can only be staged while the changeset is `staged`.
    #[error("changeset '{id}' is {status}; changes can only be staged while it is staged")]
    NotStaged { id: String, status: String },

    /// A change record is malformed for its change type.
    #[error("invalid change for element '{element_id}': {reason}")]
    InvalidChange { element_id: String, reason: String },

    /// A persisted status string matches neither current nor legacy names.
    #[error("unknown changeset status: '{0}'")]
    UnknownStatus(String),
}
