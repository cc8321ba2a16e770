//! # strata-changeset
//!
//! The staged-mutation data model for Strata.
//!
//! A [`Changeset`] is a named, ordered batch of [`ChangeRecord`]s that will
//! later be applied to the base model as one unit. Records carry a sequence
//! number that fixes replay order; [`ChangesetStats`] are always derived from
//! the records rather than stored.
//!
//! Changeset ids double as directory names, so [`validate_changeset_id`]
//! guards every place an id enters the system.

pub mod changeset;
pub mod error;
pub mod id;
pub mod record;
pub mod status;

pub use changeset::{Changeset, ChangesetStats};
pub use error::ChangesetError;
pub use id::{
    changeset_id_from_value, generate_changeset_id, validate_changeset_id, ILLEGAL_ID_CHARS,
};
pub use record::{ChangeRecord, ChangeType};
pub use status::{ChangesetStatus, LEGACY_STATUS_MAP};
