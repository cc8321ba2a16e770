//! # strata-model
//!
//! The layered element model that Strata changesets are applied to.
//!
//! A [`Model`] is a manifest plus named [`Layer`]s, each holding typed
//! [`Element`]s with directed [`Relationship`]s. Everything persists as
//! pretty-printed JSON under the model root, one file per layer.
//!
//! ## Key components
//!
//! - [`Model`] / [`Layer`] — in-memory model with explicit per-layer saves.
//! - [`ElementPatch`] — a field-level update, used instead of free-form merges.
//! - [`Validator`] — trait for whole-model checks; [`ModelValidator`] is the
//!   default pipeline (identity, naming, references).

pub mod element;
pub mod error;
pub mod model;
pub mod validation;

pub use element::{Element, ElementPatch, Relationship};
pub use error::ModelError;
pub use model::{Layer, Manifest, Model};
pub use validation::{
    IdentityCheck, ModelCheck, ModelValidator, NamingCheck, ReferenceCheck, ValidationIssue,
    ValidationResult, Validator,
};
