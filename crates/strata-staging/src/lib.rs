//! # strata-staging
//!
//! The staging area: where changesets live between creation and commit.
//!
//! Mutations to a Strata model are recorded into a [`Changeset`] instead of
//! being applied immediately. The [`StagingAreaManager`] owns the lifecycle:
//!
//! ```text
//!   create ──▶ staged ──stage/unstage──▶ staged ──commit──▶ committed
//!                 │                                   │
//!                 └──────────── discard ──────────────┴──▶ discarded
//! ```
//!
//! ## Key components
//!
//! - [`ChangesetStorage`] — one directory per changeset with
//!   `metadata.json` + `changes.json`, written atomically.
//! - [`SnapshotManager`] — content hash of the persisted model, used to
//!   detect drift between a changeset's base and the current model.
//! - [`ActivePointer`] — the `.active` marker that ad-hoc mutations follow.
//! - [`ProjectLock`] — advisory lock around multi-step sequences.
//! - [`StagingAreaManager::commit`] — replays records onto a copy of the
//!   model and persists it only if every record applied.
//!
//! [`Changeset`]: strata_changeset::Changeset

pub mod active;
pub mod commit;
pub mod config;
pub mod error;
pub mod lock;
pub mod manager;
pub mod snapshot;
pub mod storage;

pub use active::ActivePointer;
pub use commit::{
    apply_changes, ApplyOutcome, CommitOptions, CommitResult, DriftReport, ValidationSummary,
};
pub use config::{StagingConfig, StagingSettings};
pub use error::StagingError;
pub use lock::ProjectLock;
pub use manager::{RoutedChange, StagingAreaManager};
pub use snapshot::SnapshotManager;
pub use storage::ChangesetStorage;
