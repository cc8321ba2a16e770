// status.rs — Changeset lifecycle status and the legacy status mapping.
//
// The lifecycle is:
//   create() → Staged ──commit() success──> Committed   (terminal)
//                     └──discard()────────> Discarded   (terminal)
//
// Older changeset files used a different vocabulary (draft / applied /
// reverted). Those names are only understood at the storage read boundary:
// `ChangesetStatus::from_stored` maps them onto the current enum, and the
// rest of the system only ever sees `ChangesetStatus`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChangesetError;

/// The lifecycle state of a changeset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangesetStatus {
    /// Accepting change records.
    Staged,
    /// Applied to the base model.
    Committed,
    /// Abandoned; its changes were cleared.
    Discarded,
}

/// Bidirectional table between legacy and current status names.
pub const LEGACY_STATUS_MAP: [(&str, ChangesetStatus); 3] = [
    ("draft", ChangesetStatus::Staged),
    ("applied", ChangesetStatus::Committed),
    ("reverted", ChangesetStatus::Discarded),
];

impl ChangesetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangesetStatus::Staged => "staged",
            ChangesetStatus::Committed => "committed",
            ChangesetStatus::Discarded => "discarded",
        }
    }

    /// Terminal statuses never transition again through commit/stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChangesetStatus::Committed | ChangesetStatus::Discarded)
    }

    /// The legacy name for this status.
    pub fn legacy_alias(&self) -> &'static str {
        LEGACY_STATUS_MAP
            .iter()
            .find(|(_, status)| status == self)
            .map(|(name, _)| *name)
            .unwrap_or("draft")
    }

    /// Map a legacy status name onto the current enum.
    pub fn from_legacy(name: &str) -> Option<Self> {
        LEGACY_STATUS_MAP
            .iter()
            .find(|(legacy, _)| *legacy == name)
            .map(|(_, status)| *status)
    }

    /// Parse a status read from disk, accepting legacy names.
    ///
    /// Returns the status and whether a legacy name was mapped.
    pub fn from_stored(name: &str) -> Result<(Self, bool), ChangesetError> {
        if let Ok(status) = name.parse::<Self>() {
            return Ok((status, false));
        }
        Self::from_legacy(name)
            .map(|status| (status, true))
            .ok_or_else(|| ChangesetError::UnknownStatus(name.to_string()))
    }

    /// Check whether `next` is reachable from this status.
    ///
    /// Staged → Staged is allowed (records come and go while staged).
    pub fn can_transition_to(&self, next: ChangesetStatus) -> bool {
        matches!(
            (self, next),
            (ChangesetStatus::Staged, ChangesetStatus::Staged)
                | (ChangesetStatus::Staged, ChangesetStatus::Committed)
                | (ChangesetStatus::Staged, ChangesetStatus::Discarded)
                | (ChangesetStatus::Discarded, ChangesetStatus::Discarded)
        )
    }
}

impl fmt::Display for ChangesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangesetStatus {
    type Err = ChangesetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staged" => Ok(ChangesetStatus::Staged),
            "committed" => Ok(ChangesetStatus::Committed),
            "discarded" => Ok(ChangesetStatus::Discarded),
            other => Err(ChangesetError::UnknownStatus(other.to_string())),
        }
    }
}
