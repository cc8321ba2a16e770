// changeset.rs — The Changeset aggregate.
//
// A Changeset is a named, ordered batch of proposed element mutations that
// is pending application to the base model. It owns:
// - identity (id, name, description, timestamps)
// - a lifecycle status (see status.rs)
// - the base snapshot hash taken at creation or last rebase
// - the ordered change records
//
// Stats are never stored as truth: `stats()` recomputes them from `changes`
// every time it is called.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChangesetError;
use crate::record::{ChangeRecord, ChangeType};
use crate::status::ChangesetStatus;

/// Counts of each change type in a changeset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangesetStats {
    pub additions: usize,
    pub modifications: usize,
    pub deletions: usize,
}

impl ChangesetStats {
    /// Tally a slice of change records.
    pub fn from_changes(changes: &[ChangeRecord]) -> Self {
        let mut stats = Self::default();
        for change in changes {
            match change.change_type {
                ChangeType::Add => stats.additions += 1,
                ChangeType::Update => stats.modifications += 1,
                ChangeType::Delete => stats.deletions += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.additions + self.modifications + self.deletions
    }
}

/// A named, ordered batch of proposed mutations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Changeset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub status: ChangesetStatus,
    /// Model snapshot hash at creation or last rebase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_snapshot: Option<String>,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
}

impl Changeset {
    /// Create a new, empty changeset in the `staged` state.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        base_snapshot: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description,
            created: now,
            modified: now,
            status: ChangesetStatus::Staged,
            base_snapshot,
            changes: Vec::new(),
        }
    }

    /// Derived counts; always computed from `changes`.
    pub fn stats(&self) -> ChangesetStats {
        ChangesetStats::from_changes(&self.changes)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Append a change with the next sequence number.
    ///
    /// Only legal while `staged`. Returns the assigned sequence number.
    pub fn add_change(&mut self, mut change: ChangeRecord) -> Result<usize, ChangesetError> {
        if self.status != ChangesetStatus::Staged {
            return Err(ChangesetError::NotStaged {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        change.validate()?;

        let sequence_number = self.changes.len();
        change.sequence_number = sequence_number;
        self.changes.push(change);
        self.modified = Utc::now();
        Ok(sequence_number)
    }

    /// Remove every record for `element_id` and renumber the survivors
    /// contiguously from 0. Returns how many records were removed.
    pub fn remove_changes_for(&mut self, element_id: &str) -> Result<usize, ChangesetError> {
        if self.status != ChangesetStatus::Staged {
            return Err(ChangesetError::NotStaged {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }

        let before = self.changes.len();
        self.changes.sort_by_key(|c| c.sequence_number);
        self.changes.retain(|c| c.element_id != element_id);
        self.resequence();

        let removed = before - self.changes.len();
        if removed > 0 {
            self.modified = Utc::now();
        }
        Ok(removed)
    }

    /// Abandon the changeset: clear its changes and mark it discarded.
    ///
    /// Idempotent: discarding twice leaves the same observable state.
    pub fn discard(&mut self) -> Result<(), ChangesetError> {
        self.transition(ChangesetStatus::Discarded)?;
        self.changes.clear();
        Ok(())
    }

    /// Mark a successfully applied changeset as committed.
    pub fn mark_committed(&mut self) -> Result<(), ChangesetError> {
        self.transition(ChangesetStatus::Committed)
    }

    /// Force the status back to `staged` so the changeset accepts records
    /// again. Used when a changeset is explicitly activated.
    pub fn reactivate(&mut self) -> bool {
        if self.status == ChangesetStatus::Staged {
            return false;
        }
        tracing::info!(
            "changeset '{}' reactivated from {} to staged",
            self.id,
            self.status
        );
        self.status = ChangesetStatus::Staged;
        self.modified = Utc::now();
        true
    }

    /// Changes sorted by ascending sequence number (the replay order).
    pub fn changes_in_order(&self) -> Vec<&ChangeRecord> {
        let mut ordered: Vec<&ChangeRecord> = self.changes.iter().collect();
        ordered.sort_by_key(|c| c.sequence_number);
        ordered
    }

    /// Reassign sequence numbers 0..n in current order.
    pub fn resequence(&mut self) {
        for (index, change) in self.changes.iter_mut().enumerate() {
            change.sequence_number = index;
        }
    }

    fn transition(&mut self, next: ChangesetStatus) -> Result<(), ChangesetError> {
        if !self.status.can_transition_to(next) {
            return Err(ChangesetError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if self.status != next {
            self.modified = Utc::now();
        }
        self.status = next;
        Ok(())
    }
}
