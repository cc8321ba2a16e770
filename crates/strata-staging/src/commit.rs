// commit.rs — Commit options, reported outcomes, and record replay.
//
// `CommitResult` and `DriftReport` are the structured values handed to
// automation and the CLI, so their serialized field names are part of the
// contract (camelCase: `dryRun`, `driftWarning`, `isDrifted`, ...).
//
// `apply_changes` replays records onto a model in the order given. It never
// stops early: every record gets a chance, and failures are collected.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_changeset::{ChangeRecord, ChangeType};
use strata_model::Model;

/// Flags for `StagingAreaManager::commit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit even when the model drifted from the base snapshot.
    pub force: bool,
    /// Run the validator against the would-be model first.
    pub validate: bool,
    /// Compute the outcome without mutating or persisting anything.
    pub dry_run: bool,
}

impl CommitOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// Result of comparing a changeset's base snapshot with the current model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub is_drifted: bool,
    pub base_snapshot_id: Option<String>,
    pub current_snapshot_id: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Per-record outcome summary of a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Outcome of a commit attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    /// Records applied (or, for a dry run, that would apply).
    pub committed: usize,
    /// Records that could not be applied.
    pub failed: usize,
    pub validation: ValidationSummary,
    /// Present only when the commit was refused because the model drifted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_warning: Option<DriftReport>,
    #[serde(default)]
    pub dry_run: bool,
}

impl CommitResult {
    /// A commit refused because of drift.
    pub fn refused_for_drift(drift: DriftReport, dry_run: bool) -> Self {
        Self {
            committed: 0,
            failed: 0,
            validation: ValidationSummary {
                is_valid: true,
                errors: Vec::new(),
            },
            drift_warning: Some(drift),
            dry_run,
        }
    }

    /// True when the changeset was (or would be) fully applied.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.drift_refused().is_none()
    }

    /// The drift report, if the commit was refused because of it.
    pub fn drift_refused(&self) -> Option<&DriftReport> {
        self.drift_warning.as_ref()
    }
}

/// What happened when records were replayed onto a model.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    /// Layers whose content changed, deduplicated.
    pub touched_layers: BTreeSet<String>,
}

/// Replay `changes` onto `model` in the given order.
///
/// - missing layer: per-record failure
/// - add: skipped (counted as applied) if the id already exists
/// - update: the patch is applied to the live element; missing element fails
/// - delete: no-op if the element is already absent
pub fn apply_changes<'a>(
    model: &mut Model,
    changes: impl IntoIterator<Item = &'a ChangeRecord>,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    for change in changes {
        match apply_one(model, change) {
            Ok(touched) => {
                outcome.applied += 1;
                if touched {
                    outcome.touched_layers.insert(change.layer_name.clone());
                }
            }
            Err(reason) => {
                tracing::debug!(
                    "change #{} ({} {}) failed: {}",
                    change.sequence_number,
                    change.change_type,
                    change.element_id,
                    reason
                );
                outcome.failed += 1;
                outcome.errors.push(format!(
                    "#{} {} '{}' in layer '{}': {}",
                    change.sequence_number,
                    change.change_type,
                    change.element_id,
                    change.layer_name,
                    reason
                ));
            }
        }
    }

    outcome
}

/// Apply one record. Returns whether the layer content changed.
fn apply_one(model: &mut Model, change: &ChangeRecord) -> Result<bool, String> {
    let layer = model
        .get_layer_mut(&change.layer_name)
        .ok_or_else(|| "layer not found".to_string())?;

    match change.change_type {
        ChangeType::Add => {
            if layer.get_element(&change.element_id).is_some() {
                return Ok(false);
            }
            let patch = change
                .after
                .as_ref()
                .ok_or_else(|| "add has no element data".to_string())?;
            let element = patch
                .to_element(&change.element_id)
                .map_err(|e| e.to_string())?;
            layer.add_element(element).map_err(|e| e.to_string())?;
            Ok(true)
        }
        ChangeType::Update => {
            let patch = change
                .after
                .as_ref()
                .ok_or_else(|| "update has no fields to change".to_string())?;
            let element = layer
                .get_element_mut(&change.element_id)
                .ok_or_else(|| "element not found".to_string())?;
            patch.apply(element);
            Ok(true)
        }
        ChangeType::Delete => Ok(layer.delete_element(&change.element_id).is_some()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_model::{Element, ElementPatch, Layer};
    use tempfile::tempdir;

    fn seq(mut records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
        for (i, r) in records.iter_mut().enumerate() {
            r.sequence_number = i;
        }
        records
    }

    fn api_model(root: &std::path::Path) -> Model {
        let mut model = Model::init(root, "t").unwrap();
        model.add_layer(Layer::new("api")).unwrap();
        model
    }

    #[test]
    fn later_update_sees_earlier_add() {
        let dir = tempdir().unwrap();
        let mut model = api_model(dir.path());
        let changes = seq(vec![
            ChangeRecord::add("api", Element::new("api.e.a", "endpoint", "A")),
            ChangeRecord::update("api", "api.e.a", ElementPatch::new().set("path", "/a")),
        ]);

        let outcome = apply_changes(&mut model, &changes);
        assert_eq!((outcome.applied, outcome.failed), (2, 0));
        let element = model.get_layer("api").unwrap().get_element("api.e.a").unwrap();
        assert_eq!(element.properties["path"], "/a");
        assert_eq!(outcome.touched_layers.len(), 1);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let dir = tempdir().unwrap();
        let mut model = api_model(dir.path());
        let changes = seq(vec![
            ChangeRecord::add("missing", Element::new("x", "t", "X")),
            ChangeRecord::update("api", "ghost", ElementPatch::new().set("k", 1)),
            ChangeRecord::add("api", Element::new("api.e.b", "endpoint", "B")),
        ]);

        let outcome = apply_changes(&mut model, &changes);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("layer not found"));
        assert!(outcome.errors[1].contains("element not found"));
        assert!(model.get_layer("api").unwrap().get_element("api.e.b").is_some());
    }

    #[test]
    fn add_existing_and_delete_missing_are_no_ops() {
        let dir = tempdir().unwrap();
        let mut model = api_model(dir.path());
        model
            .get_layer_mut("api")
            .unwrap()
            .add_element(Element::new("api.e.a", "endpoint", "Original"))
            .unwrap();

        let changes = seq(vec![
            ChangeRecord::add("api", Element::new("api.e.a", "endpoint", "Replacement")),
            ChangeRecord::delete("api", "api.e.gone"),
        ]);
        let outcome = apply_changes(&mut model, &changes);
        assert_eq!((outcome.applied, outcome.failed), (2, 0));
        assert!(outcome.touched_layers.is_empty());
        let element = model.get_layer("api").unwrap().get_element("api.e.a").unwrap();
        assert_eq!(element.name, "Original");
    }

    #[test]
    fn commit_result_uses_camel_case() {
        let result = CommitResult {
            committed: 1,
            failed: 0,
            validation: ValidationSummary {
                is_valid: true,
                errors: vec![],
            },
            drift_warning: Some(DriftReport {
                is_drifted: true,
                base_snapshot_id: Some("a".into()),
                current_snapshot_id: "b".into(),
                warnings: vec![],
            }),
            dry_run: true,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["validation"]["isValid"], true);
        assert_eq!(json["driftWarning"]["isDrifted"], true);
        assert_eq!(json["driftWarning"]["baseSnapshotId"], "a");
        assert_eq!(json["driftWarning"]["currentSnapshotId"], "b");
    }

    #[test]
    fn refused_for_drift_is_not_success() {
        let drift = DriftReport {
            is_drifted: true,
            base_snapshot_id: Some("a".into()),
            current_snapshot_id: "b".into(),
            warnings: vec![],
        };
        let result = CommitResult::refused_for_drift(drift, false);
        assert!(!result.is_success());
        assert!(result.drift_refused().is_some());
    }
}
