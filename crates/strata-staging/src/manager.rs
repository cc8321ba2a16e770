// manager.rs — StagingAreaManager: the changeset lifecycle orchestrator.
//
// This is the only component with cross-cutting rules. It ties together:
// - ChangesetStorage (durable changesets)
// - SnapshotManager (drift detection)
// - ActivePointer (which changeset ad-hoc mutations are routed into)
// - a Validator (optional pre-commit check)
//
// Commit is all-or-nothing relative to persisted state. Records are replayed
// onto a fresh load of the model from disk, never onto the caller's copy,
// which may be stale; the drift check and the write both see the same state.
// The result is written and swapped into the caller's model only when every
// record applied. If writing fails part-way, layers already written are
// restored from the loaded state before the error is returned.
//
// Every public operation is one synchronous unit of work. Cross-process
// exclusion is the caller's job: wrap stage/commit sequences in `lock()`.

use std::path::{Path, PathBuf};

use strata_changeset::{
    generate_changeset_id, validate_changeset_id, ChangeRecord, ChangeType, Changeset,
    ChangesetError, ChangesetStatus,
};
use strata_model::{Model, ModelValidator, Validator};

use crate::active::ActivePointer;
use crate::commit::{
    apply_changes, CommitOptions, CommitResult, DriftReport, ValidationSummary,
};
use crate::config::StagingConfig;
use crate::error::StagingError;
use crate::lock::ProjectLock;
use crate::snapshot::SnapshotManager;
use crate::storage::ChangesetStorage;

/// Where an ad-hoc change ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedChange {
    /// Recorded in the active changeset.
    Staged {
        changeset_id: String,
        sequence_number: usize,
    },
    /// No changeset was active; the change was applied and saved directly.
    Applied { layer: String },
}

/// Orchestrates create / stage / unstage / discard / commit / activate.
pub struct StagingAreaManager {
    config: StagingConfig,
    storage: ChangesetStorage,
    active: ActivePointer,
    snapshots: SnapshotManager,
    validator: Box<dyn Validator>,
    model_root: Option<PathBuf>,
}

impl StagingAreaManager {
    /// Open the staging area described by `config`.
    ///
    /// No model is bound yet; see [`StagingAreaManager::bind_model`].
    pub fn new(config: StagingConfig) -> Result<Self, StagingError> {
        let storage = ChangesetStorage::new(&config.changesets_dir)?;
        let active = ActivePointer::new(&config.changesets_dir);
        Ok(Self {
            config,
            storage,
            active,
            snapshots: SnapshotManager::new(),
            validator: Box::new(ModelValidator::default()),
            model_root: None,
        })
    }

    /// Bind the model whose persisted state snapshots are taken from.
    pub fn bind_model(&mut self, model: &Model) {
        self.model_root = Some(model.root().to_path_buf());
    }

    /// Builder form of [`StagingAreaManager::bind_model`].
    pub fn with_model(mut self, model: &Model) -> Self {
        self.bind_model(model);
        self
    }

    /// Replace the validator used by `commit` when validation is requested.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    pub fn storage(&self) -> &ChangesetStorage {
        &self.storage
    }

    /// Acquire the advisory project lock with the configured timeout.
    pub fn lock(&self) -> Result<ProjectLock, StagingError> {
        ProjectLock::for_project(&self.config)
    }

    // ── Lifecycle ──

    /// Create a new staged changeset with a base snapshot of the bound model.
    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Changeset, StagingError> {
        let model_root = self.bound_model_root("create")?;
        let snapshot = self.snapshots.capture_persisted(model_root)?;
        let id = generate_changeset_id(name);

        let changeset = self.storage.create(
            &id,
            name,
            description.map(str::to_string),
            Some(snapshot),
        )?;
        tracing::info!("created changeset '{}' ({})", changeset.name, changeset.id);
        Ok(changeset)
    }

    /// Load by id, falling back to the first changeset with that name.
    ///
    /// Ids are authoritative; names need not be unique.
    pub fn load(&self, name_or_id: &str) -> Result<Option<Changeset>, StagingError> {
        if validate_changeset_id(name_or_id).is_ok() {
            if let Some(changeset) = self.storage.load(name_or_id)? {
                return Ok(Some(changeset));
            }
        }
        Ok(self
            .storage
            .list()?
            .into_iter()
            .find(|changeset| changeset.name == name_or_id))
    }

    /// All changesets, oldest first.
    pub fn list(&self) -> Result<Vec<Changeset>, StagingError> {
        self.storage.list()
    }

    /// Append a change to a staged changeset. Returns its sequence number.
    pub fn stage(&self, id: &str, change: ChangeRecord) -> Result<usize, StagingError> {
        let changeset = self.storage.add_change(id, change)?;
        let sequence_number = changeset.changes.len() - 1;
        tracing::debug!(
            "staged change #{} into changeset '{}'",
            sequence_number,
            changeset.id
        );
        Ok(sequence_number)
    }

    /// Remove every change for `element_id`; survivors are renumbered from 0.
    pub fn unstage(&self, id: &str, element_id: &str) -> Result<usize, StagingError> {
        let removed = self.storage.remove_change(id, element_id)?;
        tracing::debug!(
            "unstaged {} change(s) for '{}' from changeset '{}'",
            removed,
            element_id,
            id
        );
        Ok(removed)
    }

    /// Discard a changeset: clear its changes and mark it discarded.
    ///
    /// Idempotent. Clears the active pointer if it names this changeset.
    pub fn discard(&self, id: &str) -> Result<Changeset, StagingError> {
        let mut changeset = self.require(id)?;
        let already = changeset.status == ChangesetStatus::Discarded;
        changeset.discard()?;
        if !already {
            self.storage.save(&changeset)?;
            tracing::info!("discarded changeset '{}'", id);
        }
        self.clear_active_if(id)?;
        Ok(changeset)
    }

    /// Re-baseline a changeset against the bound model's current state.
    pub fn capture_base_snapshot(&self, id: &str) -> Result<String, StagingError> {
        let mut changeset = self.require(id)?;
        let model_root = self.bound_model_root("capture_base_snapshot")?;
        let snapshot = self.snapshots.capture_persisted(model_root)?;

        changeset.base_snapshot = Some(snapshot.clone());
        changeset.modified = chrono::Utc::now();
        self.storage.save(&changeset)?;
        tracing::info!("rebased changeset '{}' onto snapshot {}", id, short(&snapshot));
        Ok(snapshot)
    }

    /// Compare a changeset's base snapshot with the bound model on disk.
    pub fn detect_drift(&self, id: &str) -> Result<DriftReport, StagingError> {
        let changeset = self.require(id)?;
        let model_root = self.bound_model_root("detect_drift")?;
        self.drift_against(&changeset, model_root)
    }

    /// Apply a staged changeset to `model` and persist the result.
    ///
    /// 1. load (NotFound if absent; only `staged` changesets commit)
    /// 2. drift check: drifted and not forced ⇒ refused, reported in result
    /// 3. replay onto the persisted model in sequence order, collecting failures
    /// 4. validate the clone if requested (or configured); failure is an error
    ///    even when forced
    /// 5. dry run stops here with simulated counts
    /// 6. any failed record ⇒ nothing is written, `committed == 0`
    /// 7. persist touched layers + manifest, swap the result in, mark committed
    ///
    /// `model` only supplies the root. Unsaved edits in it are not committed;
    /// on success it is replaced by the committed state.
    pub fn commit(
        &self,
        model: &mut Model,
        id: &str,
        options: CommitOptions,
    ) -> Result<CommitResult, StagingError> {
        let mut changeset = self.require(id)?;
        if changeset.status != ChangesetStatus::Staged {
            return Err(ChangesetError::NotStaged {
                id: changeset.id.clone(),
                status: changeset.status.to_string(),
            }
            .into());
        }

        let persisted = Model::load(model.root())?;
        warn_if_stale(model, &persisted, &self.snapshots)?;

        let drift = self.drift_report(&changeset, self.snapshots.capture_snapshot(&persisted)?);
        if drift.is_drifted {
            if !options.force {
                tracing::warn!(
                    "refusing to commit '{}': model drifted from base snapshot",
                    id
                );
                return Ok(CommitResult::refused_for_drift(drift, options.dry_run));
            }
            tracing::warn!("committing '{}' despite drift (forced)", id);
        }

        let mut working = persisted.clone();
        let outcome = apply_changes(&mut working, changeset.changes_in_order());

        if options.validate || self.config.settings.validate_on_commit {
            let result = self.validator.validate_model(&working);
            if !result.is_valid() {
                tracing::warn!(
                    "commit of '{}' rejected by validation ({} issue(s))",
                    id,
                    result.errors.len()
                );
                return Err(StagingError::ValidationFailed {
                    errors: result.messages(),
                });
            }
        }

        let validation = ValidationSummary {
            is_valid: outcome.failed == 0,
            errors: outcome.errors.clone(),
        };

        if options.dry_run {
            tracing::info!(
                "dry run of '{}': {} would apply, {} would fail",
                id,
                outcome.applied,
                outcome.failed
            );
            return Ok(CommitResult {
                committed: outcome.applied,
                failed: outcome.failed,
                validation,
                drift_warning: None,
                dry_run: true,
            });
        }

        if outcome.failed > 0 {
            tracing::warn!(
                "commit of '{}' aborted: {} of {} change(s) failed; model left unchanged",
                id,
                outcome.failed,
                outcome.applied + outcome.failed
            );
            return Ok(CommitResult {
                committed: 0,
                failed: outcome.failed,
                validation,
                drift_warning: None,
                dry_run: false,
            });
        }

        persist_all_or_restore(&persisted, &working, &outcome.touched_layers, id)?;
        *model = working;

        changeset.mark_committed()?;
        if let Err(e) = self.storage.save(&changeset) {
            tracing::error!(
                "changeset '{}' was applied to the model but could not be marked committed: {}; \
                 discard it, or rebase before retrying, so it is not applied twice",
                id,
                e
            );
            return Err(e);
        }
        self.clear_active_if(id)?;

        tracing::info!(
            "committed changeset '{}': {} change(s) across {} layer(s)",
            id,
            outcome.applied,
            outcome.touched_layers.len()
        );
        Ok(CommitResult {
            committed: outcome.applied,
            failed: 0,
            validation,
            drift_warning: None,
            dry_run: false,
        })
    }

    // ── Active changeset ──

    pub fn is_active(&self, id: &str) -> Result<bool, StagingError> {
        validate_changeset_id(id)?;
        Ok(self.active.read()?.as_deref() == Some(id))
    }

    /// Make `id` the active changeset, promoting it back to `staged` if needed.
    pub fn set_active(&self, id: &str) -> Result<Changeset, StagingError> {
        let mut changeset = self.require(id)?;
        if changeset.reactivate() {
            self.storage.save(&changeset)?;
        }
        self.active.set(id)?;
        tracing::info!("active changeset is now '{}'", id);
        Ok(changeset)
    }

    pub fn clear_active(&self) -> Result<(), StagingError> {
        self.active.clear()
    }

    /// The active changeset, if the marker names one that still exists.
    pub fn get_active(&self) -> Result<Option<Changeset>, StagingError> {
        let Some(id) = self.active.read()? else {
            return Ok(None);
        };
        let changeset = self.storage.load(&id)?;
        if changeset.is_none() {
            tracing::warn!("active marker names missing changeset '{}'", id);
        }
        Ok(changeset)
    }

    /// Route an ad-hoc mutation: into the active changeset if there is one,
    /// otherwise straight into the model (and its layer file).
    ///
    /// A direct change is applied to the model as persisted, like a commit.
    ///
    /// Staged updates and deletes get `before` filled from `model`.
    pub fn route_change(
        &self,
        model: &mut Model,
        mut change: ChangeRecord,
    ) -> Result<RoutedChange, StagingError> {
        if let Some(active) = self.get_active()? {
            if change.before.is_none() && change.change_type != ChangeType::Add {
                change.before = model
                    .get_layer(&change.layer_name)
                    .and_then(|layer| layer.get_element(&change.element_id))
                    .cloned();
            }
            let sequence_number = self.stage(&active.id, change)?;
            return Ok(RoutedChange::Staged {
                changeset_id: active.id,
                sequence_number,
            });
        }

        change.validate()?;
        let persisted = Model::load(model.root())?;
        warn_if_stale(model, &persisted, &self.snapshots)?;

        let mut working = persisted.clone();
        let outcome = apply_changes(&mut working, [&change]);
        if outcome.failed > 0 {
            return Err(StagingError::DirectApplyFailed {
                element_id: change.element_id.clone(),
                reason: outcome.errors.join("; "),
            });
        }
        persist_all_or_restore(
            &persisted,
            &working,
            &outcome.touched_layers,
            &change.element_id,
        )?;
        *model = working;
        tracing::info!(
            "applied {} of '{}' directly to layer '{}'",
            change.change_type,
            change.element_id,
            change.layer_name
        );
        Ok(RoutedChange::Applied {
            layer: change.layer_name,
        })
    }

    // ── Internals ──

    fn require(&self, id: &str) -> Result<Changeset, StagingError> {
        self.storage
            .load(id)?
            .ok_or_else(|| StagingError::NotFound(id.to_string()))
    }

    fn bound_model_root(&self, operation: &'static str) -> Result<&Path, StagingError> {
        self.model_root
            .as_deref()
            .ok_or(StagingError::NoModelBound { operation })
    }

    fn drift_against(
        &self,
        changeset: &Changeset,
        model_root: &Path,
    ) -> Result<DriftReport, StagingError> {
        let current = self.snapshots.capture_persisted(model_root)?;
        Ok(self.drift_report(changeset, current))
    }

    fn drift_report(&self, changeset: &Changeset, current: String) -> DriftReport {
        let Some(base) = changeset.base_snapshot.clone() else {
            return DriftReport {
                is_drifted: false,
                base_snapshot_id: None,
                current_snapshot_id: current,
                warnings: vec![format!(
                    "changeset '{}' has no base snapshot; drift cannot be detected \
                     (capture one with a rebase)",
                    changeset.id
                )],
            };
        };

        let is_drifted = base != current;
        let mut warnings = Vec::new();
        if is_drifted {
            warnings.push(format!(
                "model changed since changeset '{}' was based (base {}, current {})",
                changeset.id,
                short(&base),
                short(&current)
            ));
        }
        DriftReport {
            is_drifted,
            base_snapshot_id: Some(base),
            current_snapshot_id: current,
            warnings,
        }
    }

    fn clear_active_if(&self, id: &str) -> Result<(), StagingError> {
        if self.active.read()?.as_deref() == Some(id) {
            self.active.clear()?;
            tracing::debug!("cleared active marker for '{}'", id);
        }
        Ok(())
    }
}

/// Log when the caller's model no longer matches what is on disk.
fn warn_if_stale(
    model: &Model,
    persisted: &Model,
    snapshots: &SnapshotManager,
) -> Result<(), StagingError> {
    if snapshots.capture_snapshot(model)? != snapshots.capture_snapshot(persisted)? {
        tracing::warn!(
            "in-memory model at {} differs from disk; applying to the persisted state",
            model.root().display()
        );
    }
    Ok(())
}

/// Write every touched layer and the manifest from `working`.
///
/// On failure, layers already written are rewritten from `original` so the
/// files on disk match what they were before the call.
fn persist_all_or_restore(
    original: &Model,
    working: &Model,
    touched_layers: &std::collections::BTreeSet<String>,
    context: &str,
) -> Result<(), StagingError> {
    let mut written: Vec<&str> = Vec::new();
    let mut result = Ok(());

    for layer in touched_layers {
        if let Err(e) = working.save_layer(layer) {
            result = Err(e);
            break;
        }
        written.push(layer);
    }
    if result.is_ok() {
        result = working.save_manifest();
    }

    let Err(source) = result else {
        return Ok(());
    };

    tracing::error!(
        "persisting '{}' failed: {}; restoring {} layer(s)",
        context,
        source,
        written.len()
    );
    for layer in written {
        if let Err(e) = original.save_layer(layer) {
            tracing::error!("failed to restore layer '{}': {}", layer, e);
        }
    }
    if let Err(e) = original.save_manifest() {
        tracing::error!("failed to restore manifest: {}", e);
    }
    Err(StagingError::Persistence {
        id: context.to_string(),
        source,
    })
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}
