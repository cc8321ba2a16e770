// changeset.rs — Changeset subcommands: the staging lifecycle.
//
// Read-only commands (list, show, drift, active) run without the project
// lock. Everything that writes takes it before the model is loaded and holds
// it for the duration of the command.

use clap::Subcommand;
use strata_changeset::{ChangeType, Changeset, ChangesetStatus};
use strata_staging::{
    CommitOptions, CommitResult, ProjectLock, StagingAreaManager, StagingConfig, StagingError,
};

use super::{open_manager, open_model, truncate, CommitRefused};

#[derive(Subcommand)]
pub enum ChangesetCommands {
    /// Create a new changeset based on the current model.
    Create {
        /// Human-readable name (also used to derive the id).
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all changesets.
    List {
        /// Filter by status ("staged", "committed", "discarded").
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a changeset and its changes.
    Show {
        /// Changeset id or name.
        changeset: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove every staged change for an element.
    Unstage { id: String, element_id: String },
    /// Clear a changeset's changes and mark it discarded.
    Discard { id: String },
    /// Report whether the model changed since the changeset was based.
    Drift {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Re-base a changeset on the current model.
    Rebase { id: String },
    /// Apply a changeset to the model.
    Commit {
        id: String,
        /// Commit even if the model drifted.
        #[arg(long)]
        force: bool,
        /// Validate the resulting model before writing it.
        #[arg(long)]
        validate: bool,
        /// Report what would happen without changing anything.
        #[arg(long)]
        dry_run: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Route element commands into this changeset.
    Activate { id: String },
    /// Stop routing element commands into a changeset.
    Deactivate,
    /// Show the active changeset.
    Active,
}

impl ChangesetCommands {
    fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::List { .. } | Self::Show { .. } | Self::Drift { .. } | Self::Active
        )
    }
}

pub fn execute(cmd: &ChangesetCommands, config: &StagingConfig) -> anyhow::Result<()> {
    let _lock = if cmd.is_mutating() {
        Some(ProjectLock::for_project(config)?)
    } else {
        None
    };
    let mut model = open_model(config)?;
    let manager = open_manager(config, &model)?;

    match cmd {
        ChangesetCommands::Create { name, description } => {
            let cs = manager.create(name, description.as_deref())?;
            println!("Created changeset: {}", cs.id);
            println!("  Name:   {}", cs.name);
            println!("  Status: {}", cs.status);
            Ok(())
        }
        ChangesetCommands::List { status } => list_changesets(&manager, status.as_deref()),
        ChangesetCommands::Show { changeset, json } => show_changeset(&manager, changeset, *json),
        ChangesetCommands::Unstage { id, element_id } => {
            let removed = manager.unstage(id, element_id)?;
            println!("Removed {} change(s) for '{}' from '{}'", removed, element_id, id);
            Ok(())
        }
        ChangesetCommands::Discard { id } => {
            manager.discard(id)?;
            println!("Discarded changeset '{}'", id);
            Ok(())
        }
        ChangesetCommands::Drift { id, json } => {
            let report = manager.detect_drift(id)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {}",
                    id,
                    if report.is_drifted { "DRIFTED" } else { "up to date" }
                );
                println!(
                    "  Base:    {}",
                    report.base_snapshot_id.as_deref().unwrap_or("(none)")
                );
                println!("  Current: {}", report.current_snapshot_id);
                for warning in &report.warnings {
                    println!("  warning: {}", warning);
                }
            }
            Ok(())
        }
        ChangesetCommands::Rebase { id } => {
            let snapshot = manager.capture_base_snapshot(id)?;
            println!("Rebased '{}' onto snapshot {}", id, snapshot);
            Ok(())
        }
        ChangesetCommands::Commit {
            id,
            force,
            validate,
            dry_run,
            json,
        } => {
            let options = CommitOptions {
                force: *force,
                validate: *validate,
                dry_run: *dry_run,
            };
            let result = manager.commit(&mut model, id, options)?;
            report_commit(id, &result, *json)
        }
        ChangesetCommands::Activate { id } => {
            let cs = manager.set_active(id)?;
            println!("Active changeset: {} ({})", cs.id, cs.name);
            Ok(())
        }
        ChangesetCommands::Deactivate => {
            manager.clear_active()?;
            println!("No active changeset; element commands now apply directly.");
            Ok(())
        }
        ChangesetCommands::Active => {
            match manager.get_active()? {
                Some(cs) => println!("{} ({}, {} change(s))", cs.id, cs.status, cs.changes.len()),
                None => println!("No active changeset."),
            }
            Ok(())
        }
    }
}

fn list_changesets(manager: &StagingAreaManager, status: Option<&str>) -> anyhow::Result<()> {
    let filter = status.map(str::parse::<ChangesetStatus>).transpose()?;
    let changesets: Vec<Changeset> = manager
        .list()?
        .into_iter()
        .filter(|cs| filter.map_or(true, |s| cs.status == s))
        .collect();

    if changesets.is_empty() {
        println!("No changesets found.");
        return Ok(());
    }

    println!(
        "{:<32} {:<24} {:<10} {:>5} {:>5} {:>5}",
        "ID", "NAME", "STATUS", "ADD", "MOD", "DEL"
    );
    println!("{}", "-".repeat(86));
    for cs in &changesets {
        let stats = cs.stats();
        println!(
            "{:<32} {:<24} {:<10} {:>5} {:>5} {:>5}",
            truncate(&cs.id, 31),
            truncate(&cs.name, 23),
            cs.status.to_string(),
            stats.additions,
            stats.modifications,
            stats.deletions,
        );
    }
    println!("\n{} changeset(s) total.", changesets.len());
    Ok(())
}

fn show_changeset(
    manager: &StagingAreaManager,
    name_or_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    let cs = manager
        .load(name_or_id)?
        .ok_or_else(|| StagingError::NotFound(name_or_id.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cs)?);
        return Ok(());
    }

    let stats = cs.stats();
    println!("Changeset: {}", cs.id);
    println!("Name:      {}", cs.name);
    if let Some(ref description) = cs.description {
        println!("About:     {}", description);
    }
    println!("Status:    {}", cs.status);
    println!("Created:   {}", cs.created.to_rfc3339());
    println!("Modified:  {}", cs.modified.to_rfc3339());
    println!(
        "Base:      {}",
        cs.base_snapshot.as_deref().unwrap_or("(none)")
    );
    println!(
        "Changes:   +{} ~{} -{}",
        stats.additions, stats.modifications, stats.deletions
    );
    for change in cs.changes_in_order() {
        let marker = match change.change_type {
            ChangeType::Add => '+',
            ChangeType::Update => '~',
            ChangeType::Delete => '-',
        };
        println!(
            "  #{:<3} {} {}/{}",
            change.sequence_number, marker, change.layer_name, change.element_id
        );
    }
    Ok(())
}

fn report_commit(id: &str, result: &CommitResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if let Some(drift) = result.drift_refused() {
        for warning in &drift.warnings {
            println!("warning: {}", warning);
        }
    } else {
        let verb = if result.dry_run { "Would commit" } else { "Committed" };
        println!("{} {} change(s) from '{}'", verb, result.committed, id);
        for error in &result.validation.errors {
            println!("  failed: {}", error);
        }
    }

    if result.drift_refused().is_some() {
        return Err(CommitRefused::Drifted { id: id.to_string() }.into());
    }
    if result.failed > 0 {
        return Err(CommitRefused::RecordsFailed {
            id: id.to_string(),
            failed: result.failed,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_writers_take_the_lock() {
        assert!(ChangesetCommands::Commit {
            id: "c".into(),
            force: false,
            validate: false,
            dry_run: true,
            json: false,
        }
        .is_mutating());
        assert!(ChangesetCommands::Deactivate.is_mutating());
        assert!(ChangesetCommands::Rebase { id: "c".into() }.is_mutating());
        assert!(!ChangesetCommands::Active.is_mutating());
        assert!(!ChangesetCommands::List { status: None }.is_mutating());
        assert!(!ChangesetCommands::Drift {
            id: "c".into(),
            json: false
        }
        .is_mutating());
    }
}
