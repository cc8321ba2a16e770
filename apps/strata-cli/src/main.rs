//! # strata-cli
//!
//! Command-line interface for Strata.
//!
//! - `strata init` — create an empty model and staging area
//! - `strata changeset create/list/show/commit/...` — changeset lifecycle
//! - `strata element add/update/delete` — mutations, routed into the active
//!   changeset when there is one
//! - `strata layer add` — add an empty layer to the model
//!
//! Exit codes: 0 ok, 1 unexpected, 2 invalid id/change/transition,
//! 3 not found, 4 drift, 5 validation failed, 6 per-record failures,
//! 7 configuration/persistence/lock.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use strata_changeset::ChangesetError;
use strata_model::ModelError;
use strata_staging::{StagingConfig, StagingError};
use tracing_subscriber::EnvFilter;

use commands::CommitRefused;

/// Strata — staged, all-or-nothing changes to a layered model.
#[derive(Parser)]
#[command(name = "strata", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".", global = true)]
    project_root: PathBuf,

    /// Log debug detail to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty model and staging area in the project root.
    Init {
        /// Model name recorded in the manifest.
        name: String,
    },
    /// Manage changesets.
    Changeset {
        #[command(subcommand)]
        command: commands::changeset::ChangesetCommands,
    },
    /// Add, update, or delete model elements.
    Element {
        #[command(subcommand)]
        command: commands::element::ElementCommands,
    },
    /// Manage model layers.
    Layer {
        #[command(subcommand)]
        command: commands::layer::LayerCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("failed to initialise logging: {e}");
    }

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);

    match run(&cli.command, &project_root) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(command: &Commands, project_root: &std::path::Path) -> anyhow::Result<()> {
    let config = StagingConfig::load(project_root)?;
    tracing::debug!("project root: {}", config.project_root.display());

    match command {
        Commands::Init { name } => commands::init::execute(&config, name),
        Commands::Changeset { command } => commands::changeset::execute(command, &config),
        Commands::Element { command } => commands::element::execute(command, &config),
        Commands::Layer { command } => commands::layer::execute(command, &config),
    }
}

// Logs go to stderr so stdout stays parseable (`--json`).
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("strata_staging={level}").parse()?)
                .add_directive(format!("strata={level}").parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(verbose)
        .init();
    Ok(())
}

/// Map an error chain to the documented exit code.
fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(refused) = cause.downcast_ref::<CommitRefused>() {
            return match refused {
                CommitRefused::Drifted { .. } => 4,
                CommitRefused::RecordsFailed { .. } => 6,
            };
        }
        if let Some(e) = cause.downcast_ref::<StagingError>() {
            return staging_exit_code(e);
        }
        if cause.downcast_ref::<ChangesetError>().is_some() {
            return 2;
        }
        if cause.downcast_ref::<ModelError>().is_some() {
            return 7;
        }
    }
    1
}

fn staging_exit_code(error: &StagingError) -> u8 {
    match error {
        StagingError::Changeset(_) | StagingError::DirectApplyFailed { .. } => 2,
        StagingError::NotFound(_) => 3,
        StagingError::ValidationFailed { .. } => 5,
        StagingError::Config { .. }
        | StagingError::Persistence { .. }
        | StagingError::LockTimeout { .. }
        | StagingError::Model(_)
        | StagingError::IoError { .. }
        | StagingError::Corrupt { .. }
        | StagingError::SerializationError(_) => 7,
        StagingError::NoModelBound { .. } | StagingError::AlreadyExists(_) => 1,
    }
}
