// layer.rs — Layer subcommands: add, list.

use clap::Subcommand;
use strata_model::Layer;
use strata_staging::{ProjectLock, StagingConfig};

use super::open_model;

#[derive(Subcommand)]
pub enum LayerCommands {
    /// Add an empty layer to the model and save it.
    Add {
        /// Layer name (letters, digits, '-' and '_').
        name: String,
    },
    /// List layers with their element counts.
    List,
}

pub fn execute(cmd: &LayerCommands, config: &StagingConfig) -> anyhow::Result<()> {
    match cmd {
        LayerCommands::Add { name } => add_layer(config, name),
        LayerCommands::List => list_layers(config),
    }
}

fn add_layer(config: &StagingConfig, name: &str) -> anyhow::Result<()> {
    let _lock = ProjectLock::for_project(config)?;
    let mut model = open_model(config)?;

    model.add_layer(Layer::new(name))?;
    model.save_layer(name)?;
    model.save_manifest()?;

    println!("Added layer '{}'", name);
    Ok(())
}

fn list_layers(config: &StagingConfig) -> anyhow::Result<()> {
    let model = open_model(config)?;
    if model.manifest().layers.is_empty() {
        println!("No layers.");
        return Ok(());
    }
    for layer in model.layers() {
        println!("{:<24} {:>6} element(s)", layer.name, layer.len());
    }
    Ok(())
}
