// element.rs — Element subcommands: add, update, delete.
//
// Every mutation goes through `route_change`: with an active changeset it
// is staged there (nothing touches the model); without one it is applied to
// the model and saved immediately.

use clap::Subcommand;
use strata_changeset::ChangeRecord;
use strata_model::{Element, ElementPatch};
use strata_staging::{ProjectLock, RoutedChange, StagingConfig};

use super::{open_manager, open_model, parse_property};

#[derive(Subcommand)]
pub enum ElementCommands {
    /// Add a new element.
    Add {
        /// Layer the element belongs to.
        layer: String,
        /// Element id (e.g., "api.endpoint.ping").
        id: String,
        /// Element type (e.g., "endpoint").
        #[arg(long = "type")]
        element_type: String,
        /// Display name (defaults to the id).
        #[arg(long)]
        name: Option<String>,
        /// Property as key=value; repeatable.
        #[arg(long = "prop")]
        props: Vec<String>,
    },
    /// Change fields of an existing element.
    Update {
        layer: String,
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Property as key=value; repeatable.
        #[arg(long = "prop")]
        props: Vec<String>,
        /// Property to remove; repeatable.
        #[arg(long = "unset")]
        unset: Vec<String>,
    },
    /// Delete an element.
    Delete { layer: String, id: String },
}

pub fn execute(cmd: &ElementCommands, config: &StagingConfig) -> anyhow::Result<()> {
    let change = build_change(cmd)?;

    let _lock = ProjectLock::for_project(config)?;
    let mut model = open_model(config)?;
    let manager = open_manager(config, &model)?;

    match manager.route_change(&mut model, change)? {
        RoutedChange::Staged {
            changeset_id,
            sequence_number,
        } => println!(
            "Staged as change #{} in changeset '{}'",
            sequence_number, changeset_id
        ),
        RoutedChange::Applied { layer } => println!("Applied directly to layer '{}'", layer),
    }
    Ok(())
}

fn build_change(cmd: &ElementCommands) -> anyhow::Result<ChangeRecord> {
    let change = match cmd {
        ElementCommands::Add {
            layer,
            id,
            element_type,
            name,
            props,
        } => {
            let mut element = Element::new(id, element_type, name.as_deref().unwrap_or(id));
            for raw in props {
                let (key, value) = parse_property(raw)?;
                element = element.with_property(key, value);
            }
            ChangeRecord::add(layer, element)
        }
        ElementCommands::Update {
            layer,
            id,
            name,
            props,
            unset,
        } => {
            let mut patch = ElementPatch::new();
            if let Some(name) = name {
                patch = patch.with_name(name);
            }
            for raw in props {
                let (key, value) = parse_property(raw)?;
                patch = patch.set(key, value);
            }
            for key in unset {
                patch = patch.unset(key);
            }
            ChangeRecord::update(layer, id, patch)
        }
        ElementCommands::Delete { layer, id } => ChangeRecord::delete(layer, id),
    };
    change.validate()?;
    Ok(change)
}
