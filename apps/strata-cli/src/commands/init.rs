// init.rs — `strata init`: create an empty model and staging area.

use strata_model::Model;
use strata_staging::{ChangesetStorage, StagingConfig};

pub fn execute(config: &StagingConfig, name: &str) -> anyhow::Result<()> {
    if config.model_dir.join("manifest.json").exists() {
        anyhow::bail!("a model already exists at {}", config.model_dir.display());
    }

    let model = Model::init(&config.model_dir, name)?;
    ChangesetStorage::new(&config.changesets_dir)?;
    tracing::info!("initialised model '{}'", model.manifest().name);

    println!("Initialised model '{}'", model.manifest().name);
    println!("  Model:      {}", config.model_dir.display());
    println!("  Changesets: {}", config.changesets_dir.display());
    Ok(())
}
