// config.rs — Staging configuration.
//
// StagingConfig determines where Strata keeps its state. The
// `for_project()` constructor generates the standard layout:
//
//   <project>/model/                 — the base model (manifest + layers)
//   <project>/.strata/config.toml    — optional settings (see below)
//   <project>/.strata/changesets/    — one directory per changeset
//
// `.strata/config.toml` example:
//
//   [staging]
//   lock_timeout_ms = 5000
//   lock_poll_ms = 50
//   validate_on_commit = false
//   model_dir = "model"

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StagingError;

/// Tunable settings read from `.strata/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagingSettings {
    /// How long `lock()` waits before giving up.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// How often `lock()` retries while waiting.
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,

    /// Run the validator on every commit, even without `--validate`.
    #[serde(default)]
    pub validate_on_commit: bool,

    /// Model directory, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_poll_ms: default_lock_poll_ms(),
            validate_on_commit: false,
            model_dir: None,
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_lock_poll_ms() -> u64 {
    50
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    staging: StagingSettings,
}

/// Resolved paths and settings for one project.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub project_root: PathBuf,
    pub model_dir: PathBuf,
    pub changesets_dir: PathBuf,
    pub settings: StagingSettings,
}

impl StagingConfig {
    /// Standard `.strata/` layout with default settings.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        Self {
            model_dir: root.join("model"),
            changesets_dir: root.join(".strata").join("changesets"),
            project_root: root,
            settings: StagingSettings::default(),
        }
    }

    /// Standard layout, with settings from `.strata/config.toml` if present.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, StagingError> {
        let mut config = Self::for_project(project_root);
        let path = config.config_file();
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| StagingError::IoError {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile =
            toml::from_str(&content).map_err(|source| StagingError::Config { path, source })?;

        if let Some(model_dir) = &file.staging.model_dir {
            config.model_dir = config.project_root.join(model_dir);
        }
        config.settings = file.staging;
        tracing::debug!("loaded staging settings: {:?}", config.settings);
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.project_root.join(".strata").join("config.toml")
    }

    /// Directory used as the advisory project lock.
    pub fn lock_path(&self) -> PathBuf {
        self.changesets_dir.join(".lock")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.lock_timeout_ms)
    }

    pub fn lock_poll(&self) -> Duration {
        Duration::from_millis(self.settings.lock_poll_ms)
    }
}
