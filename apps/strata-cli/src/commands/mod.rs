// mod.rs — Command modules and shared helpers.

pub mod changeset;
pub mod element;
pub mod init;
pub mod layer;

use anyhow::Context;
use serde_json::Value;
use strata_model::Model;
use strata_staging::{StagingAreaManager, StagingConfig};

/// A commit that ran but was not applied. Carries its own exit code.
#[derive(Debug, thiserror::Error)]
pub enum CommitRefused {
    #[error("changeset '{id}' was not committed: the model drifted (use --force or rebase)")]
    Drifted { id: String },
    #[error("changeset '{id}' was not committed: {failed} change(s) failed")]
    RecordsFailed { id: String, failed: usize },
}

/// Load the project's model from disk.
pub fn open_model(config: &StagingConfig) -> anyhow::Result<Model> {
    Model::load(&config.model_dir).with_context(|| {
        format!(
            "no model at {} (run `strata init <name>` first)",
            config.model_dir.display()
        )
    })
}

/// Open the staging area bound to `model`.
pub fn open_manager(config: &StagingConfig, model: &Model) -> anyhow::Result<StagingAreaManager> {
    Ok(StagingAreaManager::new(config.clone())?.with_model(model))
}

/// Parse `key=value`. Values that parse as JSON keep their type;
/// anything else is taken as a string.
pub fn parse_property(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("property '{}' must be key=value", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("property '{}' has an empty key", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_keep_json_types() {
        assert_eq!(parse_property("port=8080").unwrap(), ("port".into(), Value::from(8080)));
        assert_eq!(parse_property("ok=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_property("path=/ping").unwrap().1, Value::from("/ping"));
        assert_eq!(parse_property("empty=").unwrap().1, Value::from(""));
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }
}
