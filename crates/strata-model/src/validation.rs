// validation.rs — Model validation pipeline.
//
// A Validator inspects a whole model and returns pass/fail plus the list of
// problems found. The default `ModelValidator` runs an ordered pipeline of
// checks and records which check produced each error:
//
// 1. identity   — ids, types, and names are non-empty; ids unique model-wide
// 2. naming     — element ids are prefixed with their layer name (`api.…`)
// 3. references — every relationship target exists somewhere in the model

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::Model;

/// A single problem reported by a check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Which check produced this issue (e.g., "references").
    pub check: String,
    /// Element the issue is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.element_id {
            Some(id) => write!(f, "[{}] {}: {}", self.check, id, self.message),
            None => write!(f, "[{}] {}", self.check, self.message),
        }
    }
}

/// Outcome of validating a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors rendered as display strings.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Anything that can judge a model as valid or not.
pub trait Validator {
    fn validate_model(&self, model: &Model) -> ValidationResult;
}

/// One stage of the validation pipeline.
pub trait ModelCheck {
    /// Short name recorded on every issue this check emits.
    fn name(&self) -> &'static str;

    fn check(&self, model: &Model, issues: &mut Vec<ValidationIssue>);
}

/// Ids, types, and names present; ids unique across layers.
pub struct IdentityCheck;

impl ModelCheck for IdentityCheck {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn check(&self, model: &Model, issues: &mut Vec<ValidationIssue>) {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for layer in model.layers() {
            for (key, element) in &layer.elements {
                if element.id.trim().is_empty() {
                    issues.push(issue(self.name(), None, "element with empty id"));
                    continue;
                }
                if key != &element.id {
                    issues.push(issue(
                        self.name(),
                        Some(element.id.as_str()),
                        format!("stored under mismatched key '{}'", key),
                    ));
                }
                if element.element_type.trim().is_empty() {
                    issues.push(issue(
                        self.name(),
                        Some(element.id.as_str()),
                        "missing element type",
                    ));
                }
                if element.name.trim().is_empty() {
                    issues.push(issue(
                        self.name(),
                        Some(element.id.as_str()),
                        "missing name",
                    ));
                }
                if let Some(other) = seen.insert(&element.id, &layer.name) {
                    issues.push(issue(
                        self.name(),
                        Some(element.id.as_str()),
                        format!("duplicate id in layers '{}' and '{}'", other, layer.name),
                    ));
                }
            }
        }
    }
}

/// Element ids start with `<layer>.`.
pub struct NamingCheck;

impl ModelCheck for NamingCheck {
    fn name(&self) -> &'static str {
        "naming"
    }

    fn check(&self, model: &Model, issues: &mut Vec<ValidationIssue>) {
        for layer in model.layers() {
            let prefix = format!("{}.", layer.name);
            for element in layer.elements.values() {
                if !element.id.starts_with(&prefix) {
                    issues.push(issue(
                        self.name(),
                        Some(element.id.as_str()),
                        format!("id should start with '{}'", prefix),
                    ));
                }
            }
        }
    }
}

/// Relationship targets resolve to existing elements.
pub struct ReferenceCheck;

impl ModelCheck for ReferenceCheck {
    fn name(&self) -> &'static str {
        "references"
    }

    fn check(&self, model: &Model, issues: &mut Vec<ValidationIssue>) {
        let known: HashSet<&str> = model
            .layers()
            .flat_map(|layer| layer.elements.keys().map(String::as_str))
            .collect();

        for layer in model.layers() {
            for element in layer.elements.values() {
                for rel in &element.relationships {
                    if !known.contains(rel.target.as_str()) {
                        issues.push(issue(
                            self.name(),
                            Some(element.id.as_str()),
                            format!("{} target '{}' does not exist", rel.kind, rel.target),
                        ));
                    }
                }
            }
        }
    }
}

/// The default validator: runs every check in order.
pub struct ModelValidator {
    checks: Vec<Box<dyn ModelCheck>>,
}

impl ModelValidator {
    /// Pipeline with no checks; add them with [`ModelValidator::with_check`].
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn with_check(mut self, check: impl ModelCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Names of the configured checks, in run order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }
}

impl Default for ModelValidator {
    fn default() -> Self {
        Self::empty()
            .with_check(IdentityCheck)
            .with_check(NamingCheck)
            .with_check(ReferenceCheck)
    }
}

impl Validator for ModelValidator {
    fn validate_model(&self, model: &Model) -> ValidationResult {
        let mut errors = Vec::new();
        for check in &self.checks {
            check.check(model, &mut errors);
        }
        if !errors.is_empty() {
            tracing::debug!("model validation found {} issue(s)", errors.len());
        }
        ValidationResult { errors }
    }
}

fn issue(check: &str, element_id: Option<&str>, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        check: check.to_string(),
        element_id: element_id.map(str::to_string),
        message: message.into(),
    }
}
