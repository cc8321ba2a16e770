// record.rs — ChangeRecord: one proposed mutation of one element.
//
// A record says which element in which layer changes, and how:
//   add    — `after` carries the full new element as a patch (type required,
//            no null properties since null means "remove" in a patch)
//   update — `after` carries the fields to change; `before` is informational
//   delete — no `after`; `before` optionally captures what is removed
//
// The sequence number is assigned when the record is staged and defines the
// replay order at commit time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_model::{Element, ElementPatch};

use crate::error::ChangesetError;

/// The kind of mutation a record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Add,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Add => write!(f, "add"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Delete => write!(f, "delete"),
        }
    }
}

/// A single proposed mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub change_type: ChangeType,

    pub element_id: String,

    pub layer_name: String,

    /// The element as it was when the change was proposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Element>,

    /// The field values the change sets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<ElementPatch>,

    pub timestamp: DateTime<Utc>,

    /// Position within the owning changeset; reassigned when staged.
    #[serde(default)]
    pub sequence_number: usize,
}

impl ChangeRecord {
    fn new(
        change_type: ChangeType,
        layer_name: impl Into<String>,
        element_id: impl Into<String>,
        before: Option<Element>,
        after: Option<ElementPatch>,
    ) -> Self {
        Self {
            change_type,
            element_id: element_id.into(),
            layer_name: layer_name.into(),
            before,
            after,
            timestamp: Utc::now(),
            sequence_number: 0,
        }
    }

    /// Propose adding a new element.
    pub fn add(layer_name: impl Into<String>, element: Element) -> Self {
        let patch = ElementPatch::from_element(&element);
        Self::new(ChangeType::Add, layer_name, element.id, None, Some(patch))
    }

    /// Propose a field-level update of an existing element.
    pub fn update(
        layer_name: impl Into<String>,
        element_id: impl Into<String>,
        patch: ElementPatch,
    ) -> Self {
        Self::new(ChangeType::Update, layer_name, element_id, None, Some(patch))
    }

    /// Propose deleting an element.
    pub fn delete(layer_name: impl Into<String>, element_id: impl Into<String>) -> Self {
        Self::new(ChangeType::Delete, layer_name, element_id, None, None)
    }

    /// Attach the pre-change element state and return self.
    pub fn with_before(mut self, before: Element) -> Self {
        self.before = Some(before);
        self
    }

    /// Check that the record's payload matches its change type.
    pub fn validate(&self) -> Result<(), ChangesetError> {
        let invalid = |reason: &str| ChangesetError::InvalidChange {
            element_id: self.element_id.clone(),
            reason: reason.to_string(),
        };

        if self.element_id.trim().is_empty() {
            return Err(invalid("element id is empty"));
        }
        if self.layer_name.trim().is_empty() {
            return Err(invalid("layer name is empty"));
        }

        match (self.change_type, &self.after) {
            (ChangeType::Add, None) => Err(invalid("add requires the new element")),
            (ChangeType::Add, Some(patch)) if patch.element_type.is_none() => {
                Err(invalid("add requires an element type"))
            }
            (ChangeType::Add, Some(patch))
                if patch.properties.values().any(|v| v.is_null()) =>
            {
                Err(invalid("add cannot set a property to null"))
            }
            (ChangeType::Update, None) => Err(invalid("update requires the fields to change")),
            (ChangeType::Update, Some(patch)) if patch.is_empty() => {
                Err(invalid("update changes nothing"))
            }
            (ChangeType::Delete, Some(_)) => Err(invalid("delete must not carry new values")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_record_carries_full_element() {
        let element =
            Element::new("api.endpoint.ping", "endpoint", "Ping").with_property("path", "/ping");
        let record = ChangeRecord::add("api", element.clone());
        assert_eq!(record.change_type, ChangeType::Add);
        assert_eq!(record.element_id, "api.endpoint.ping");
        record.validate().unwrap();
        let rebuilt = record.after.unwrap().to_element("api.endpoint.ping").unwrap();
        assert_eq!(rebuilt, element);
    }

    #[test]
    fn shape_rules_enforced() {
        let mut add = ChangeRecord::add("api", Element::new("a", "t", "A"));
        add.after = Some(ElementPatch::new().with_name("no type"));
        assert!(matches!(add.validate(), Err(ChangesetError::InvalidChange { .. })));

        let mut update = ChangeRecord::update("api", "a", ElementPatch::new());
        assert!(update.validate().is_err());
        update.after = None;
        assert!(update.validate().is_err());

        let mut delete = ChangeRecord::delete("api", "a");
        delete.after = Some(ElementPatch::new());
        assert!(delete.validate().is_err());

        assert!(ChangeRecord::delete("", "a").validate().is_err());
        assert!(ChangeRecord::delete("api", " ").validate().is_err());
    }

    #[test]
    fn add_with_null_property_is_rejected() {
        let element = Element::new("api.e.a", "endpoint", "A")
            .with_property("path", "/a")
            .with_property("owner", serde_json::Value::Null);
        let err = ChangeRecord::add("api", element).validate().unwrap_err();
        assert!(err.to_string().contains("null"));

        let mut patch = ElementPatch::new().unset("owner");
        patch.element_type = Some("endpoint".into());
        let mut add = ChangeRecord::add("api", Element::new("api.e.a", "endpoint", "A"));
        add.after = Some(patch);
        assert!(add.validate().is_err());
    }

    #[test]
    fn serializes_type_field() {
        let record = ChangeRecord::delete("api", "api.endpoint.ping");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "delete");
        assert_eq!(json["layer_name"], "api");
        assert!(json.get("after").is_none());
    }
}
