// element.rs — Elements, relationships, and structured element patches.
//
// An Element is a single typed node in the model. Properties live in a
// BTreeMap so the serialized form is canonical: the same element always
// serializes to the same bytes, which snapshot hashing depends on.
//
// Updates never merge arbitrary objects. An ElementPatch names exactly which
// fields change, so a recorded update can be audited and replayed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

/// A directed relationship from one element to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Relationship {
    /// Id of the element this relationship points at.
    pub target: String,
    /// Relationship kind (e.g., "depends_on", "realizes").
    pub kind: String,
}

impl Relationship {
    pub fn new(target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: kind.into(),
        }
    }
}

/// A single typed node in the model, uniquely identified by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Element {
    /// Model-wide unique identifier (conventionally `<layer>.<type>.<name>`).
    pub id: String,

    /// Element type within its layer (e.g., "endpoint", "service").
    pub element_type: String,

    /// Human-readable name.
    pub name: String,

    /// Free-form typed properties, kept in key order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    /// Outgoing relationships.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Element {
    /// Create an element with no properties or relationships.
    pub fn new(
        id: impl Into<String>,
        element_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            name: name.into(),
            properties: BTreeMap::new(),
            relationships: Vec::new(),
        }
    }

    /// Set a property and return self (builder pattern).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a relationship and return self.
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }
}

/// An explicit field-level change to an element.
///
/// Only the fields that are `Some` (or present in `properties`) change.
/// A property mapped to JSON `null` is removed from the element.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Property assignments. `Value::Null` removes the property.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,

    /// Full replacement of the relationship list, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
}

impl ElementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.properties.insert(key.into(), Value::Null);
        self
    }

    pub fn with_relationships(mut self, relationships: Vec<Relationship>) -> Self {
        self.relationships = Some(relationships);
        self
    }

    /// True when applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.element_type.is_none()
            && self.name.is_none()
            && self.properties.is_empty()
            && self.relationships.is_none()
    }

    /// Build a patch that turns an empty element into `element`.
    ///
    /// A property whose value is `null` cannot survive the round trip: the
    /// patch reads it as a removal, so `to_element` leaves it out.
    pub fn from_element(element: &Element) -> Self {
        Self {
            element_type: Some(element.element_type.clone()),
            name: Some(element.name.clone()),
            properties: element.properties.clone(),
            relationships: if element.relationships.is_empty() {
                None
            } else {
                Some(element.relationships.clone())
            },
        }
    }

    /// Apply the patch to a live element in place.
    pub fn apply(&self, element: &mut Element) {
        if let Some(element_type) = &self.element_type {
            element.element_type = element_type.clone();
        }
        if let Some(name) = &self.name {
            element.name = name.clone();
        }
        for (key, value) in &self.properties {
            if value.is_null() {
                element.properties.remove(key);
            } else {
                element.properties.insert(key.clone(), value.clone());
            }
        }
        if let Some(relationships) = &self.relationships {
            element.relationships = relationships.clone();
        }
    }

    /// Materialize a new element from this patch.
    ///
    /// `element_type` is required; the name defaults to the id.
    pub fn to_element(&self, id: &str) -> Result<Element, ModelError> {
        let element_type =
            self.element_type
                .clone()
                .ok_or_else(|| ModelError::IncompleteElement {
                    element_id: id.to_string(),
                    reason: "element_type is required".to_string(),
                })?;
        let name = self.name.clone().unwrap_or_else(|| id.to_string());
        let mut element = Element::new(id, element_type, name);
        self.apply(&mut element);
        Ok(element)
    }
}
