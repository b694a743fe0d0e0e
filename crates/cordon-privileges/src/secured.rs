//! Redacted views handed to the serialization layer.

use std::collections::BTreeMap;

use cordon_types::{Id, ResourceType, Value};
use serde::Serialize;

/// A property value plus what the actor may do with it.
///
/// The value is omitted whenever `can_read` is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuredProperty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub can_read: bool,
    pub can_edit: bool,
}

impl SecuredProperty {
    pub(crate) fn new(value: Option<&Value>, can_read: bool, can_edit: bool) -> Self {
        Self {
            value: if can_read { value.cloned() } else { None },
            can_read,
            can_edit,
        }
    }
}

/// Every declared property of an instance, secured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuredResource {
    pub resource_type: ResourceType,
    pub id: Id,
    pub properties: BTreeMap<String, SecuredProperty>,
    pub can_create: bool,
    pub can_delete: bool,
}

impl SecuredResource {
    pub fn get(&self, property: &str) -> Option<&SecuredProperty> {
        self.properties.get(property)
    }

    /// The value if present and readable.
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.get(property).and_then(|p| p.value.as_ref())
    }
}
