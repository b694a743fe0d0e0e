//! Privilege context: the input tuple driving every decision.
//!
//! Extra dimensions are an open-ended overlay keyed by name. Services
//! attach whatever a condition needs beyond the base instance (the active
//! variant, an ancestor's effective sensitivity, the roles the actor holds
//! on a scoping ancestor) without the engine knowing about each one.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use cordon_types::{Instance, ResourceType, Role, Sensitivity, Session, Value};

use crate::registry::ResourceDescriptor;

/// Dimension carrying the active variant key (e.g. `"draft"`).
pub const VARIANT: &str = "variant";

/// Dimension carrying the effective sensitivity inherited from an ancestor.
pub const SENSITIVITY: &str = "sensitivity";

/// Dimension carrying the roles the actor holds on the scoping ancestor.
pub const SCOPE_ROLES: &str = "scopeRoles";

/// Immutable dimension overlay. Merging is last-write-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions(BTreeMap<String, Value>);

impl Dimensions {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets a dimension (builder pattern).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a new overlay with `other` written over `self`.
    pub fn merged(&self, other: &Dimensions) -> Dimensions {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Dimensions(merged)
    }

    pub fn variant(&self) -> Option<&str> {
        self.get(VARIANT).and_then(Value::as_str)
    }

    /// Effective sensitivity, if supplied and well-formed.
    pub fn sensitivity(&self) -> Option<Sensitivity> {
        self.get(SENSITIVITY)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn scope_roles(&self) -> Option<BTreeSet<Role>> {
        self.get(SCOPE_ROLES).map(roles_from_value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Dimensions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Dimensions(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Reads a JSON array of role names. Non-string entries are ignored.
pub(crate) fn roles_from_value(value: &Value) -> BTreeSet<Role> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(Role::from)
                .collect()
        })
        .unwrap_or_default()
}

/// `{session, resource, instance?, dimensions}`.
///
/// Cheap to clone: the session, descriptor and instance are shared.
#[derive(Debug, Clone)]
pub struct PrivilegeContext {
    session: Arc<Session>,
    resource: Arc<ResourceDescriptor>,
    instance: Option<Arc<Instance>>,
    dimensions: Dimensions,
}

impl PrivilegeContext {
    pub fn new(session: Arc<Session>, resource: Arc<ResourceDescriptor>) -> Self {
        Self {
            session,
            resource,
            instance: None,
            dimensions: Dimensions::new(),
        }
    }

    /// Returns a copy evaluating against `instance`.
    pub fn with_instance(&self, instance: Arc<Instance>) -> Self {
        Self {
            instance: Some(instance),
            ..self.clone()
        }
    }

    /// Returns a copy with `extra` merged over the current dimensions.
    pub fn for_context(&self, extra: &Dimensions) -> Self {
        Self {
            dimensions: self.dimensions.merged(extra),
            ..self.clone()
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }

    pub fn resource_type(&self) -> &ResourceType {
        self.resource.name()
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_deref()
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }
}
