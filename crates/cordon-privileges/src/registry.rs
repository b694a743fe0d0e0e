//! Resource type descriptors.
//!
//! A descriptor declares the closed set of properties and child-list
//! relations a resource type has. Policies are validated against it at
//! registration time.

use std::collections::BTreeSet;

use cordon_types::ResourceType;
use serde::Serialize;

/// Pseudo-property standing for the whole resource (read/edit).
pub const WHOLE_RESOURCE: &str = "*";

/// Pseudo-property checked with the `DELETE` bit when creating the resource.
pub const CREATE: &str = "@create";

/// Pseudo-property checked with the `DELETE` bit when deleting the resource.
pub const DELETE: &str = "@delete";

/// Reserved keys accepted on every resource type.
pub const PSEUDO_PROPERTIES: [&str; 3] = [WHOLE_RESOURCE, CREATE, DELETE];

/// Declared shape of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    name: ResourceType,
    properties: BTreeSet<String>,
    relations: BTreeSet<String>,
    user_like: bool,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<ResourceType>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeSet::new(),
            relations: BTreeSet::new(),
            user_like: false,
        }
    }

    /// Declares properties (builder pattern).
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(properties.into_iter().map(Into::into));
        self
    }

    /// Declares child-list relations (builder pattern).
    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(relations.into_iter().map(Into::into));
        self
    }

    /// Marks this type as the one actors are instances of.
    pub fn user_like(mut self) -> Self {
        self.user_like = true;
        self
    }

    pub fn name(&self) -> &ResourceType {
        &self.name
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }

    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(String::as_str)
    }

    pub fn is_user_like(&self) -> bool {
        self.user_like
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains(property)
    }

    pub fn has_relation(&self, relation: &str) -> bool {
        self.relations.contains(relation)
    }

    /// Returns whether `key` may appear in a permission map for this type.
    pub fn accepts_key(&self, key: &str) -> bool {
        PSEUDO_PROPERTIES.contains(&key) || self.has_property(key) || self.has_relation(key)
    }
}
