//! Permission bits and per-property permission maps.
//!
//! Access is always default-deny: a property absent from a
//! [`PermissionMap`] has the empty permission.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Permission bits granted on a property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Permission: u8 {
        /// Read the property value.
        const READ          = 1 << 0;
        /// Change the property value.
        const EDIT          = 1 << 1;
        /// Create or delete (checked on whole-resource pseudo-properties).
        const DELETE        = 1 << 2;
        const READ_AND_EDIT = Self::READ.bits() | Self::EDIT.bits();
    }
}

impl Default for Permission {
    fn default() -> Self {
        Self::empty()
    }
}

impl Permission {
    /// `a | b`
    pub fn combine(self, other: Permission) -> Permission {
        self | other
    }

    /// `(self & required) == required`
    pub fn has(self, required: Permission) -> bool {
        self.contains(required)
    }
}

/// An action checked against a resource or one of its properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Edit,
    Create,
    Delete,
}

impl Action {
    /// The permission bit this action requires.
    ///
    /// Create and delete share the `DELETE` bit; they are told apart by the
    /// pseudo-property they are checked on.
    pub fn required(self) -> Permission {
        match self {
            Action::Read => Permission::READ,
            Action::Edit => Permission::EDIT,
            Action::Create | Action::Delete => Permission::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Edit => "edit",
            Action::Create => "create",
            Action::Delete => "delete",
        }
    }
}

/// Property name → permission.
///
/// Merging is a per-key bitwise OR, which is commutative and associative,
/// so the order policies are merged in never affects the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<String, Permission>);

impl PermissionMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the permission for `property`, empty if absent.
    pub fn get(&self, property: &str) -> Permission {
        self.0.get(property).copied().unwrap_or_default()
    }

    /// ORs `permission` into the entry for `property`.
    pub fn grant(&mut self, property: impl Into<String>, permission: Permission) {
        let entry = self.0.entry(property.into()).or_default();
        *entry = entry.combine(permission);
    }

    /// Builder form of [`PermissionMap::grant`].
    pub fn with(mut self, property: impl Into<String>, permission: Permission) -> Self {
        self.grant(property, permission);
        self
    }

    /// ORs every entry of `other` into `self`.
    pub fn merge(&mut self, other: &PermissionMap) {
        for (property, permission) in &other.0 {
            self.grant(property.clone(), *permission);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Permission)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns whether any entry whose key satisfies `on` grants `permission`.
    pub fn grants_on(&self, permission: Permission, mut on: impl FnMut(&str) -> bool) -> bool {
        self.0
            .iter()
            .any(|(key, p)| p.has(permission) && on(key))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|k, _| keep(k));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>> FromIterator<(K, Permission)> for PermissionMap {
    fn from_iter<T: IntoIterator<Item = (K, Permission)>>(iter: T) -> Self {
        let mut map = PermissionMap::new();
        for (property, permission) in iter {
            map.grant(property, permission);
        }
        map
    }
}
