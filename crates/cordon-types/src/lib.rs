//! # cordon-types: Core types for `Cordon`
//!
//! This crate contains shared types used across the `Cordon` system:
//! - Identifiers ([`Id`], [`Role`], [`ResourceType`])
//! - Actor sessions ([`Session`])
//! - Raw resource instances ([`Instance`])
//! - Data sensitivity ([`Sensitivity`])

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use serde_json::Value;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of a resource instance or an actor.
///
/// Actors are themselves `User` resources, so both share one id space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A policy-matching identifier an actor can hold.
///
/// Roles are opaque: the engine never interprets them beyond equality.
/// Well-known roles can be declared as constants with [`Role::from_static`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Name of a resource type (e.g. `Project`, `User`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Session
// ============================================================================

/// An authenticated actor: who is asking, and which roles they hold.
///
/// Identity establishment happens upstream; this is only the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord")]
pub struct Session {
    actor: Id,
    roles: BTreeSet<Role>,
}

/// Wire shape of a [`Session`], validated on the way in.
#[derive(Deserialize)]
struct SessionRecord {
    actor: Id,
    roles: BTreeSet<Role>,
}

/// Error returned when a session carries no roles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session must carry at least one role")]
pub struct EmptyRolesError;

impl TryFrom<SessionRecord> for Session {
    type Error = EmptyRolesError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        if record.roles.is_empty() {
            return Err(EmptyRolesError);
        }
        Ok(Self {
            actor: record.actor,
            roles: record.roles,
        })
    }
}

impl Session {
    /// Creates a session for `actor` holding `roles`.
    ///
    /// # Panics
    ///
    /// Panics if `roles` is empty. Every authenticated actor holds at least
    /// one role.
    pub fn new(actor: impl Into<Id>, roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        assert!(!roles.is_empty(), "session must carry at least one role");
        Self {
            actor: actor.into(),
            roles,
        }
    }

    pub fn actor(&self) -> &Id {
        &self.actor
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

// ============================================================================
// Instance
// ============================================================================

/// A raw, unsecured resource instance: an id plus a property bag keyed by
/// the resource type's declared property names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Id,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Instance {
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property (builder pattern).
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Returns the property as a string slice, if it is a JSON string.
    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.get(property).and_then(Value::as_str)
    }
}

// ============================================================================
// Sensitivity
// ============================================================================

/// Data sensitivity, ordered from least to most sensitive.
///
/// Projects carry a sensitivity that descendants inherit as their
/// effective sensitivity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Sensitivity {
    Low,
    Medium,
    /// Unknown sensitivity is treated as `High`.
    #[default]
    High,
}

impl Sensitivity {
    pub const ALL: [Sensitivity; 3] = [Sensitivity::Low, Sensitivity::Medium, Sensitivity::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Sensitivity::Low => "Low",
            Sensitivity::Medium => "Medium",
            Sensitivity::High => "High",
        }
    }

    /// Every level at or below `self`, least sensitive first.
    pub fn at_most(self) -> impl Iterator<Item = Sensitivity> {
        Self::ALL.into_iter().filter(move |s| *s <= self)
    }
}

impl Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown sensitivity name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sensitivity: {0:?}")]
pub struct ParseSensitivityError(String);

impl FromStr for Sensitivity {
    type Err = ParseSensitivityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Sensitivity::Low),
            "Medium" => Ok(Sensitivity::Medium),
            "High" => Ok(Sensitivity::High),
            other => Err(ParseSensitivityError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_session_deserialize_requires_roles() {
        let session: Session = serde_json::from_str(r#"{"actor": "u1", "roles": ["Translator"]}"#).unwrap();
        assert!(session.has_role(&Role::from("Translator")));

        let err = serde_json::from_str::<Session>(r#"{"actor": "u1", "roles": []}"#).unwrap_err();
        assert!(err.to_string().contains("at least one role"));
    }

    #[test]
    fn test_sensitivity_ordering() {
        assert!(Sensitivity::Low < Sensitivity::Medium);
        assert!(Sensitivity::Medium < Sensitivity::High);
        assert_eq!(Sensitivity::default(), Sensitivity::High);
    }

    #[test_case(Sensitivity::Low => vec![Sensitivity::Low]; "low")]
    #[test_case(Sensitivity::Medium => vec![Sensitivity::Low, Sensitivity::Medium]; "medium")]
    #[test_case(Sensitivity::High => Sensitivity::ALL.to_vec(); "high")]
    fn test_sensitivity_at_most(level: Sensitivity) -> Vec<Sensitivity> {
        level.at_most().collect()
    }

    #[test]
    fn test_sensitivity_parse() {
        assert_eq!("Medium".parse::<Sensitivity>(), Ok(Sensitivity::Medium));
        assert!("medium".parse::<Sensitivity>().is_err());
    }

    #[test]
    #[should_panic(expected = "at least one role")]
    fn test_session_requires_role() {
        let _ = Session::new("u1", Vec::<Role>::new());
    }

    #[test]
    fn test_session_roles_deduplicated() {
        let session = Session::new("u1", [Role::from("Admin"), Role::from("Admin")]);
        assert_eq!(session.roles().len(), 1);
        assert!(session.has_role(&Role::from_static("Admin")));
    }

    #[test]
    fn test_instance_properties() {
        let instance = Instance::new("p1")
            .with("name", "Alpha")
            .with("step", 3);
        assert_eq!(instance.get_str("name"), Some("Alpha"));
        assert_eq!(instance.get_str("step"), None);
        assert_eq!(instance.get("step"), Some(&Value::from(3)));
    }

    #[test]
    fn test_instance_deserializes_without_properties() {
        let instance: Instance = serde_json::from_str(r#"{"id":"p9"}"#).expect("deserialize");
        assert_eq!(instance.id, Id::from("p9"));
        assert!(instance.properties.is_empty());
    }
}
