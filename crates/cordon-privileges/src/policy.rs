//! Access policies.
//!
//! A policy ties a (resource type, role) pair, optionally narrowed by a
//! [`Condition`], to the permissions it grants. Policies are built once at
//! startup with the builder methods below and handed to
//! [`PolicySet::new`](crate::PolicySet::new), which validates them against
//! the registered resource descriptors.

use std::{fmt, sync::Arc};

use cordon_types::{Instance, ResourceType, Role};

use crate::{
    condition::Condition,
    permission::{Permission, PermissionMap},
    registry,
};

/// Permission map derived from a loaded instance.
pub type ComputeFn = Arc<dyn Fn(&Instance) -> PermissionMap + Send + Sync>;

/// What a policy grants once its condition holds.
#[derive(Clone)]
pub enum Permissions {
    /// Fixed grants.
    Static {
        /// Granted on every declared property and on the whole resource.
        all: Permission,
        /// Grants on individual properties or pseudo-properties.
        properties: PermissionMap,
        /// Grants on child-list relations.
        children: PermissionMap,
    },
    /// Grants computed from the instance. Yields nothing without one.
    Computed(ComputeFn),
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::Static {
            all: Permission::empty(),
            properties: PermissionMap::new(),
            children: PermissionMap::new(),
        }
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permissions::Static {
                all,
                properties,
                children,
            } => f
                .debug_struct("Static")
                .field("all", all)
                .field("properties", properties)
                .field("children", children)
                .finish(),
            Permissions::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Access policy for one (resource type, role) pair.
#[derive(Debug, Clone)]
pub struct Policy {
    pub(crate) name: Option<String>,
    pub(crate) resource_type: ResourceType,
    pub(crate) role: Role,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) permissions: Permissions,
    /// Set when static grants were mixed with a computed function.
    pub(crate) mixed: bool,
}

impl Policy {
    /// Creates a policy granting nothing.
    pub fn new(resource_type: impl Into<ResourceType>, role: impl Into<Role>) -> Self {
        Self {
            name: None,
            resource_type: resource_type.into(),
            role: role.into(),
            conditions: Vec::new(),
            permissions: Permissions::default(),
            mixed: false,
        }
    }

    /// Names the policy for logs and explanations.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Narrows the policy to instances satisfying `condition`.
    ///
    /// Calling this repeatedly intersects the conditions, which must then
    /// be of the same kind.
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Narrows the policy to instances satisfying every condition.
    pub fn when_all(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    /// Grants `READ` on every declared property and the whole resource.
    pub fn read(self) -> Self {
        self.grant_all(Permission::READ)
    }

    /// Grants `EDIT` on every declared property and the whole resource.
    pub fn edit(self) -> Self {
        self.grant_all(Permission::EDIT)
    }

    /// Allows creating the resource.
    pub fn create(self) -> Self {
        self.specifically(registry::CREATE, Permission::DELETE)
    }

    /// Allows deleting the resource.
    pub fn delete(self) -> Self {
        self.specifically(registry::DELETE, Permission::DELETE)
    }

    /// Grants `permission` on one property or pseudo-property.
    pub fn specifically(mut self, property: impl Into<String>, permission: Permission) -> Self {
        if let Some((_, properties, _)) = self.static_parts() {
            properties.grant(property, permission);
        }
        self
    }

    /// Grants `permission` on a child-list relation.
    pub fn children(mut self, relation: impl Into<String>, permission: Permission) -> Self {
        if let Some((_, _, children)) = self.static_parts() {
            children.grant(relation, permission);
        }
        self
    }

    /// Replaces the grants with a function of the instance.
    pub fn computed(mut self, compute: impl Fn(&Instance) -> PermissionMap + Send + Sync + 'static) -> Self {
        if let Permissions::Static {
            all,
            properties,
            children,
        } = &self.permissions
        {
            self.mixed |= !all.is_empty() || !properties.is_empty() || !children.is_empty();
        }
        self.permissions = Permissions::Computed(Arc::new(compute));
        self
    }

    fn grant_all(mut self, permission: Permission) -> Self {
        if let Some((all, _, _)) = self.static_parts() {
            *all = all.combine(permission);
        }
        self
    }

    fn static_parts(&mut self) -> Option<(&mut Permission, &mut PermissionMap, &mut PermissionMap)> {
        match &mut self.permissions {
            Permissions::Static {
                all,
                properties,
                children,
            } => Some((all, properties, children)),
            Permissions::Computed(_) => {
                self.mixed = true;
                None
            }
        }
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Name given with [`Policy::named`], or `Type/Role`.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.resource_type, self.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_static_grants() {
        let policy = Policy::new("Project", Role::from("ProjectManager"))
            .read()
            .specifically("name", Permission::EDIT)
            .children("engagements", Permission::READ_AND_EDIT)
            .create();

        let Permissions::Static {
            all,
            properties,
            children,
        } = policy.permissions()
        else {
            panic!("expected static permissions");
        };
        assert_eq!(*all, Permission::READ);
        assert_eq!(properties.get("name"), Permission::EDIT);
        assert_eq!(properties.get(registry::CREATE), Permission::DELETE);
        assert_eq!(children.get("engagements"), Permission::READ_AND_EDIT);
        assert!(!policy.mixed);
    }

    #[test]
    fn test_read_then_edit_combines() {
        let policy = Policy::new("Project", Role::from("Administrator")).read().edit();
        let Permissions::Static { all, .. } = policy.permissions() else {
            panic!("expected static permissions");
        };
        assert_eq!(*all, Permission::READ_AND_EDIT);
    }

    #[test]
    fn test_mixing_computed_and_static_is_flagged() {
        let after = Policy::new("Project", Role::from("Translator"))
            .read()
            .computed(|_| PermissionMap::new());
        assert!(after.mixed);

        let before = Policy::new("Project", Role::from("Translator"))
            .computed(|_| PermissionMap::new())
            .read();
        assert!(before.mixed);

        let pure = Policy::new("Project", Role::from("Translator")).computed(|_| PermissionMap::new());
        assert!(!pure.mixed);
    }

    #[test]
    fn test_display_name() {
        let policy = Policy::new("Budget", Role::from("Consultant"));
        assert_eq!(policy.display_name(), "Budget/Consultant");
        assert_eq!(policy.named("consultant-budget").display_name(), "consultant-budget");
    }

    #[test]
    fn test_when_collects_conditions() {
        let policy = Policy::new("Project", Role::from("Administrator"))
            .when(Condition::property_in("status", ["InDevelopment"]))
            .when_all([Condition::Always, Condition::property_in("status", ["Active", "InDevelopment"])]);
        assert_eq!(policy.conditions.len(), 3);
    }
}
