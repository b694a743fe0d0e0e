//! Policy set and executor.
//!
//! The policy set is the flat, immutable list of every registered policy
//! plus the resource descriptors they were validated against. It is built
//! once at startup and shared behind an `Arc`.
//!
//! Execution folds every matching policy into one [`PermissionMap`] by
//! OR-ing bits per key, so registration order never changes a decision.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
};

use cordon_types::{ResourceType, Role};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    condition::{Condition, ConditionKind},
    context::PrivilegeContext,
    error::{PrivilegeError, Result},
    permission::{Permission, PermissionMap},
    policy::{ComputeFn, Permissions, Policy},
    registry::{ResourceDescriptor, WHOLE_RESOURCE},
};

// ============================================================================
// Registered Policies
// ============================================================================

#[derive(Clone)]
enum Grants {
    Static(PermissionMap),
    Computed(ComputeFn),
}

/// A validated policy with its grants expanded against the descriptor.
#[derive(Clone)]
struct RegisteredPolicy {
    name: String,
    resource_type: ResourceType,
    role: Role,
    condition: Option<Condition>,
    grants: Grants,
}

impl RegisteredPolicy {
    /// Permissions this policy grants for `(resource_type, role)` in `ctx`.
    ///
    /// A conditional policy grants nothing without an instance, whatever
    /// its condition or the context dimensions say.
    fn evaluate(&self, resource_type: &ResourceType, role: &Role, ctx: &PrivilegeContext) -> Result<PermissionMap> {
        if self.resource_type != *resource_type || self.role != *role {
            return Ok(PermissionMap::new());
        }

        let instance = ctx.instance();
        if let Some(condition) = &self.condition {
            let Some(instance) = instance else {
                return Ok(PermissionMap::new());
            };
            if !condition.evaluate(Some(instance), ctx)? {
                return Ok(PermissionMap::new());
            }
        }

        Ok(match &self.grants {
            Grants::Static(map) => map.clone(),
            Grants::Computed(compute) => instance.map(|i| compute(i)).unwrap_or_default(),
        })
    }

    fn is_computed(&self) -> bool {
        matches!(self.grants, Grants::Computed(_))
    }
}

/// Serializable view of a registered policy.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySummary {
    pub name: String,
    pub resource_type: ResourceType,
    pub role: Role,
    pub condition: Option<Condition>,
    /// `None` for computed policies.
    pub permissions: Option<PermissionMap>,
}

/// One policy's share of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub policy: String,
    pub role: Role,
    pub permission: Permission,
}

// ============================================================================
// Policy Set
// ============================================================================

/// Every registered resource type and policy.
pub struct PolicySet {
    descriptors: BTreeMap<ResourceType, Arc<ResourceDescriptor>>,
    policies: Vec<RegisteredPolicy>,
}

impl PolicySet {
    /// Validates and registers `policies` against `descriptors`.
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::Misconfiguration`] when a descriptor is
    /// registered twice, or a policy targets an unknown resource type,
    /// grants an undeclared property or relation, filters on an undeclared
    /// property, mixes static and computed grants, or intersects conditions
    /// of different kinds.
    pub fn new(
        descriptors: impl IntoIterator<Item = ResourceDescriptor>,
        policies: impl IntoIterator<Item = Policy>,
    ) -> Result<Self> {
        let mut registry = BTreeMap::new();
        for descriptor in descriptors {
            match registry.entry(descriptor.name().clone()) {
                Entry::Occupied(entry) => {
                    return Err(PrivilegeError::misconfigured(format!(
                        "resource type {} registered twice",
                        entry.key()
                    )));
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(descriptor));
                }
            }
        }

        let policies = policies
            .into_iter()
            .map(|policy| register(&registry, policy))
            .collect::<Result<Vec<_>>>()?;

        info!(
            resource_types = registry.len(),
            policies = policies.len(),
            "Policy set registered"
        );

        Ok(Self {
            descriptors: registry,
            policies,
        })
    }

    /// Returns the descriptor for `resource_type`.
    pub fn descriptor(&self, resource_type: &ResourceType) -> Result<Arc<ResourceDescriptor>> {
        self.descriptors
            .get(resource_type)
            .cloned()
            .ok_or_else(|| PrivilegeError::misconfigured(format!("unknown resource type {resource_type}")))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.values().map(AsRef::as_ref)
    }

    /// Summaries of every policy, in registration order.
    pub fn summaries(&self) -> Vec<PolicySummary> {
        self.policies
            .iter()
            .map(|p| PolicySummary {
                name: p.name.clone(),
                resource_type: p.resource_type.clone(),
                role: p.role.clone(),
                condition: p.condition.clone(),
                permissions: match &p.grants {
                    Grants::Static(map) => Some(map.clone()),
                    Grants::Computed(_) => None,
                },
            })
            .collect()
    }

    /// OR-merged permissions of every policy for `role` in `ctx`.
    pub fn execute(&self, role: &Role, ctx: &PrivilegeContext) -> Result<PermissionMap> {
        let resource_type = ctx.resource_type();
        let mut merged = PermissionMap::new();
        for policy in &self.policies {
            let mut granted = policy.evaluate(resource_type, role, ctx)?;
            if policy.is_computed() {
                drop_undeclared(&mut granted, &policy.name, ctx.resource());
            }
            merged.merge(&granted);
        }
        Ok(merged)
    }

    /// [`PolicySet::execute`] once per session role, OR-merged.
    pub fn execute_session(&self, ctx: &PrivilegeContext) -> Result<PermissionMap> {
        let mut merged = PermissionMap::new();
        for role in ctx.session().roles() {
            merged.merge(&self.execute(role, ctx)?);
        }
        Ok(merged)
    }

    /// Every policy contributing bits to `property` in `ctx`.
    pub fn explain(&self, ctx: &PrivilegeContext, property: &str) -> Result<Vec<Contribution>> {
        let resource_type = ctx.resource_type();
        let mut contributions = Vec::new();
        for role in ctx.session().roles() {
            for policy in &self.policies {
                let permission = policy.evaluate(resource_type, role, ctx)?.get(property);
                if !permission.is_empty() {
                    contributions.push(Contribution {
                        policy: policy.name.clone(),
                        role: role.clone(),
                        permission,
                    });
                }
            }
        }
        Ok(contributions)
    }

    /// Conditions under which the session may read rows of the context's
    /// resource type, unioned per condition kind.
    ///
    /// Only static grants of READ on a declared property or the whole
    /// resource take part. Child-list reads never make the row listable,
    /// and computed grants need an instance so they are left out.
    pub(crate) fn readable_conditions(&self, ctx: &PrivilegeContext) -> Result<Vec<Condition>> {
        let resource_type = ctx.resource_type();
        let descriptor = ctx.resource();
        let session = ctx.session();
        let row_key = |key: &str| key == WHOLE_RESOURCE || descriptor.has_property(key);
        let mut grouped: BTreeMap<ConditionKind, Vec<Condition>> = BTreeMap::new();

        for policy in &self.policies {
            if policy.resource_type != *resource_type || !session.has_role(&policy.role) {
                continue;
            }
            match &policy.grants {
                Grants::Static(map) if map.grants_on(Permission::READ, row_key) => {
                    let condition = policy.condition.clone().unwrap_or(Condition::Always);
                    grouped.entry(condition.kind()).or_default().push(condition);
                }
                Grants::Static(_) => {}
                Grants::Computed(_) => debug!(
                    policy = %policy.name,
                    resource_type = %resource_type,
                    "Computed policy excluded from read filter"
                ),
            }
        }

        grouped.into_values().map(Condition::union).collect()
    }
}

impl std::fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySet")
            .field("resource_types", &self.descriptors.keys().collect::<Vec<_>>())
            .field("policies", &self.policies.len())
            .finish()
    }
}

fn register(registry: &BTreeMap<ResourceType, Arc<ResourceDescriptor>>, policy: Policy) -> Result<RegisteredPolicy> {
    let name = policy.display_name();
    let descriptor = registry.get(&policy.resource_type).ok_or_else(|| {
        PrivilegeError::misconfigured(format!(
            "policy {name} targets unknown resource type {}",
            policy.resource_type
        ))
    })?;

    if policy.mixed {
        return Err(PrivilegeError::misconfigured(format!(
            "policy {name} mixes static and computed permissions"
        )));
    }

    let condition = match policy.conditions.len() {
        0 => None,
        _ => Some(Condition::intersect(policy.conditions)?),
    };
    if let Some(Condition::PropertyIn { property, .. }) = &condition {
        if !descriptor.has_property(property) {
            return Err(PrivilegeError::misconfigured(format!(
                "policy {name} filters on undeclared property {}.{property}",
                descriptor.name()
            )));
        }
    }

    let grants = match policy.permissions {
        Permissions::Computed(compute) => Grants::Computed(compute),
        Permissions::Static {
            all,
            properties,
            children,
        } => {
            let mut map = PermissionMap::new();
            if !all.is_empty() {
                for property in descriptor.properties().chain([WHOLE_RESOURCE]) {
                    map.grant(property, all);
                }
            }
            for (key, permission) in properties.iter() {
                if !descriptor.accepts_key(key) || descriptor.has_relation(key) {
                    return Err(PrivilegeError::misconfigured(format!(
                        "policy {name} grants undeclared property {}.{key}",
                        descriptor.name()
                    )));
                }
                map.grant(key, permission);
            }
            for (relation, permission) in children.iter() {
                if !descriptor.has_relation(relation) {
                    return Err(PrivilegeError::misconfigured(format!(
                        "policy {name} grants undeclared relation {}.{relation}",
                        descriptor.name()
                    )));
                }
                map.grant(relation, permission);
            }
            Grants::Static(map)
        }
    };

    Ok(RegisteredPolicy {
        name,
        resource_type: policy.resource_type,
        role: policy.role,
        condition,
        grants,
    })
}

/// Computed grants are validated per call; undeclared keys are dropped.
fn drop_undeclared(map: &mut PermissionMap, policy: &str, descriptor: &ResourceDescriptor) {
    let undeclared: Vec<String> = map
        .keys()
        .filter(|key| !descriptor.accepts_key(key))
        .map(str::to_string)
        .collect();
    if undeclared.is_empty() {
        return;
    }
    warn!(
        policy = %policy,
        resource_type = %descriptor.name(),
        keys = ?undeclared,
        "Computed policy granted undeclared keys"
    );
    map.retain(|key| descriptor.accepts_key(key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use cordon_types::{Instance, Session};

    fn descriptors() -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor::new("Project")
                .with_properties(["name", "status", "mouStart", "mouEnd"])
                .with_relations(["engagements"]),
        ]
    }

    fn ctx(set: &PolicySet, roles: &[&str], instance: Option<Instance>) -> PrivilegeContext {
        let descriptor = set.descriptor(&ResourceType::from("Project")).unwrap();
        let ctx = PrivilegeContext::new(
            Arc::new(Session::new("u1", roles.iter().copied().map(Role::from))),
            descriptor,
        );
        match instance {
            Some(instance) => ctx.with_instance(Arc::new(instance)),
            None => ctx,
        }
    }

    #[test]
    fn test_read_expands_to_declared_properties() {
        let set = PolicySet::new(descriptors(), [Policy::new("Project", Role::from("Reader")).read()]).unwrap();
        let map = set.execute(&Role::from("Reader"), &ctx(&set, &["Reader"], None)).unwrap();

        for key in ["name", "status", "mouStart", "mouEnd", WHOLE_RESOURCE] {
            assert_eq!(map.get(key), Permission::READ, "{key}");
        }
        assert_eq!(map.get("engagements"), Permission::empty());
        assert_eq!(map.get(registry::CREATE), Permission::empty());
    }

    #[test]
    fn test_type_and_role_mismatch_grant_nothing() {
        let set = PolicySet::new(descriptors(), [Policy::new("Project", Role::from("Reader")).read()]).unwrap();
        let map = set.execute(&Role::from("Other"), &ctx(&set, &["Other"], None)).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_conditional_policy_without_instance_grants_nothing() {
        let set = PolicySet::new(
            descriptors(),
            [Policy::new("Project", Role::from("Admin"))
                .when(Condition::property_in("status", ["InDevelopment"]))
                .specifically("mouStart", Permission::READ_AND_EDIT)],
        )
        .unwrap();

        let without = set.execute_session(&ctx(&set, &["Admin"], None)).unwrap();
        assert!(without.is_empty());

        let dev = Instance::new("p1").with("status", "InDevelopment");
        let with = set.execute_session(&ctx(&set, &["Admin"], Some(dev))).unwrap();
        assert_eq!(with.get("mouStart"), Permission::READ_AND_EDIT);
    }

    #[test]
    fn test_computed_policy_drops_undeclared_keys() {
        let set = PolicySet::new(
            descriptors(),
            [Policy::new("Project", Role::from("Reader")).computed(|instance| {
                let mut map = PermissionMap::new().with("bogus", Permission::READ);
                if instance.get_str("status") == Some("Active") {
                    map.grant("name", Permission::READ);
                }
                map
            })],
        )
        .unwrap();

        let active = Instance::new("p1").with("status", "Active");
        let map = set.execute_session(&ctx(&set, &["Reader"], Some(active))).unwrap();
        assert_eq!(map.get("name"), Permission::READ);
        assert_eq!(map.get("bogus"), Permission::empty());

        assert!(set.execute_session(&ctx(&set, &["Reader"], None)).unwrap().is_empty());
    }

    #[test]
    fn test_registration_rejects_undeclared_property() {
        let err = PolicySet::new(
            descriptors(),
            [Policy::new("Project", Role::from("Reader")).specifically("budget", Permission::READ)],
        )
        .expect_err("undeclared");
        assert_eq!(
            err.to_string(),
            "Privilege misconfiguration: policy Project/Reader grants undeclared property Project.budget"
        );
    }

    #[test]
    fn test_registration_rejects_unknown_relation() {
        let err = PolicySet::new(
            descriptors(),
            [Policy::new("Project", Role::from("Reader")).children("budgets", Permission::READ)],
        )
        .expect_err("undeclared relation");
        assert!(err.to_string().contains("undeclared relation Project.budgets"));
    }

    #[test]
    fn test_registration_rejects_unknown_type() {
        assert!(PolicySet::new(descriptors(), [Policy::new("Budget", Role::from("Reader")).read()]).is_err());
    }

    #[test]
    fn test_registration_rejects_duplicate_descriptor() {
        let mut twice = descriptors();
        twice.extend(descriptors());
        assert!(PolicySet::new(twice, []).is_err());
    }

    #[test]
    fn test_registration_rejects_filter_on_undeclared_property() {
        let err = PolicySet::new(
            descriptors(),
            [Policy::new("Project", Role::from("Reader"))
                .when(Condition::property_in("phase", ["One"]))
                .read()],
        )
        .expect_err("undeclared filter property");
        assert!(matches!(err, PrivilegeError::Misconfiguration { .. }));
    }

    #[test]
    fn test_registration_rejects_mixed_condition_kinds() {
        let err = PolicySet::new(
            descriptors(),
            [Policy::new("Project", Role::from("Reader"))
                .when(Condition::SelfRecord)
                .when(Condition::variant(["draft"]))
                .read()],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_explain_lists_contributing_policies() {
        let set = PolicySet::new(
            descriptors(),
            [
                Policy::new("Project", Role::from("Reader")).named("reader").read(),
                Policy::new("Project", Role::from("Editor"))
                    .named("editor-name")
                    .specifically("name", Permission::EDIT),
            ],
        )
        .unwrap();

        let contributions = set.explain(&ctx(&set, &["Reader", "Editor"], None), "name").unwrap();
        assert_eq!(contributions.len(), 2);
        assert!(contributions.iter().any(|c| c.policy == "reader" && c.permission == Permission::READ));
        assert!(contributions.iter().any(|c| c.policy == "editor-name" && c.permission == Permission::EDIT));
    }

    #[test]
    fn test_readable_conditions_skip_relation_only_reads() {
        let set = PolicySet::new(
            descriptors(),
            [
                Policy::new("Project", Role::from("Reader")).children("engagements", Permission::READ),
                Policy::new("Project", Role::from("Reader"))
                    .when(Condition::SelfRecord)
                    .specifically("name", Permission::READ),
            ],
        )
        .unwrap();

        let conditions = set.readable_conditions(&ctx(&set, &["Reader"], None)).unwrap();
        assert_eq!(conditions, vec![Condition::SelfRecord]);
    }

    #[test]
    fn test_unconditional_policy_applies_without_instance() {
        let set = PolicySet::new(
            descriptors(),
            [
                Policy::new("Project", Role::from("Reader")).specifically("name", Permission::READ),
                Policy::new("Project", Role::from("Reader"))
                    .when(Condition::Always)
                    .specifically("status", Permission::READ),
            ],
        )
        .unwrap();

        let map = set.execute_session(&ctx(&set, &["Reader"], None)).unwrap();
        assert_eq!(map.get("name"), Permission::READ);
        assert_eq!(map.get("status"), Permission::empty());
    }

    #[test]
    fn test_readable_conditions_group_by_kind() {
        let set = PolicySet::new(
            descriptors(),
            [
                Policy::new("Project", Role::from("Reader"))
                    .when(Condition::property_in("status", ["Active"]))
                    .read(),
                Policy::new("Project", Role::from("Reader"))
                    .when(Condition::property_in("status", ["InDevelopment"]))
                    .specifically("name", Permission::READ),
                Policy::new("Project", Role::from("Reader"))
                    .when(Condition::SelfRecord)
                    .specifically("name", Permission::EDIT),
            ],
        )
        .unwrap();

        let conditions = set.readable_conditions(&ctx(&set, &["Reader"], None)).unwrap();
        assert_eq!(
            conditions,
            vec![Condition::property_in("status", ["Active", "InDevelopment"])]
        );
    }
}
