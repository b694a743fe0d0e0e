//! Policy conditions.
//!
//! A condition narrows a policy to the instances it holds for. Every case
//! can be evaluated in-memory against a loaded instance and compiled into a
//! filter fragment for each backend, and combines with peers of its own
//! kind through [`Condition::union`] and [`Condition::intersect`].
//!
//! `Always` and `Never` are the identity/absorbing elements of both folds
//! and combine with every kind.

mod cypher;
mod edgeql;

use std::{collections::BTreeSet, fmt};

use cordon_types::{Instance, Role, Sensitivity};
use serde::{Deserialize, Serialize};

use crate::{
    context::{self, PrivilegeContext},
    error::{PrivilegeError, Result},
    filter::{Backend, Bindings, Fragment},
};

/// Instance property holding the active variant when no dimension is set.
const VARIANT_PROPERTY: &str = "variant";

/// Instance property holding the own sensitivity when no dimension is set.
const SENSITIVITY_PROPERTY: &str = "sensitivity";

/// Instance property holding scope roles when no dimension is set.
const SCOPE_ROLES_PROPERTY: &str = "scopeRoles";

/// A predicate over an instance plus its privilege context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Always holds.
    Always,
    /// Never holds.
    Never,
    /// The instance is the acting user's own record.
    SelfRecord,
    /// The instance belongs to the acting user. Only ever holds on the
    /// user-like resource type.
    Owner,
    /// A string property of the instance is one of `values`.
    PropertyIn {
        property: String,
        values: BTreeSet<String>,
    },
    /// The active variant is one of the listed keys.
    Variant(BTreeSet<String>),
    /// The effective sensitivity is at or below the level.
    SensitivityAtMost(Sensitivity),
    /// The actor holds roles on the scoping ancestor satisfying every
    /// clause; a clause is satisfied by holding any one of its roles.
    ///
    /// No clauses always holds; an empty clause never does.
    RoleInScope(Vec<BTreeSet<Role>>),
}

/// Discriminant used to group conditions and report mismatches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionKind {
    Always,
    Never,
    SelfRecord,
    Owner,
    PropertyIn(String),
    Variant,
    SensitivityAtMost,
    RoleInScope,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Always => f.write_str("always"),
            ConditionKind::Never => f.write_str("never"),
            ConditionKind::SelfRecord => f.write_str("self"),
            ConditionKind::Owner => f.write_str("owner"),
            ConditionKind::PropertyIn(property) => write!(f, "property-in({property})"),
            ConditionKind::Variant => f.write_str("variant"),
            ConditionKind::SensitivityAtMost => f.write_str("sensitivity-at-most"),
            ConditionKind::RoleInScope => f.write_str("role-in-scope"),
        }
    }
}

impl Condition {
    /// `property ∈ values`
    pub fn property_in<I, S>(property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::PropertyIn {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Active variant is one of `variants`.
    pub fn variant<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::Variant(variants.into_iter().map(Into::into).collect())
    }

    /// Actor holds any of `roles` on the scoping ancestor.
    pub fn role_in_scope(roles: impl IntoIterator<Item = Role>) -> Self {
        Condition::RoleInScope(vec![roles.into_iter().collect()])
    }

    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::Always => ConditionKind::Always,
            Condition::Never => ConditionKind::Never,
            Condition::SelfRecord => ConditionKind::SelfRecord,
            Condition::Owner => ConditionKind::Owner,
            Condition::PropertyIn { property, .. } => ConditionKind::PropertyIn(property.clone()),
            Condition::Variant(_) => ConditionKind::Variant,
            Condition::SensitivityAtMost(_) => ConditionKind::SensitivityAtMost,
            Condition::RoleInScope(_) => ConditionKind::RoleInScope,
        }
    }

    /// Evaluates the condition in-memory.
    ///
    /// Dimension-backed cases (variant, sensitivity, scope roles) read the
    /// context first and fall back to the instance. Raises
    /// [`PrivilegeError::MissingContext`] when neither is available.
    pub fn evaluate(&self, instance: Option<&Instance>, ctx: &PrivilegeContext) -> Result<bool> {
        let dims = ctx.dimensions();
        match self {
            Condition::Always => Ok(true),
            Condition::Never => Ok(false),
            Condition::SelfRecord => {
                let instance = self.require(instance)?;
                Ok(instance.id == *ctx.session().actor())
            }
            Condition::Owner => {
                let instance = self.require(instance)?;
                Ok(ctx.resource().is_user_like() && instance.id == *ctx.session().actor())
            }
            Condition::PropertyIn { property, values } => {
                let instance = self.require(instance)?;
                Ok(instance
                    .get_str(property)
                    .is_some_and(|value| values.contains(value)))
            }
            Condition::Variant(allowed) => {
                let active = match dims.variant() {
                    Some(variant) => Some(variant),
                    None => self.require(instance)?.get_str(VARIANT_PROPERTY),
                };
                Ok(active.is_some_and(|variant| allowed.contains(variant)))
            }
            Condition::SensitivityAtMost(max) => {
                let effective = match dims.sensitivity() {
                    Some(sensitivity) => sensitivity,
                    None => self
                        .require(instance)?
                        .get_str(SENSITIVITY_PROPERTY)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_default(),
                };
                Ok(effective <= *max)
            }
            Condition::RoleInScope(clauses) => {
                let held = match dims.scope_roles() {
                    Some(roles) => roles,
                    None => self
                        .require(instance)?
                        .get(SCOPE_ROLES_PROPERTY)
                        .map(context::roles_from_value)
                        .unwrap_or_default(),
                };
                Ok(clauses
                    .iter()
                    .all(|clause| clause.iter().any(|role| held.contains(role))))
            }
        }
    }

    fn require<'a>(&self, instance: Option<&'a Instance>) -> Result<&'a Instance> {
        instance.ok_or_else(|| PrivilegeError::MissingContext {
            condition: self.kind().to_string(),
        })
    }

    /// Compiles the condition into a fragment for `backend`.
    ///
    /// Cases without a translation compile to a fail-closed stub.
    pub fn compile_for(&self, backend: Backend, bindings: &Bindings, ctx: &PrivilegeContext) -> Fragment {
        match backend {
            Backend::Cypher => cypher::compile(self, bindings, ctx),
            Backend::EdgeQl => edgeql::compile(self, bindings, ctx),
        }
    }

    /// Logical OR of same-kind conditions. Empty input is `Never`.
    pub fn union(conditions: impl IntoIterator<Item = Condition>) -> Result<Condition> {
        conditions
            .into_iter()
            .try_fold(Condition::Never, Condition::union_pair)
    }

    /// Logical AND of same-kind conditions. Empty input is `Always`.
    pub fn intersect(conditions: impl IntoIterator<Item = Condition>) -> Result<Condition> {
        conditions
            .into_iter()
            .try_fold(Condition::Always, Condition::intersect_pair)
    }

    fn union_pair(self, other: Condition) -> Result<Condition> {
        Ok(match (self, other) {
            (Condition::Always, _) | (_, Condition::Always) => Condition::Always,
            (Condition::Never, c) | (c, Condition::Never) => c,
            (Condition::SelfRecord, Condition::SelfRecord) => Condition::SelfRecord,
            (Condition::Owner, Condition::Owner) => Condition::Owner,
            (
                Condition::PropertyIn { property, mut values },
                Condition::PropertyIn {
                    property: other_property,
                    values: other_values,
                },
            ) if property == other_property => {
                values.extend(other_values);
                Condition::PropertyIn { property, values }
            }
            (Condition::Variant(mut a), Condition::Variant(b)) => {
                a.extend(b);
                Condition::Variant(a)
            }
            (Condition::SensitivityAtMost(a), Condition::SensitivityAtMost(b)) => {
                Condition::SensitivityAtMost(a.max(b))
            }
            (Condition::RoleInScope(a), Condition::RoleInScope(b)) => {
                // (a1 ∧ a2) ∨ (b1) = (a1 ∨ b1) ∧ (a2 ∨ b1)
                let mut clauses: Vec<BTreeSet<Role>> = Vec::with_capacity(a.len() * b.len());
                for left in &a {
                    for right in &b {
                        let clause: BTreeSet<Role> = left.union(right).cloned().collect();
                        if !clauses.contains(&clause) {
                            clauses.push(clause);
                        }
                    }
                }
                Condition::RoleInScope(clauses)
            }
            (a, b) => return Err(incompatible("union", &a, &b)),
        })
    }

    fn intersect_pair(self, other: Condition) -> Result<Condition> {
        Ok(match (self, other) {
            (Condition::Never, _) | (_, Condition::Never) => Condition::Never,
            (Condition::Always, c) | (c, Condition::Always) => c,
            (Condition::SelfRecord, Condition::SelfRecord) => Condition::SelfRecord,
            (Condition::Owner, Condition::Owner) => Condition::Owner,
            (
                Condition::PropertyIn { property, values },
                Condition::PropertyIn {
                    property: other_property,
                    values: other_values,
                },
            ) if property == other_property => Condition::PropertyIn {
                values: values.intersection(&other_values).cloned().collect(),
                property,
            },
            (Condition::Variant(a), Condition::Variant(b)) => {
                Condition::Variant(a.intersection(&b).cloned().collect())
            }
            (Condition::SensitivityAtMost(a), Condition::SensitivityAtMost(b)) => {
                Condition::SensitivityAtMost(a.min(b))
            }
            (Condition::RoleInScope(mut a), Condition::RoleInScope(b)) => {
                for clause in b {
                    if !a.contains(&clause) {
                        a.push(clause);
                    }
                }
                Condition::RoleInScope(a)
            }
            (a, b) => return Err(incompatible("intersect", &a, &b)),
        })
    }
}

fn incompatible(operation: &str, a: &Condition, b: &Condition) -> PrivilegeError {
    PrivilegeError::misconfigured(format!(
        "cannot {operation} conditions of different kinds: {} and {}",
        a.kind(),
        b.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Dimensions, SCOPE_ROLES, SENSITIVITY, VARIANT};
    use crate::registry::ResourceDescriptor;
    use cordon_types::Session;
    use std::sync::Arc;

    fn ctx(resource: ResourceDescriptor) -> PrivilegeContext {
        PrivilegeContext::new(
            Arc::new(Session::new("u1", [Role::from("Translator")])),
            Arc::new(resource),
        )
    }

    fn project_ctx() -> PrivilegeContext {
        ctx(ResourceDescriptor::new("Project"))
    }

    fn user_ctx() -> PrivilegeContext {
        ctx(ResourceDescriptor::new("User").user_like())
    }

    fn roles(names: &[&str]) -> BTreeSet<Role> {
        names.iter().copied().map(Role::from).collect()
    }

    #[test]
    fn test_self_requires_instance() {
        let err = Condition::SelfRecord
            .evaluate(None, &project_ctx())
            .expect_err("no instance");
        assert!(matches!(err, PrivilegeError::MissingContext { ref condition } if condition == "self"));
    }

    #[test]
    fn test_self_matches_actor_id() {
        let ctx = project_ctx();
        assert!(Condition::SelfRecord.evaluate(Some(&Instance::new("u1")), &ctx).unwrap());
        assert!(!Condition::SelfRecord.evaluate(Some(&Instance::new("u2")), &ctx).unwrap());
    }

    #[test]
    fn test_owner_only_on_user_like_type() {
        let me = Instance::new("u1");
        assert!(Condition::Owner.evaluate(Some(&me), &user_ctx()).unwrap());
        assert!(!Condition::Owner.evaluate(Some(&me), &project_ctx()).unwrap());
        assert!(!Condition::Owner.evaluate(Some(&Instance::new("u2")), &user_ctx()).unwrap());
    }

    #[test]
    fn test_property_in() {
        let cond = Condition::property_in("status", ["InDevelopment"]);
        let ctx = project_ctx();
        let dev = Instance::new("p1").with("status", "InDevelopment");
        let active = Instance::new("p1").with("status", "Active");
        let missing = Instance::new("p1");

        assert!(cond.evaluate(Some(&dev), &ctx).unwrap());
        assert!(!cond.evaluate(Some(&active), &ctx).unwrap());
        assert!(!cond.evaluate(Some(&missing), &ctx).unwrap());
    }

    #[test]
    fn test_variant_prefers_dimension() {
        let cond = Condition::variant(["draft"]);
        let instance = Instance::new("r1").with("variant", "fpm");
        let ctx = project_ctx();

        assert!(!cond.evaluate(Some(&instance), &ctx).unwrap());

        let scoped = ctx.for_context(&Dimensions::new().with(VARIANT, "draft"));
        assert!(cond.evaluate(Some(&instance), &scoped).unwrap());
        // Dimension alone is enough
        assert!(cond.evaluate(None, &scoped).unwrap());
    }

    #[test]
    fn test_sensitivity_defaults_to_high() {
        let cond = Condition::SensitivityAtMost(Sensitivity::Medium);
        let ctx = project_ctx();

        assert!(!cond.evaluate(Some(&Instance::new("p1")), &ctx).unwrap());
        assert!(cond
            .evaluate(Some(&Instance::new("p1").with("sensitivity", "Low")), &ctx)
            .unwrap());
        assert!(cond.evaluate(None, &project_ctx()).is_err());

        let inherited = ctx.for_context(&Dimensions::new().with(SENSITIVITY, "Medium"));
        assert!(cond.evaluate(None, &inherited).unwrap());
    }

    #[test]
    fn test_role_in_scope_clauses() {
        let cond = Condition::intersect([
            Condition::role_in_scope(roles(&["ProjectManager", "RegionalDirector"])),
            Condition::role_in_scope(roles(&["Consultant"])),
        ])
        .unwrap();

        let only_pm = project_ctx().for_context(
            &Dimensions::new().with(SCOPE_ROLES, serde_json::json!(["ProjectManager"])),
        );
        let both = project_ctx().for_context(
            &Dimensions::new().with(SCOPE_ROLES, serde_json::json!(["RegionalDirector", "Consultant"])),
        );

        assert!(!cond.evaluate(None, &only_pm).unwrap());
        assert!(cond.evaluate(None, &both).unwrap());
    }

    #[test]
    fn test_role_in_scope_reads_instance_fallback() {
        let cond = Condition::role_in_scope(roles(&["Translator"]));
        let instance = Instance::new("e1").with("scopeRoles", serde_json::json!(["Translator"]));
        assert!(cond.evaluate(Some(&instance), &project_ctx()).unwrap());
        assert!(!cond.evaluate(Some(&Instance::new("e1")), &project_ctx()).unwrap());
    }

    #[test]
    fn test_union_identities() {
        assert_eq!(Condition::union([]).unwrap(), Condition::Never);
        assert_eq!(Condition::intersect([]).unwrap(), Condition::Always);
        assert_eq!(
            Condition::union([Condition::SelfRecord, Condition::Never]).unwrap(),
            Condition::SelfRecord
        );
        assert_eq!(
            Condition::union([Condition::SelfRecord, Condition::Always]).unwrap(),
            Condition::Always
        );
        assert_eq!(
            Condition::intersect([Condition::Owner, Condition::Always]).unwrap(),
            Condition::Owner
        );
        assert_eq!(
            Condition::intersect([Condition::Owner, Condition::Never]).unwrap(),
            Condition::Never
        );
    }

    #[test]
    fn test_union_sensitivity_takes_max() {
        let merged = Condition::union([
            Condition::SensitivityAtMost(Sensitivity::Low),
            Condition::SensitivityAtMost(Sensitivity::Medium),
        ])
        .unwrap();
        assert_eq!(merged, Condition::SensitivityAtMost(Sensitivity::Medium));

        let narrowed = Condition::intersect([
            Condition::SensitivityAtMost(Sensitivity::Low),
            Condition::SensitivityAtMost(Sensitivity::Medium),
        ])
        .unwrap();
        assert_eq!(narrowed, Condition::SensitivityAtMost(Sensitivity::Low));
    }

    #[test]
    fn test_union_variants() {
        let merged = Condition::union([Condition::variant(["draft"]), Condition::variant(["fpm"])]).unwrap();
        assert_eq!(merged, Condition::variant(["draft", "fpm"]));

        let narrowed =
            Condition::intersect([Condition::variant(["draft", "fpm"]), Condition::variant(["fpm"])]).unwrap();
        assert_eq!(narrowed, Condition::variant(["fpm"]));
    }

    #[test]
    fn test_union_role_in_scope_distributes() {
        let a = Condition::RoleInScope(vec![roles(&["A"]), roles(&["B"])]);
        let b = Condition::role_in_scope(roles(&["C"]));
        let merged = Condition::union([a, b]).unwrap();
        assert_eq!(
            merged,
            Condition::RoleInScope(vec![roles(&["A", "C"]), roles(&["B", "C"])])
        );
    }

    #[test]
    fn test_union_property_in_same_property_only() {
        let merged = Condition::union([
            Condition::property_in("status", ["Active"]),
            Condition::property_in("status", ["InDevelopment"]),
        ])
        .unwrap();
        assert_eq!(merged, Condition::property_in("status", ["Active", "InDevelopment"]));

        let err = Condition::union([
            Condition::property_in("status", ["Active"]),
            Condition::property_in("step", ["Active"]),
        ])
        .expect_err("different properties");
        assert!(matches!(err, PrivilegeError::Misconfiguration { .. }));
    }

    #[test]
    fn test_mixed_kinds_are_misconfiguration() {
        let err = Condition::union([Condition::SelfRecord, Condition::variant(["draft"])])
            .expect_err("mixed kinds");
        assert_eq!(
            err.to_string(),
            "Privilege misconfiguration: cannot union conditions of different kinds: self and variant"
        );
        assert!(Condition::intersect([Condition::Owner, Condition::SensitivityAtMost(Sensitivity::Low)]).is_err());
    }
}
