//! Property-based tests using proptest.
//!
//! Invariants that must hold for any registered policy list.

use std::sync::Arc;

use cordon_privileges::{
    Action, Condition, Permission, PermissionMap, Policy, PolicySet, PrivilegeContext, ResourceDescriptor,
};
use cordon_types::{Instance, ResourceType, Role, Sensitivity, Session};
use proptest::prelude::*;

const PROPERTIES: [&str; 4] = ["name", "status", "budget", "mouStart"];
const ROLES: [&str; 3] = ["Translator", "Consultant", "Administrator"];
const STATUSES: [&str; 3] = ["Active", "InDevelopment", "Completed"];

/// Generated shape of one policy: (role, property mask, bits, condition).
type PolicySpec = (usize, u8, u8, Option<usize>);

fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("Project").with_properties(PROPERTIES)
}

fn build(spec: &PolicySpec) -> Policy {
    let (role, mask, bits, condition) = *spec;
    let permission = Permission::from_bits_truncate(bits);
    let mut policy = Policy::new("Project", Role::from(ROLES[role]));
    for (i, property) in PROPERTIES.iter().enumerate() {
        if mask & (1 << i) != 0 {
            policy = policy.specifically(*property, permission);
        }
    }
    match condition {
        Some(status) => policy.when(Condition::property_in("status", [STATUSES[status]])),
        None => policy,
    }
}

fn merged(specs: &[PolicySpec], roles: &[&str], status: &str) -> PermissionMap {
    let set = PolicySet::new([descriptor()], specs.iter().map(build)).unwrap();
    let ctx = PrivilegeContext::new(
        Arc::new(Session::new("u1", roles.iter().copied().map(Role::from))),
        set.descriptor(&ResourceType::from("Project")).unwrap(),
    )
    .with_instance(Arc::new(Instance::new("p1").with("status", status)));
    set.execute_session(&ctx).unwrap()
}

fn policy_spec() -> impl Strategy<Value = PolicySpec> {
    (0..ROLES.len(), any::<u8>(), 0u8..8, prop::option::of(0..STATUSES.len()))
}

fn sensitivity() -> impl Strategy<Value = Sensitivity> {
    prop::sample::select(Sensitivity::ALL.to_vec())
}

proptest! {
    // ========================================================================
    // Policy Merge
    // ========================================================================

    /// Shuffling the registered list never changes the merged map
    #[test]
    fn merge_is_order_independent(
        (specs, shuffled) in prop::collection::vec(policy_spec(), 0..12)
            .prop_flat_map(|specs| (Just(specs.clone()), Just(specs).prop_shuffle())),
        status in prop::sample::select(STATUSES.to_vec()),
    ) {
        let roles = ROLES.to_vec();
        prop_assert_eq!(merged(&specs, &roles, status), merged(&shuffled, &roles, status));
    }

    /// Multi-role sessions see exactly the OR of their single-role maps
    #[test]
    fn multi_role_is_or_of_single_roles(
        specs in prop::collection::vec(policy_spec(), 0..12),
        status in prop::sample::select(STATUSES.to_vec()),
    ) {
        let mut expected = PermissionMap::new();
        for role in ROLES {
            expected.merge(&merged(&specs, &[role], status));
        }
        prop_assert_eq!(merged(&specs, &ROLES, status), expected);
    }

    /// Properties no policy mentions stay at zero
    #[test]
    fn uncovered_properties_are_denied(
        specs in prop::collection::vec(policy_spec(), 0..12),
        status in prop::sample::select(STATUSES.to_vec()),
    ) {
        let covered: u8 = specs.iter().filter(|s| s.2 != 0).fold(0, |acc, s| acc | s.1);
        let map = merged(&specs, &ROLES, status);
        for (i, property) in PROPERTIES.iter().enumerate() {
            if covered & (1 << i) == 0 {
                prop_assert_eq!(map.get(property), Permission::empty());
            }
        }
        prop_assert_eq!(map.get("undeclared"), Permission::empty());
    }

    // ========================================================================
    // Bit Algebra
    // ========================================================================

    /// has() is exactly subset containment
    #[test]
    fn has_is_containment(value in 0u8..8, required in 0u8..8) {
        let v = Permission::from_bits_truncate(value);
        let r = Permission::from_bits_truncate(required);
        prop_assert_eq!(v.has(r), value & required == required);
    }

    /// Combining never loses bits
    #[test]
    fn combine_is_monotone(a in 0u8..8, b in 0u8..8) {
        let a = Permission::from_bits_truncate(a);
        let b = Permission::from_bits_truncate(b);
        let c = a.combine(b);
        prop_assert!(c.has(a) && c.has(b));
        prop_assert_eq!(c, b.combine(a));
    }

    // ========================================================================
    // Condition Laws
    // ========================================================================

    /// Union of sensitivity bounds admits exactly what either admits
    #[test]
    fn sensitivity_union_is_or(a in sensitivity(), b in sensitivity(), level in sensitivity()) {
        let union = Condition::union([Condition::SensitivityAtMost(a), Condition::SensitivityAtMost(b)]).unwrap();
        let intersection =
            Condition::intersect([Condition::SensitivityAtMost(a), Condition::SensitivityAtMost(b)]).unwrap();
        let ctx = PrivilegeContext::new(
            Arc::new(Session::new("u1", [Role::from("Consultant")])),
            Arc::new(descriptor()),
        );
        let instance = Instance::new("p1").with("sensitivity", level.as_str());
        let holds = |max: Sensitivity| level <= max;

        prop_assert_eq!(union.evaluate(Some(&instance), &ctx).unwrap(), holds(a) || holds(b));
        prop_assert_eq!(intersection.evaluate(Some(&instance), &ctx).unwrap(), holds(a) && holds(b));
    }

    /// Never is the identity of union and Always absorbs it
    #[test]
    fn union_identities(statuses in prop::collection::btree_set(prop::sample::select(STATUSES.to_vec()), 1..3)) {
        let cond = Condition::property_in("status", statuses.iter().copied());
        prop_assert_eq!(Condition::union([cond.clone(), Condition::Never]).unwrap(), cond.clone());
        prop_assert_eq!(Condition::union([Condition::Always, cond.clone()]).unwrap(), Condition::Always);
        prop_assert_eq!(Condition::intersect([cond.clone(), Condition::Always]).unwrap(), cond);
    }
}

#[test]
fn read_and_edit_policies_merge_to_read_and_edit() {
    let specs: Vec<PolicySpec> = vec![(0, 0b0001, 1, None), (1, 0b0001, 2, None)];
    let map = merged(&specs, &ROLES, "Active");
    assert_eq!(map.get("name"), Permission::READ_AND_EDIT);
    assert!(map.get("name").has(Permission::READ));
    assert!(map.get("name").has(Permission::EDIT));
    assert!(!Permission::READ.has(Permission::EDIT));
    assert!(!Action::Edit.required().has(Permission::READ));
}
