//! Cypher translations.

use cordon_types::{Role, Sensitivity};

use super::{Condition, SCOPE_ROLES_PROPERTY, SENSITIVITY_PROPERTY, VARIANT_PROPERTY};
use crate::{
    context::PrivilegeContext,
    filter::{Backend, Bindings, Fragment},
};

const BACKEND: Backend = Backend::Cypher;

pub(super) fn compile(condition: &Condition, bindings: &Bindings, ctx: &PrivilegeContext) -> Fragment {
    match condition {
        Condition::Always => Fragment::constant(BACKEND, true),
        Condition::Never => Fragment::constant(BACKEND, false),
        Condition::SelfRecord => self_record(bindings),
        Condition::Owner => {
            if ctx.resource().is_user_like() {
                self_record(bindings)
            } else {
                Fragment::constant(BACKEND, false)
            }
        }
        Condition::PropertyIn { property, values } => {
            in_list(&bindings.row_path(property), values.iter().map(String::as_str))
        }
        Condition::Variant(allowed) => match ctx.dimensions().variant() {
            Some(active) => Fragment::constant(BACKEND, allowed.contains(active)),
            None => in_list(
                &bindings.row_path(VARIANT_PROPERTY),
                allowed.iter().map(String::as_str),
            ),
        },
        Condition::SensitivityAtMost(max) => match ctx.dimensions().sensitivity() {
            Some(effective) => Fragment::constant(BACKEND, effective <= *max),
            // A missing sensitivity counts as High, which every row satisfies here
            None if *max == Sensitivity::High => Fragment::constant(BACKEND, true),
            None => in_list(
                &bindings.scope_path(SENSITIVITY_PROPERTY),
                max.at_most().map(Sensitivity::as_str),
            ),
        },
        Condition::RoleInScope(clauses) => match ctx.dimensions().scope_roles() {
            Some(held) => Fragment::constant(
                BACKEND,
                clauses.iter().all(|c| c.iter().any(|r| held.contains(r))),
            ),
            None => Fragment::all(
                BACKEND,
                clauses.iter().map(|clause| {
                    if clause.is_empty() {
                        return Fragment::constant(BACKEND, false);
                    }
                    let roles = list(clause.iter().map(Role::as_str));
                    Fragment::new(
                        BACKEND,
                        format!(
                            "EXISTS {{ MATCH ({scope})-[:member]->(membership:ProjectMember)\
                             -[:user]->(:User {{ id: {actor} }}) \
                             WHERE any(role IN membership.{SCOPE_ROLES_PROPERTY} WHERE role IN {roles}) }}",
                            scope = bindings.scope_var(),
                            actor = bindings.actor,
                        ),
                    )
                }),
            ),
        },
    }
}

fn self_record(bindings: &Bindings) -> Fragment {
    Fragment::new(BACKEND, format!("{} = {}", bindings.row_path("id"), bindings.actor))
}

fn in_list<'a>(path: &str, values: impl Iterator<Item = &'a str>) -> Fragment {
    let values: Vec<&str> = values.collect();
    if values.is_empty() {
        return Fragment::constant(BACKEND, false);
    }
    Fragment::new(BACKEND, format!("{path} IN {}", list(values.into_iter())))
}

fn list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values.map(|v| BACKEND.quote(v)).collect();
    format!("[{}]", quoted.join(", "))
}
