//! EdgeQL translations.

use cordon_types::{Role, Sensitivity};
use tracing::warn;

use super::{Condition, SCOPE_ROLES_PROPERTY, SENSITIVITY_PROPERTY};
use crate::{
    context::PrivilegeContext,
    filter::{Backend, Bindings, Fragment},
};

const BACKEND: Backend = Backend::EdgeQl;

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
            in_set(&bindings.row_path(property), values.iter().map(String::as_str))
        }
        Condition::Variant(allowed) => match ctx.dimensions().variant() {
            Some(active) => Fragment::constant(BACKEND, allowed.contains(active)),
            // Variants live on link properties of the response type, which
            // have no agreed binding in this dialect.
            None => {
                warn!(
                    resource_type = %ctx.resource_type(),
                    backend = %BACKEND,
                    condition = %condition.kind(),
                    "no filter translation; compiling fail-closed stub"
                );
                Fragment::stub(BACKEND)
            }
        },
        Condition::SensitivityAtMost(max) => match ctx.dimensions().sensitivity() {
            Some(effective) => Fragment::constant(BACKEND, effective <= *max),
            None if *max == Sensitivity::High => Fragment::constant(BACKEND, true),
            None => Fragment::new(
                BACKEND,
                format!(
                    "{} <= Sensitivity.{}",
                    bindings.scope_path(SENSITIVITY_PROPERTY),
                    max.as_str()
                ),
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
                    Fragment::new(
                        BACKEND,
                        format!(
                            "exists (select {members} filter .user.id = {actor} \
                             and exists (.{SCOPE_ROLES_PROPERTY} intersect {roles}))",
                            members = bindings.scope_path("members"),
                            actor = bindings.actor,
                            roles = set(clause.iter().map(Role::as_str)),
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

fn in_set<'a>(path: &str, values: impl Iterator<Item = &'a str>) -> Fragment {
    let values: Vec<&str> = values.collect();
    if values.is_empty() {
        return Fragment::constant(BACKEND, false);
    }
    Fragment::new(BACKEND, format!("{path} in {}", set(values.into_iter())))
}

fn set<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values.map(|v| BACKEND.quote(v)).collect();
    format!("{{{}}}", quoted.join(", "))
}
