//! Resource privileges: the public facade over one privilege context.
//!
//! Services obtain a [`ResourcePrivileges`] for (session, resource type,
//! instance?) and use it to:
//! - Check an action ad hoc ([`ResourcePrivileges::can`])
//! - Guard a write path ([`ResourcePrivileges::verify_can`],
//!   [`ResourcePrivileges::verify_changes`])
//! - Redact an instance ([`ResourcePrivileges::secure`])
//! - Push read access down into a list query
//!   ([`ResourcePrivileges::filter_to_readable`])
//!
//! The merged permission map is computed once on construction.

use std::{collections::BTreeMap, sync::Arc};

use cordon_types::{Instance, Value};
use tracing::{debug, info, warn};

use crate::{
    context::{Dimensions, PrivilegeContext},
    edge::EdgePrivileges,
    error::{PrivilegeError, Result},
    executor::{Contribution, PolicySet},
    filter::{FilterDefaults, FilterOptions, Fragment},
    permission::{Action, PermissionMap},
    registry::{CREATE, DELETE, WHOLE_RESOURCE},
    secured::{SecuredProperty, SecuredResource},
};

/// Audit logging switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audit {
    /// Log denials (and grants, with `log_grants`).
    pub enabled: bool,
    /// Also log successful checks.
    pub log_grants: bool,
}

impl Default for Audit {
    fn default() -> Self {
        Self {
            enabled: true,
            log_grants: false,
        }
    }
}

/// Decisions for one resource type (and optionally one instance).
#[derive(Debug, Clone)]
pub struct ResourcePrivileges {
    policies: Arc<PolicySet>,
    context: PrivilegeContext,
    permissions: PermissionMap,
    audit: Audit,
    filter_defaults: Arc<FilterDefaults>,
}

impl ResourcePrivileges {
    /// Evaluates every policy for `context`.
    pub fn new(policies: Arc<PolicySet>, context: PrivilegeContext) -> Result<Self> {
        Self::with_settings(policies, context, Audit::default(), Arc::new(FilterDefaults::default()))
    }

    pub(crate) fn with_settings(
        policies: Arc<PolicySet>,
        context: PrivilegeContext,
        audit: Audit,
        filter_defaults: Arc<FilterDefaults>,
    ) -> Result<Self> {
        let permissions = policies.execute_session(&context)?;
        Ok(Self {
            policies,
            context,
            permissions,
            audit,
            filter_defaults,
        })
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit.enabled = false;
        self
    }

    pub(crate) fn audit_enabled(&self) -> bool {
        self.audit.enabled
    }

    pub fn context(&self) -> &PrivilegeContext {
        &self.context
    }

    /// The merged permission map.
    pub fn permissions(&self) -> &PermissionMap {
        &self.permissions
    }

    /// Returns whether the session may perform `action`.
    ///
    /// Read and edit check `property`, or the whole resource when `None`.
    /// Create and delete always check their pseudo-property.
    pub fn can(&self, action: Action, property: Option<&str>) -> bool {
        self.permissions
            .get(checked_key(action, property))
            .has(action.required())
    }

    /// Like [`ResourcePrivileges::can`], failing with
    /// [`PrivilegeError::Unauthorized`].
    pub fn verify_can(&self, action: Action, property: Option<&str>) -> Result<()> {
        let allowed = self.can(action, property);
        let property = match action {
            Action::Read | Action::Edit => property,
            Action::Create | Action::Delete => None,
        };

        if self.audit.enabled {
            if !allowed {
                warn!(
                    actor = %self.context.session().actor(),
                    resource_type = %self.context.resource_type(),
                    action = action.as_str(),
                    property = ?property,
                    "Privilege check denied"
                );
            } else if self.audit.log_grants {
                info!(
                    actor = %self.context.session().actor(),
                    resource_type = %self.context.resource_type(),
                    action = action.as_str(),
                    property = ?property,
                    "Privilege check granted"
                );
            }
        }

        if allowed {
            Ok(())
        } else {
            Err(self.unauthorized(action, property))
        }
    }

    /// Verifies `edit` on every key whose value differs from the instance.
    ///
    /// Unchanged keys are never checked. The error names the first failing
    /// key in key order.
    pub fn verify_changes(&self, changes: &BTreeMap<String, Value>) -> Result<()> {
        let current = self.context.instance();
        let denied: Vec<&str> = changes
            .iter()
            .filter(|(key, value)| current.and_then(|i| i.get(key)) != Some(*value))
            .map(|(key, _)| key.as_str())
            .filter(|key| !self.can(Action::Edit, Some(*key)))
            .collect();

        let Some(first) = denied.first() else {
            if self.audit.enabled && self.audit.log_grants {
                info!(
                    actor = %self.context.session().actor(),
                    resource_type = %self.context.resource_type(),
                    changed = changes.len(),
                    "Changes verified"
                );
            }
            return Ok(());
        };

        if self.audit.enabled {
            warn!(
                actor = %self.context.session().actor(),
                resource_type = %self.context.resource_type(),
                denied = ?denied,
                "Changes rejected"
            );
        }
        Err(self.unauthorized(Action::Edit, Some(*first)))
    }

    /// Redacted view of `instance` with per-property flags.
    pub fn secure(&self, instance: &Instance) -> Result<SecuredResource> {
        let scoped = self.for_instance(instance.clone())?;
        let properties = self
            .context
            .resource()
            .properties()
            .map(|property| {
                let secured = SecuredProperty::new(
                    instance.get(property),
                    scoped.can(Action::Read, Some(property)),
                    scoped.can(Action::Edit, Some(property)),
                );
                (property.to_string(), secured)
            })
            .collect();

        Ok(SecuredResource {
            resource_type: self.context.resource_type().clone(),
            id: instance.id.clone(),
            properties,
            can_create: scoped.can(Action::Create, None),
            can_delete: scoped.can(Action::Delete, None),
        })
    }

    /// Re-evaluates with `extra` merged over the current dimensions.
    pub fn for_context(&self, extra: &Dimensions) -> Result<Self> {
        self.rescoped(self.context.for_context(extra))
    }

    /// Re-evaluates against `instance`.
    pub fn for_instance(&self, instance: Instance) -> Result<Self> {
        self.rescoped(self.context.with_instance(Arc::new(instance)))
    }

    fn rescoped(&self, context: PrivilegeContext) -> Result<Self> {
        Self::with_settings(
            Arc::clone(&self.policies),
            context,
            self.audit,
            Arc::clone(&self.filter_defaults),
        )
    }

    /// Compiles the session's read access into one backend-native fragment.
    ///
    /// The fragment is the disjunction of the conditions of every
    /// Read-granting policy, after unioning same-kind conditions. An actor
    /// with no such policy gets `false`.
    pub fn filter_to_readable(&self, options: &FilterOptions) -> Result<Fragment> {
        let backend = options.backend.unwrap_or(self.filter_defaults.backend);
        let mut bindings = options
            .bindings
            .clone()
            .unwrap_or_else(|| self.filter_defaults.bindings_for(backend));
        if let Some(scope) = &options.scope {
            bindings = bindings.with_scope(scope.clone());
        }

        let conditions = self.policies.readable_conditions(&self.context)?;
        let fragment = Fragment::any(
            backend,
            conditions
                .iter()
                .map(|condition| condition.compile_for(backend, &bindings, &self.context)),
        );

        if fragment.is_stub() {
            warn!(
                resource_type = %self.context.resource_type(),
                backend = %backend,
                "Read filter contains a fail-closed stub; matching rows are excluded"
            );
        }

        let fragment = match &options.wrap_context {
            Some(wrap) => wrap(fragment),
            None => fragment,
        };
        debug!(
            resource_type = %self.context.resource_type(),
            backend = %backend,
            fragment = %fragment,
            "Compiled read filter"
        );
        Ok(fragment)
    }

    /// Policies contributing to `property` (or the whole resource).
    pub fn explain(&self, property: Option<&str>) -> Result<Vec<Contribution>> {
        self.policies
            .explain(&self.context, property.unwrap_or(WHOLE_RESOURCE))
    }

    /// Privileges on one of this resource's child-list relations.
    pub fn for_edge(&self, relation: &str) -> Result<EdgePrivileges> {
        EdgePrivileges::new(self.clone(), relation)
    }

    fn unauthorized(&self, action: Action, property: Option<&str>) -> PrivilegeError {
        PrivilegeError::Unauthorized {
            action: action.as_str(),
            resource_type: self.context.resource_type().clone(),
            property: property.map(str::to_string),
        }
    }
}

fn checked_key(action: Action, property: Option<&str>) -> &str {
    match action {
        Action::Read | Action::Edit => property.unwrap_or(WHOLE_RESOURCE),
        Action::Create => CREATE,
        Action::Delete => DELETE,
    }
}
