//! Entry point services hold for the lifetime of the process.

use std::sync::Arc;

use cordon_types::{Instance, ResourceType, Session};

use crate::{
    context::PrivilegeContext,
    edge::EdgePrivileges,
    error::Result,
    executor::PolicySet,
    filter::{Backend, Bindings, FilterDefaults},
    resource::{Audit, ResourcePrivileges},
};

/// Shared handle producing per-check privilege facades.
#[derive(Debug, Clone)]
pub struct Privileges {
    policies: Arc<PolicySet>,
    audit: Audit,
    filter_defaults: Arc<FilterDefaults>,
}

impl Privileges {
    pub fn new(policies: PolicySet) -> Self {
        Self::from_shared(Arc::new(policies))
    }

    pub fn from_shared(policies: Arc<PolicySet>) -> Self {
        Self {
            policies,
            audit: Audit::default(),
            filter_defaults: Arc::new(FilterDefaults::default()),
        }
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit.enabled = false;
        self
    }

    pub fn with_audit(mut self, audit: Audit) -> Self {
        self.audit = audit;
        self
    }

    /// Backend used when filter options leave it unset.
    pub fn with_default_backend(mut self, backend: Backend) -> Self {
        Arc::make_mut(&mut self.filter_defaults).backend = backend;
        self
    }

    /// Overrides the variable bindings for `backend`.
    pub fn with_bindings(mut self, backend: Backend, bindings: Bindings) -> Self {
        Arc::make_mut(&mut self.filter_defaults)
            .bindings
            .insert(backend, bindings);
        self
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Privileges of `session` on `resource_type`, optionally for one
    /// loaded instance.
    pub fn for_resource(
        &self,
        session: impl Into<Arc<Session>>,
        resource_type: &ResourceType,
        instance: Option<Instance>,
    ) -> Result<ResourcePrivileges> {
        let descriptor = self.policies.descriptor(resource_type)?;
        let mut context = PrivilegeContext::new(session.into(), descriptor);
        if let Some(instance) = instance {
            context = context.with_instance(Arc::new(instance));
        }
        ResourcePrivileges::with_settings(
            Arc::clone(&self.policies),
            context,
            self.audit,
            Arc::clone(&self.filter_defaults),
        )
    }

    /// Privileges of `session` on `parent_type.relation`, optionally for
    /// one loaded parent.
    pub fn for_edge(
        &self,
        session: impl Into<Arc<Session>>,
        parent_type: &ResourceType,
        relation: &str,
        parent: Option<Instance>,
    ) -> Result<EdgePrivileges> {
        self.for_resource(session, parent_type, parent)?
            .for_edge(relation)
    }
}
