//! Privileges on a parent's child-list relation.
//!
//! Whether an actor may see or add to `Project.engagements` as a whole is
//! decided by the parent's policies for the relation key, independent of
//! what any single engagement's own policies say.

use cordon_types::{Instance, ResourceType};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{PrivilegeError, Result},
    permission::Permission,
    resource::ResourcePrivileges,
};

/// An action on a whole child list.
///
/// Checked on the parent's relation key. Creating a child needs EDIT on that
/// key, unlike [`crate::Action::Create`], which needs DELETE on `@create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildListAction {
    Read,
    Create,
    Delete,
}

impl ChildListAction {
    /// Bit required on the relation key.
    pub fn required(self) -> Permission {
        match self {
            ChildListAction::Read => Permission::READ,
            ChildListAction::Create => Permission::EDIT,
            ChildListAction::Delete => Permission::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChildListAction::Read => "read",
            ChildListAction::Create => "create",
            ChildListAction::Delete => "delete",
        }
    }
}

/// Privileges scoped to one relation of a parent resource.
#[derive(Debug, Clone)]
pub struct EdgePrivileges {
    parent: ResourcePrivileges,
    relation: String,
}

impl EdgePrivileges {
    pub(crate) fn new(parent: ResourcePrivileges, relation: &str) -> Result<Self> {
        let descriptor = parent.context().resource();
        if !descriptor.has_relation(relation) {
            return Err(PrivilegeError::misconfigured(format!(
                "{} has no child list {relation}",
                descriptor.name()
            )));
        }
        Ok(Self {
            parent,
            relation: relation.to_string(),
        })
    }

    pub fn parent_type(&self) -> &ResourceType {
        self.parent.context().resource_type()
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn can(&self, action: ChildListAction) -> bool {
        self.parent
            .permissions()
            .get(&self.relation)
            .has(action.required())
    }

    /// Like [`EdgePrivileges::can`], failing with
    /// [`PrivilegeError::Unauthorized`] naming the relation.
    pub fn verify_can(&self, action: ChildListAction) -> Result<()> {
        if self.can(action) {
            return Ok(());
        }
        if self.parent.audit_enabled() {
            warn!(
                actor = %self.parent.context().session().actor(),
                resource_type = %self.parent_type(),
                relation = %self.relation,
                action = action.as_str(),
                "Child list check denied"
            );
        }
        Err(PrivilegeError::Unauthorized {
            action: action.as_str(),
            resource_type: self.parent_type().clone(),
            property: Some(self.relation.clone()),
        })
    }

    /// Re-evaluates with `parent` as the evaluation instance.
    pub fn for_context(&self, parent: Instance) -> Result<Self> {
        Ok(Self {
            parent: self.parent.for_instance(parent)?,
            relation: self.relation.clone(),
        })
    }
}
