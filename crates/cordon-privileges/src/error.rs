//! Error types for privilege evaluation.

use cordon_types::ResourceType;
use thiserror::Error;

/// Error type for privilege checks and policy registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrivilegeError {
    /// A condition needed an instance and none was supplied.
    ///
    /// This is a wiring defect: callers without an instance must use
    /// backend filter compilation instead.
    #[error("Condition '{condition}' requires an instance but none was supplied")]
    MissingContext { condition: String },

    /// The actor may not perform the action.
    #[error("{}", unauthorized_message(action, resource_type, property.as_deref()))]
    Unauthorized {
        action: &'static str,
        resource_type: ResourceType,
        property: Option<String>,
    },

    /// Policies or resources were registered inconsistently.
    #[error("Privilege misconfiguration: {reason}")]
    Misconfiguration { reason: String },
}

impl PrivilegeError {
    pub(crate) fn misconfigured(reason: impl Into<String>) -> Self {
        PrivilegeError::Misconfiguration {
            reason: reason.into(),
        }
    }

    /// Returns whether this error should be surfaced to the end user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, PrivilegeError::Unauthorized { .. })
    }
}

fn unauthorized_message(action: &str, resource_type: &ResourceType, property: Option<&str>) -> String {
    match property {
        Some(property) => format!("You do not have permission to {action} {resource_type}.{property}"),
        None => format!("You do not have permission to {action} this {resource_type}"),
    }
}

/// Result type for privilege operations.
pub type Result<T> = std::result::Result<T, PrivilegeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message_names_property() {
        let err = PrivilegeError::Unauthorized {
            action: "edit",
            resource_type: ResourceType::from("Project"),
            property: Some("budget".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "You do not have permission to edit Project.budget"
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_unauthorized_message_whole_resource() {
        let err = PrivilegeError::Unauthorized {
            action: "delete",
            resource_type: ResourceType::from("Project"),
            property: None,
        };
        assert_eq!(
            err.to_string(),
            "You do not have permission to delete this Project"
        );
    }

    #[test]
    fn test_misconfiguration_not_user_facing() {
        assert!(!PrivilegeError::misconfigured("bad").is_user_facing());
    }
}
