//! # cordon-privileges: Secured-property authorization
//!
//! Decides, per authenticated actor, what may be done with every property
//! of every resource instance:
//! - **Property-level permissions** (Read, Edit, Delete bits per property)
//! - **Conditional policies** (self, owner, status, variant, sensitivity,
//!   role on a scoping ancestor)
//! - **Redaction** of loaded instances into secured views
//! - **Filter pushdown** compiled for the Cypher and EdgeQL backends
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Session + Resource Type (+ Instance)        │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PolicySet                                   │
//! │  ├─ Match (type, role) per held role         │
//! │  ├─ Evaluate conditions                      │
//! │  └─ OR-merge property → Permission           │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  ResourcePrivileges / EdgePrivileges         │
//! │  - can / verify_can / verify_changes         │
//! │  - secure → SecuredResource                  │
//! │  - filter_to_readable → Fragment             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ```
//! use cordon_privileges::{Action, Condition, Permission, Policy, PolicySet, Privileges, ResourceDescriptor};
//! use cordon_types::{Instance, ResourceType, Role, Session};
//!
//! let policies = PolicySet::new(
//!     [ResourceDescriptor::new("Project").with_properties(["name", "budget"])],
//!     [
//!         Policy::new("Project", Role::from("Translator"))
//!             .specifically("name", Permission::READ_AND_EDIT),
//!         Policy::new("Project", Role::from("Administrator"))
//!             .when(Condition::property_in("status", ["InDevelopment"]))
//!             .read(),
//!     ],
//! )?;
//! let privileges = Privileges::new(policies);
//!
//! let session = Session::new("u1", [Role::from("Translator")]);
//! let project = Instance::new("p1").with("name", "Alpha").with("budget", 1000);
//! let secured = privileges
//!     .for_resource(session, &ResourceType::from("Project"), None)?
//!     .secure(&project)?;
//!
//! assert!(secured.get("name").is_some_and(|p| p.can_edit));
//! assert_eq!(secured.value("budget"), None);
//! # Ok::<(), cordon_privileges::PrivilegeError>(())
//! ```

pub mod condition;
pub mod context;
pub mod edge;
pub mod error;
pub mod executor;
pub mod filter;
pub mod permission;
pub mod policy;
pub mod registry;
pub mod resource;
pub mod secured;
pub mod service;
pub mod standard;

// Re-export commonly used types
pub use condition::{Condition, ConditionKind};
pub use context::{Dimensions, PrivilegeContext};
pub use edge::{ChildListAction, EdgePrivileges};
pub use error::{PrivilegeError, Result};
pub use executor::{Contribution, PolicySet, PolicySummary};
pub use filter::{Backend, Bindings, FilterDefaults, FilterOptions, Fragment};
pub use permission::{Action, Permission, PermissionMap};
pub use policy::{Permissions, Policy};
pub use registry::ResourceDescriptor;
pub use resource::{Audit, ResourcePrivileges};
pub use secured::{SecuredProperty, SecuredResource};
pub use service::Privileges;
pub use standard::StandardPolicies;
