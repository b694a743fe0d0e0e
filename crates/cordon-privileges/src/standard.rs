//! Standard resource types and policies.
//!
//! A small project-management domain used by the CLI and the integration
//! tests:
//!
//! | Role           | User       | Project                      | Engagement          | Budget            |
//! |----------------|------------|------------------------------|---------------------|-------------------|
//! | Administrator  | all        | all                          | all                 | all               |
//! | ProjectManager | own record | read, edit when PM in scope  | read, edit when PM  | read when PM      |
//! | Translator     | own record | name, read MOU dates         | read when member    | none              |
//! | Consultant     | own record | read up to Medium            | read up to Medium   | none              |

use cordon_types::{ResourceType, Role};

use crate::{
    condition::Condition,
    error::Result,
    executor::PolicySet,
    permission::Permission,
    policy::Policy,
    registry::ResourceDescriptor,
};

pub const ADMINISTRATOR: Role = Role::from_static("Administrator");
pub const PROJECT_MANAGER: Role = Role::from_static("ProjectManager");
pub const TRANSLATOR: Role = Role::from_static("Translator");
pub const CONSULTANT: Role = Role::from_static("Consultant");

pub const USER: ResourceType = ResourceType::from_static("User");
pub const PROJECT: ResourceType = ResourceType::from_static("Project");
pub const ENGAGEMENT: ResourceType = ResourceType::from_static("Engagement");
pub const BUDGET: ResourceType = ResourceType::from_static("Budget");

/// Catalog of standard descriptors and policies.
pub struct StandardPolicies;

impl StandardPolicies {
    pub fn roles() -> [Role; 4] {
        [ADMINISTRATOR, PROJECT_MANAGER, TRANSLATOR, CONSULTANT]
    }

    pub fn descriptors() -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor::new(USER)
                .with_properties([
                    "email",
                    "realFirstName",
                    "realLastName",
                    "displayFirstName",
                    "displayLastName",
                    "phone",
                    "timezone",
                    "about",
                    "status",
                ])
                .with_relations(["education", "unavailabilities"])
                .user_like(),
            ResourceDescriptor::new(PROJECT)
                .with_properties([
                    "name",
                    "status",
                    "step",
                    "sensitivity",
                    "mouStart",
                    "mouEnd",
                    "estimatedSubmission",
                    "primaryLocation",
                    "departmentId",
                    "budget",
                ])
                .with_relations(["engagements", "members", "partnerships"]),
            ResourceDescriptor::new(ENGAGEMENT)
                .with_properties([
                    "status",
                    "startDate",
                    "endDate",
                    "completeDate",
                    "disbursementCompleteDate",
                    "paratextRegistryId",
                ])
                .with_relations(["products"]),
            ResourceDescriptor::new(BUDGET)
                .with_properties(["status", "universalTemplateFile"])
                .with_relations(["records"]),
        ]
    }

    pub fn policies() -> Vec<Policy> {
        let mut policies = Vec::new();
        policies.extend(Self::administrator());
        policies.extend(Self::project_manager());
        policies.extend(Self::translator());
        policies.extend(Self::consultant());
        policies.extend(Self::roles().map(Self::own_user_record));
        policies
    }

    /// Validated set of every standard descriptor and policy.
    pub fn policy_set() -> Result<PolicySet> {
        PolicySet::new(Self::descriptors(), Self::policies())
    }

    /// Unrestricted access everywhere, plus MOU dates while in development.
    pub fn administrator() -> Vec<Policy> {
        let mut policies: Vec<Policy> = Self::descriptors()
            .iter()
            .map(|descriptor| {
                let name = format!("administrator-{}", descriptor.name().as_str().to_lowercase());
                descriptor
                    .relations()
                    .fold(Policy::new(descriptor.name().clone(), ADMINISTRATOR), |policy, relation| {
                        policy.children(relation, Permission::all())
                    })
                    .named(name)
                    .read()
                    .edit()
                    .create()
                    .delete()
            })
            .collect();

        policies.push(
            Policy::new(PROJECT, ADMINISTRATOR)
                .named("administrator-project-in-development")
                .when(Condition::property_in("status", ["InDevelopment"]))
                .specifically("mouStart", Permission::READ_AND_EDIT)
                .specifically("mouEnd", Permission::READ_AND_EDIT),
        );
        policies
    }

    pub fn project_manager() -> Vec<Policy> {
        let in_scope = || Condition::role_in_scope([PROJECT_MANAGER]);
        vec![
            Policy::new(PROJECT, PROJECT_MANAGER)
                .named("project-manager-project")
                .read()
                .create(),
            Policy::new(PROJECT, PROJECT_MANAGER)
                .named("project-manager-project-edit")
                .when(in_scope())
                .edit()
                .children("members", Permission::READ_AND_EDIT),
            Policy::new(PROJECT, PROJECT_MANAGER)
                .named("project-manager-engagements-in-development")
                .when(Condition::property_in("status", ["InDevelopment"]))
                .children("engagements", Permission::READ_AND_EDIT),
            Policy::new(PROJECT, PROJECT_MANAGER)
                .named("project-manager-engagements")
                .children("engagements", Permission::READ),
            Policy::new(ENGAGEMENT, PROJECT_MANAGER)
                .named("project-manager-engagement")
                .read(),
            Policy::new(ENGAGEMENT, PROJECT_MANAGER)
                .named("project-manager-engagement-edit")
                .when(in_scope())
                .edit()
                .delete()
                .children("products", Permission::READ_AND_EDIT),
            Policy::new(BUDGET, PROJECT_MANAGER)
                .named("project-manager-budget")
                .when(in_scope())
                .read()
                .children("records", Permission::READ),
        ]
    }

    /// Translators see project names and MOU dates, and may rename.
    pub fn translator() -> Vec<Policy> {
        vec![
            Policy::new(PROJECT, TRANSLATOR)
                .named("translator-project")
                .specifically("name", Permission::READ_AND_EDIT)
                .specifically("mouStart", Permission::READ)
                .specifically("mouEnd", Permission::READ),
            Policy::new(ENGAGEMENT, TRANSLATOR)
                .named("translator-engagement")
                .when(Condition::role_in_scope([TRANSLATOR]))
                .read(),
        ]
    }

    /// Consultants read anything not above medium sensitivity.
    pub fn consultant() -> Vec<Policy> {
        let cleared = || Condition::SensitivityAtMost(cordon_types::Sensitivity::Medium);
        vec![
            Policy::new(PROJECT, CONSULTANT)
                .named("consultant-project")
                .when(cleared())
                .read()
                .children("engagements", Permission::READ),
            Policy::new(ENGAGEMENT, CONSULTANT)
                .named("consultant-engagement")
                .when(cleared())
                .read(),
        ]
    }

    /// Everyone reads and edits their own user record.
    pub fn own_user_record(role: Role) -> Policy {
        let name = format!("{}-own-user", role.as_str().to_lowercase());
        Policy::new(USER, role)
            .named(name)
            .when(Condition::Owner)
            .read()
            .edit()
            .children("unavailabilities", Permission::all())
    }
}
