//! CLI command implementations.

pub mod check;
pub mod config;
pub mod filter;
pub mod policies;

use anyhow::{Context, Result, bail};
use cordon_config::CordonConfig;
use cordon_privileges::{Dimensions, Permission, Privileges, StandardPolicies};
use cordon_types::{Role, Session, Value};
use std::path::Path;

/// Session described by command-line flags.
pub struct SessionSpec {
    pub actor: String,
    pub roles: Vec<String>,
    pub dimensions: Vec<String>,
}

impl SessionSpec {
    pub fn session(&self) -> Result<Session> {
        if self.roles.is_empty() {
            bail!("at least one --role is required");
        }
        Ok(Session::new(
            self.actor.as_str(),
            self.roles.iter().map(|r| Role::new(r.as_str())),
        ))
    }

    /// Parses `key=value` pairs; values that are not JSON are taken as strings.
    pub fn dimensions(&self) -> Result<Dimensions> {
        self.dimensions.iter().try_fold(Dimensions::new(), |dims, pair| {
            let (key, raw) = pair
                .split_once('=')
                .with_context(|| format!("dimension '{pair}' is not key=value"))?;
            let value = serde_json::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok(dims.with(key.trim(), value))
        })
    }
}

/// Standard catalog configured from the project directory.
pub fn privileges(project: &str) -> Result<Privileges> {
    let config = CordonConfig::load_from_dir(Path::new(project))
        .context("Failed to load configuration")?;
    let policies = StandardPolicies::policy_set().context("Standard policy catalog is invalid")?;
    Ok(config.apply(Privileges::new(policies)))
}

/// Compact `RED` rendering of permission bits, `-` for none.
pub fn bits(permission: Permission) -> String {
    if permission.is_empty() {
        return "-".to_string();
    }
    [
        (Permission::READ, 'R'),
        (Permission::EDIT, 'E'),
        (Permission::DELETE, 'D'),
    ]
    .into_iter()
    .filter(|(bit, _)| permission.has(*bit))
    .map(|(_, c)| c)
    .collect()
}
