//! Configuration management for Cordon
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (CORDON_* prefix, `__` between sections)
//! 2. cordon.local.toml (gitignored, local overrides)
//! 3. cordon.toml (git-tracked, project config)
//! 4. ~/.config/cordon/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use cordon_privileges::{Audit, Backend, Bindings, Privileges};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Cordon configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CordonConfig {
    pub audit: AuditConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub log_grants: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_grants: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub default_backend: Backend,
    pub cypher: BindingsConfig,
    pub edgeql: BindingsConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_backend: Backend::Cypher,
            cypher: BindingsConfig::from(Bindings::for_backend(Backend::Cypher)),
            edgeql: BindingsConfig::from(Bindings::for_backend(Backend::EdgeQl)),
        }
    }
}

impl FilterConfig {
    pub fn bindings(&self, backend: Backend) -> &BindingsConfig {
        match backend {
            Backend::Cypher => &self.cypher,
            Backend::EdgeQl => &self.edgeql,
        }
    }
}

/// Variable names filter fragments are bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingsConfig {
    pub row: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub actor: String,
}

impl From<Bindings> for BindingsConfig {
    fn from(bindings: Bindings) -> Self {
        Self {
            row: bindings.row,
            scope: bindings.scope,
            actor: bindings.actor,
        }
    }
}

impl From<&BindingsConfig> for Bindings {
    fn from(config: &BindingsConfig) -> Self {
        Bindings {
            row: config.row.clone(),
            scope: config.scope.clone(),
            actor: config.actor.clone(),
        }
    }
}

impl CordonConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Rejects bindings no backend could evaluate
    pub fn validate(&self) -> Result<(), ConfigError> {
        for backend in Backend::ALL {
            let bindings = self.filter.bindings(backend);
            if bindings.actor.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "filter.{backend}.actor must not be empty"
                )));
            }
            // EdgeQL paths may start from the implicit subject
            if backend == Backend::Cypher && bindings.row.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "filter.cypher.row must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Applies audit switches and filter bindings to `privileges`
    pub fn apply(&self, privileges: Privileges) -> Privileges {
        Backend::ALL.into_iter().fold(
            privileges
                .with_audit(Audit {
                    enabled: self.audit.enabled,
                    log_grants: self.audit.log_grants,
                })
                .with_default_backend(self.filter.default_backend),
            |privileges, backend| privileges.with_bindings(backend, self.filter.bindings(backend).into()),
        )
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}
