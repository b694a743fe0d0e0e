//! Print the read filter for a described session.

use anyhow::{Context, Result};
use cordon_privileges::{Backend, FilterOptions, Fragment};
use cordon_types::ResourceType;

use super::SessionSpec;

pub fn run(
    project: &str,
    spec: &SessionSpec,
    resource_type: &str,
    backend: Option<Backend>,
    scope: Option<&str>,
) -> Result<()> {
    let fragment = compile(project, spec, resource_type, backend, scope)?;
    println!("{fragment}");
    if fragment.is_stub() {
        eprintln!("note: filter contains a fail-closed stub for {}", fragment.backend());
    }
    Ok(())
}

fn compile(
    project: &str,
    spec: &SessionSpec,
    resource_type: &str,
    backend: Option<Backend>,
    scope: Option<&str>,
) -> Result<Fragment> {
    let privileges = super::privileges(project)?;
    let mut resource = privileges
        .for_resource(spec.session()?, &ResourceType::new(resource_type), None)
        .context("Failed to evaluate privileges")?;
    let dimensions = spec.dimensions()?;
    if !dimensions.is_empty() {
        resource = resource.for_context(&dimensions)?;
    }

    let mut options = FilterOptions::new();
    if let Some(backend) = backend {
        options = options.backend(backend);
    }
    if let Some(scope) = scope {
        options = options.scope(scope);
    }
    Ok(resource.filter_to_readable(&options)?)
}
