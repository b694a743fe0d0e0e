//! Secure an instance for a described session.

use anyhow::{Context, Result};
use comfy_table::Table;
use cordon_types::{Instance, ResourceType};
use std::fs;

use super::{SessionSpec, bits};

pub fn run(
    project: &str,
    spec: &SessionSpec,
    resource_type: &str,
    instance_path: &str,
    explain: Option<&str>,
) -> Result<()> {
    let raw = fs::read_to_string(instance_path)
        .with_context(|| format!("Failed to read {instance_path}"))?;
    let instance: Instance = serde_json::from_str(&raw)
        .with_context(|| format!("{instance_path} is not an instance"))?;

    let privileges = super::privileges(project)?;
    let mut resource = privileges
        .for_resource(
            spec.session()?,
            &ResourceType::new(resource_type),
            Some(instance.clone()),
        )
        .context("Failed to evaluate privileges")?;
    let dimensions = spec.dimensions()?;
    if !dimensions.is_empty() {
        resource = resource.for_context(&dimensions)?;
    }

    let secured = resource.secure(&instance)?;
    println!("{}", serde_json::to_string_pretty(&secured)?);

    if let Some(property) = explain {
        let contributions = resource.explain(Some(property))?;
        let mut table = Table::new();
        table.set_header(["Policy", "Role", "Bits"]);
        for c in &contributions {
            table.add_row(vec![c.policy.clone(), c.role.to_string(), bits(c.permission)]);
        }
        println!("{table}");
        println!("{property}: {}", bits(resource.permissions().get(property)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn spec(role: &str) -> SessionSpec {
        SessionSpec {
            actor: "u1".to_string(),
            roles: vec![role.to_string()],
            dimensions: Vec::new(),
        }
    }

    #[test]
    fn test_check_reads_instance_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("project.json");
        fs::write(
            &path,
            r#"{"id": "p1", "properties": {"name": "Alpha", "budget": 10}}"#,
        )
        .expect("Failed to write instance");

        let result = run(
            &dir.path().to_string_lossy(),
            &spec("Translator"),
            "Project",
            &path.to_string_lossy(),
            Some("name"),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_rejects_unknown_type() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("thing.json");
        fs::write(&path, r#"{"id": "t1"}"#).expect("Failed to write instance");

        let result = run(
            &dir.path().to_string_lossy(),
            &spec("Translator"),
            "Thing",
            &path.to_string_lossy(),
            None,
        );
        assert!(result.is_err());
    }
}
