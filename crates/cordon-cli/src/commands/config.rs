//! Configuration management commands.

use anyhow::{Context, Result};
use cordon_config::{CordonConfig, Paths};
use std::path::Path;

/// Show the effective configuration.
pub fn show(project: &str, format: &str) -> Result<()> {
    let config =
        CordonConfig::load_from_dir(Path::new(project)).context("Failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => print!("{}", config.to_toml()?),
    }
    Ok(())
}

/// Show the files configuration is layered from.
pub fn paths(project: &str) -> Result<()> {
    let project = Path::new(project);
    let user = Paths::new()
        .user_config_file()
        .map_or_else(|e| e.to_string(), |p| p.display().to_string());

    println!("User:    {user}");
    println!("Project: {}", Paths::project_config_file(project).display());
    println!("Local:   {}", Paths::local_config_file(project).display());
    println!("Env:     CORDON_<SECTION>__<KEY>");
    Ok(())
}
