//! Policy registry listing.

use anyhow::Result;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use cordon_privileges::PolicySummary;

use super::bits;

/// List registered policies, optionally for one resource type.
pub fn run(project: &str, resource_type: Option<&str>) -> Result<()> {
    let privileges = super::privileges(project)?;
    let summaries: Vec<PolicySummary> = privileges
        .policies()
        .summaries()
        .into_iter()
        .filter(|s| resource_type.is_none_or(|t| s.resource_type.as_str() == t))
        .collect();

    println!("{}", table(&summaries));
    println!("({} policies)", summaries.len());
    Ok(())
}

pub(crate) fn table(summaries: &[PolicySummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Policy", "Type", "Role", "Condition", "Grants"]
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

    for summary in summaries {
        table.add_row(vec![
            summary.name.clone(),
            summary.resource_type.to_string(),
            summary.role.to_string(),
            summary
                .condition
                .as_ref()
                .map_or_else(|| "always".to_string(), |c| c.kind().to_string()),
            grants(summary),
        ]);
    }
    table
}

fn grants(summary: &PolicySummary) -> String {
    match &summary.permissions {
        Some(map) => map
            .iter()
            .map(|(key, permission)| format!("{key}:{}", bits(permission)))
            .collect::<Vec<_>>()
            .join(" "),
        None => "computed".to_string(),
    }
}
