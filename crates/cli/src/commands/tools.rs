//! `wikiagent tools`: List the tools enabled by configuration.

use std::path::Path;

use wikiagent_core::tool::{ToolDefinition, ToolRegistry};

use crate::runtime::load_config;

pub async fn run(config_path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = ToolRegistry::from_handlers(wikiagent_tools::default_handlers(&config.tools));

    if json {
        let schemas: Vec<serde_json::Value> = registry
            .definitions()
            .iter()
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "description": d.description,
                    "parameters": d.json_schema(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    println!("🛠️  Available tools ({})", registry.len());
    println!();
    for definition in registry.definitions() {
        print!("{}", describe(definition));
    }
    if config.tools.documents_dir.is_none() {
        println!("  (set tools.documents_dir to enable search_documents)");
    }
    if config.tools.svn_repository.is_none() {
        println!("  (set tools.svn_repository to enable svn_operation)");
    }
    if config.tools.database_url.is_none() {
        println!("  (set tools.database_url to enable explore_database_schema)");
    }
    Ok(())
}

fn describe(definition: &ToolDefinition) -> String {
    let mut out = format!("  {}\n    {}\n", definition.name, definition.description);
    for param in &definition.parameters {
        let required = if param.required { ", required" } else { "" };
        out.push_str(&format!(
            "    - {} ({}{required}): {}\n",
            param.name,
            param.kind.as_str(),
            param.description
        ));
    }
    out
}
