//! Command execution: load, enrich, print

use super::{Cli, Mode, OutputFormat};
use anyhow::{Context, Result};
use rabify::inventory::plugins::create_plugin_from_file;
use rabify::inventory::{host_vars_to_json, inventory_to_json, Inventory, InventoryError};
use tracing::{debug, info};

/// Run the plugin over the inventory and return the rendered document
pub async fn execute(cli: &Cli) -> Result<String> {
    let mut inventory = Inventory::load(&cli.inventory)
        .with_context(|| format!("Failed to load inventory: {}", cli.inventory.display()))?;
    info!(
        "Loaded {} hosts in {} groups from {}",
        inventory.host_count(),
        inventory.group_count(),
        inventory.source().unwrap_or("-")
    );

    let plugin = create_plugin_from_file(&cli.config)
        .with_context(|| format!("Failed to load plugin file: {}", cli.config.display()))?;
    debug!("Using inventory plugin {} v{}", plugin.name(), plugin.version());

    plugin
        .verify()
        .with_context(|| format!("Plugin '{}' is misconfigured", plugin.name()))?;
    plugin
        .parse(&mut inventory)
        .await
        .with_context(|| format!("Plugin '{}' failed", plugin.name()))?;

    let document = match cli.mode() {
        Mode::List => inventory_to_json(&inventory),
        Mode::Host(name) => {
            let host = inventory
                .get_host(&name)
                .ok_or(InventoryError::HostNotFound(name))?;
            host_vars_to_json(host)
        }
    };

    render(&document, cli.output)
}

/// Serialize an inventory document in the requested format
pub fn render(document: &serde_json::Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(document).context("Failed to serialize JSON output")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(document).context("Failed to serialize YAML output")
        }
    }
}
