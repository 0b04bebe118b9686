//! Inventory plugins
//!
//! Plugins are selected by the `plugin:` key of a small YAML source file.
//!
//! # Available Plugins
//!
//! - [`rabify`]: admin addresses and config context from NetBox
//!
//! # Usage
//!
//! ```rust,ignore
//! use rabify::inventory::plugins::create_plugin_from_file;
//!
//! let plugin = create_plugin_from_file(Path::new("rabify.yml"))?;
//! plugin.verify()?;
//! plugin.parse(&mut inventory).await?;
//! ```

pub mod config;
pub mod rabify;

pub use config::{PluginConfig, PluginConfigError, PluginConfigResult};
pub use rabify::{
    ContextOwner, RabifyError, RabifyOptions, RabifyPlugin, Resolution, RunSummary, PLUGIN_NAME,
};

use super::{InventoryError, InventoryPlugin, InventoryResult};
use std::path::Path;
use std::sync::Arc;

/// Names accepted in the `plugin:` key
pub fn available_plugins() -> &'static [&'static str] {
    &[PLUGIN_NAME]
}

/// Create a plugin from a configuration file
pub fn create_plugin_from_file(path: &Path) -> InventoryResult<Arc<dyn InventoryPlugin>> {
    let config = PluginConfig::from_file(path).map_err(|e| {
        InventoryError::InvalidFormat(format!(
            "failed to load plugin config from '{}': {}",
            path.display(),
            e
        ))
    })?;

    create_plugin_from_config(config)
}

/// Create a plugin from a configuration
pub fn create_plugin_from_config(config: PluginConfig) -> InventoryResult<Arc<dyn InventoryPlugin>> {
    let plugin_name = config.plugin.to_lowercase();

    if rabify::is_rabify(&plugin_name) {
        let plugin = RabifyPlugin::from_config(&config).map_err(|e| InventoryError::Plugin {
            plugin: PLUGIN_NAME.to_string(),
            source: Box::new(e),
        })?;
        return Ok(Arc::new(plugin));
    }

    Err(InventoryError::InvalidFormat(format!(
        "unknown plugin: '{}'. Available plugins: {}",
        config.plugin,
        available_plugins().join(", ")
    )))
}
