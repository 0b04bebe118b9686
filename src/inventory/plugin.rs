//! Inventory plugin interface.
//!
//! A plugin receives an inventory an upstream source already populated and
//! enriches it in place, the way Ansible inventory plugins work on the
//! shared inventory object. The runtime then renders the result in the
//! dynamic inventory JSON shape (`--list` / `--host`).
//!
//! # Example
//!
//! ```rust,ignore
//! use rabify::inventory::{Inventory, InventoryPlugin};
//! use rabify::inventory::plugins::create_plugin_from_file;
//!
//! let mut inventory = Inventory::load("hosts.yml")?;
//! let plugin = create_plugin_from_file(Path::new("rabify.yml"))?;
//! plugin.verify()?;
//! plugin.parse(&mut inventory).await?;
//! println!("{}", inventory_to_json(&inventory));
//! ```

use async_trait::async_trait;
use std::fmt;

use super::{Host, Inventory, InventoryResult};

// ============================================================================
// Plugin Trait
// ============================================================================

/// Core trait for inventory plugins
#[async_trait]
pub trait InventoryPlugin: Send + Sync + fmt::Debug {
    /// Get the plugin name
    fn name(&self) -> &str;

    /// Get the plugin description
    fn description(&self) -> &str {
        "Custom inventory plugin"
    }

    /// Get the plugin version
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Verify that the plugin is properly configured
    fn verify(&self) -> InventoryResult<()> {
        Ok(())
    }

    /// Enrich `inventory` in place
    async fn parse(&self, inventory: &mut Inventory) -> InventoryResult<()>;

    /// Get supported options for this plugin
    fn supported_options(&self) -> Vec<PluginOptionInfo> {
        Vec::new()
    }
}

/// Information about a plugin option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginOptionInfo {
    /// Option name
    pub name: String,
    /// Option description
    pub description: String,
    /// Whether the option is required
    pub required: bool,
    /// Default value (if any)
    pub default: Option<String>,
    /// Option type (string, bool)
    pub option_type: String,
    /// Environment variables consulted when the option is absent, in order
    pub env_vars: Vec<String>,
}

impl PluginOptionInfo {
    /// Create a new required string option
    pub fn required_string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
            default: None,
            option_type: "string".to_string(),
            env_vars: Vec::new(),
        }
    }

    /// Create a new optional string option with a default
    pub fn optional_string(
        name: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default: Some(default.into()),
            option_type: "string".to_string(),
            env_vars: Vec::new(),
        }
    }

    /// Create a new optional boolean option
    pub fn optional_bool(
        name: impl Into<String>,
        description: impl Into<String>,
        default: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            default: Some(default.to_string()),
            option_type: "bool".to_string(),
            env_vars: Vec::new(),
        }
    }

    /// Add an environment variable alternative
    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_vars.push(env_var.into());
        self
    }
}

impl fmt::Display for PluginOptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.name, self.option_type)?;
        if self.required {
            write!(f, ", required")?;
        }
        if let Some(default) = &self.default {
            write!(f, ", default: {}", default)?;
        }
        if !self.env_vars.is_empty() {
            write!(f, ", env: {}", self.env_vars.join(", "))?;
        }
        write!(f, "): {}", self.description)
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the whole inventory as dynamic inventory `--list` JSON
pub fn inventory_to_json(inventory: &Inventory) -> serde_json::Value {
    let mut result = serde_json::Map::new();
    let mut hostvars = serde_json::Map::new();

    for group in inventory.groups() {
        let mut group_data = serde_json::Map::new();

        // "all" lists its members through children; every host is in it anyway
        let children: Vec<serde_json::Value> = if group.name == "all" {
            inventory
                .groups()
                .filter(|g| g.name != "all" && !is_nested_child(inventory, &g.name))
                .map(|g| serde_json::Value::String(g.name.clone()))
                .collect()
        } else {
            group
                .children
                .iter()
                .map(|c| serde_json::Value::String(c.clone()))
                .collect()
        };

        if group.name != "all" && !group.hosts.is_empty() {
            let hosts = group
                .hosts
                .iter()
                .map(|h| serde_json::Value::String(h.clone()))
                .collect();
            group_data.insert("hosts".to_string(), serde_json::Value::Array(hosts));
        }

        if !children.is_empty() {
            group_data.insert("children".to_string(), serde_json::Value::Array(children));
        }

        if !group.vars.is_empty() {
            let vars = group
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), yaml_to_json(v)))
                .collect();
            group_data.insert("vars".to_string(), serde_json::Value::Object(vars));
        }

        if !group_data.is_empty() {
            result.insert(group.name.clone(), serde_json::Value::Object(group_data));
        }
    }

    for host in inventory.hosts() {
        hostvars.insert(host.name.clone(), host_vars_to_json(host));
    }

    let mut meta = serde_json::Map::new();
    meta.insert("hostvars".to_string(), serde_json::Value::Object(hostvars));
    result.insert("_meta".to_string(), serde_json::Value::Object(meta));

    serde_json::Value::Object(result)
}

/// Render one host's variables (`--host <name>`)
pub fn host_vars_to_json(host: &Host) -> serde_json::Value {
    let vars = host
        .all_vars()
        .iter()
        .map(|(k, v)| (k.clone(), yaml_to_json(v)))
        .collect();
    serde_json::Value::Object(vars)
}

fn is_nested_child(inventory: &Inventory, name: &str) -> bool {
    inventory
        .groups()
        .any(|g| g.name != "all" && g.children.contains(name))
}

/// Convert YAML value to JSON value
fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let obj = map
                .iter()
                .filter_map(|(k, v)| match k {
                    serde_yaml::Value::String(key) => Some((key.clone(), yaml_to_json(v))),
                    serde_yaml::Value::Number(n) => Some((n.to_string(), yaml_to_json(v))),
                    serde_yaml::Value::Bool(b) => Some((b.to_string(), yaml_to_json(v))),
                    _ => None,
                })
                .collect();
            serde_json::Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}
