//! Inventory runtime.
//!
//! Owns the hosts and groups an upstream source produced and hands them to
//! inventory plugins for enrichment:
//! - Loading from YAML (`all:` / `hosts:` / `children:` / `vars:` tree) and
//!   JSON (dynamic inventory `--list` output with `_meta.hostvars`)
//! - Host and group lookup in load order
//! - `set_variable`, the mutator plugins write through

pub mod group;
pub mod host;
pub mod plugin;
pub mod plugins;

pub use group::Group;
pub use host::{Host, ANSIBLE_HOST};
pub use plugin::{host_vars_to_json, inventory_to_json, InventoryPlugin, PluginOptionInfo};

use indexmap::IndexMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("invalid inventory format: {0}")]
    InvalidFormat(String),

    #[error("inventory plugin '{plugin}' failed: {source}")]
    Plugin {
        /// Plugin name
        plugin: String,
        /// Underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// The main inventory structure holding all hosts and groups
#[derive(Debug, Clone)]
pub struct Inventory {
    /// All hosts by name, in load order
    hosts: IndexMap<String, Host>,

    /// All groups by name, in load order
    groups: IndexMap<String, Group>,

    /// Source file path
    source: Option<String>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Create a new empty inventory with default groups
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert("all".to_string(), Group::all());
        groups.insert("ungrouped".to_string(), Group::ungrouped());

        Self {
            hosts: IndexMap::new(),
            groups,
            source: None,
        }
    }

    /// Load inventory from a file
    pub fn load<P: AsRef<Path>>(path: P) -> InventoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let mut inventory = match extension.as_str() {
            "json" => Self::from_json_str(&content)?,
            "yml" | "yaml" => Self::from_yaml_str(&content)?,
            _ if content.trim_start().starts_with('{') => Self::from_json_str(&content)?,
            _ => Self::from_yaml_str(&content)?,
        };
        inventory.source = Some(path.display().to_string());

        Ok(inventory)
    }

    /// Parse a YAML inventory document
    pub fn from_yaml_str(content: &str) -> InventoryResult<Self> {
        let mut inventory = Self::new();
        let data: serde_yaml::Value = serde_yaml::from_str(content)?;

        match data {
            serde_yaml::Value::Mapping(map) => {
                for (key, value) in &map {
                    let Some(group_name) = key.as_str() else {
                        return Err(InventoryError::InvalidFormat(format!(
                            "group name must be a string, got {:?}",
                            key
                        )));
                    };
                    inventory.parse_yaml_group(group_name, value)?;
                }
            }
            serde_yaml::Value::Null => {}
            other => {
                return Err(InventoryError::InvalidFormat(format!(
                    "expected a mapping at the top level, got {:?}",
                    other
                )))
            }
        }

        inventory.assign_ungrouped();
        Ok(inventory)
    }

    /// Parse one YAML group (and, recursively, its children)
    fn parse_yaml_group(&mut self, name: &str, value: &serde_yaml::Value) -> InventoryResult<()> {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group::new(name));

        let serde_yaml::Value::Mapping(map) = value else {
            return Ok(());
        };

        if let Some(serde_yaml::Value::Mapping(hosts)) = map.get("hosts") {
            for (host_key, host_value) in hosts {
                let Some(host_name) = host_key.as_str() else {
                    continue;
                };
                self.ensure_host(host_name, name);

                if let serde_yaml::Value::Mapping(host_vars) = host_value {
                    if let Some(host) = self.hosts.get_mut(host_name) {
                        for (var_key, var_value) in host_vars {
                            if let Some(key) = var_key.as_str() {
                                host.set_var(key, var_value.clone());
                            }
                        }
                    }
                }
            }
        }

        if let Some(serde_yaml::Value::Mapping(children)) = map.get("children") {
            for (child_key, child_value) in children {
                let Some(child_name) = child_key.as_str() else {
                    continue;
                };
                if let Some(group) = self.groups.get_mut(name) {
                    group.add_child(child_name);
                }
                self.parse_yaml_group(child_name, child_value)?;
            }
        }

        if let Some(serde_yaml::Value::Mapping(vars)) = map.get("vars") {
            if let Some(group) = self.groups.get_mut(name) {
                for (var_key, var_value) in vars {
                    if let Some(key) = var_key.as_str() {
                        group.set_var(key, var_value.clone());
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse dynamic inventory JSON (`--list` output)
    pub fn from_json_str(content: &str) -> InventoryResult<Self> {
        let mut inventory = Self::new();
        let data: serde_json::Value = serde_json::from_str(content)?;

        let serde_json::Value::Object(map) = data else {
            return Err(InventoryError::InvalidFormat(
                "expected a JSON object at the top level".to_string(),
            ));
        };

        for (group_name, value) in &map {
            if group_name == "_meta" {
                continue;
            }

            inventory
                .groups
                .entry(group_name.clone())
                .or_insert_with(|| Group::new(group_name.as_str()));

            let host_names: Vec<&str> = match value {
                serde_json::Value::Array(hosts) => hosts.iter().filter_map(|h| h.as_str()).collect(),
                serde_json::Value::Object(group_data) => group_data
                    .get("hosts")
                    .and_then(|h| h.as_array())
                    .map(|hosts| hosts.iter().filter_map(|h| h.as_str()).collect())
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            for host_name in host_names {
                inventory.ensure_host(host_name, group_name);
            }

            let serde_json::Value::Object(group_data) = value else {
                continue;
            };

            if let Some(serde_json::Value::Array(children)) = group_data.get("children") {
                for child_name in children.iter().filter_map(|c| c.as_str()) {
                    inventory
                        .groups
                        .entry(child_name.to_string())
                        .or_insert_with(|| Group::new(child_name));
                    if let Some(group) = inventory.groups.get_mut(group_name) {
                        group.add_child(child_name);
                    }
                }
            }

            if let Some(serde_json::Value::Object(vars)) = group_data.get("vars") {
                if let Some(group) = inventory.groups.get_mut(group_name) {
                    for (key, value) in vars {
                        group.set_var(key, json_to_yaml(value));
                    }
                }
            }
        }

        if let Some(serde_json::Value::Object(hostvars)) =
            map.get("_meta").and_then(|meta| meta.get("hostvars"))
        {
            for (host_name, vars) in hostvars {
                // hostvars may name hosts that no group lists
                inventory.ensure_host(host_name, "all");
                if let (Some(host), serde_json::Value::Object(vars)) =
                    (inventory.hosts.get_mut(host_name), vars)
                {
                    for (key, value) in vars {
                        host.set_var(key, json_to_yaml(value));
                    }
                }
            }
        }

        inventory.assign_ungrouped();
        Ok(inventory)
    }

    /// Create the host if needed and put it in `group` and `all`
    fn ensure_host(&mut self, host_name: &str, group: &str) {
        let host = self
            .hosts
            .entry(host_name.to_string())
            .or_insert_with(|| Host::new(host_name));
        host.add_to_group(group);
        host.add_to_group("all");

        if let Some(g) = self.groups.get_mut(group) {
            g.add_host(host_name);
        }
        if let Some(all) = self.groups.get_mut("all") {
            all.add_host(host_name);
        }
    }

    /// Hosts that are only in `all` land in `ungrouped`
    fn assign_ungrouped(&mut self) {
        let ungrouped: Vec<String> = self
            .hosts
            .values()
            .filter(|h| h.groups.iter().all(|g| g == "all" || g == "ungrouped"))
            .map(|h| h.name.clone())
            .collect();

        for name in ungrouped {
            if let Some(host) = self.hosts.get_mut(&name) {
                host.add_to_group("ungrouped");
            }
            if let Some(group) = self.groups.get_mut("ungrouped") {
                group.add_host(name);
            }
        }
    }

    /// Add a host to the inventory (replaces a host with the same name)
    pub fn add_host(&mut self, mut host: Host) -> InventoryResult<()> {
        let name = host.name.clone();
        host.add_to_group("all");

        for group_name in &host.groups {
            let group = self
                .groups
                .entry(group_name.clone())
                .or_insert_with(|| Group::new(group_name.as_str()));
            group.add_host(name.clone());
        }

        if host.groups.len() == 1 {
            host.add_to_group("ungrouped");
            if let Some(ungrouped) = self.groups.get_mut("ungrouped") {
                ungrouped.add_host(name.clone());
            }
        }

        self.hosts.insert(name, host);
        Ok(())
    }

    /// Set a variable on a host, overwriting any previous value
    pub fn set_variable(
        &mut self,
        host: &str,
        key: &str,
        value: serde_yaml::Value,
    ) -> InventoryResult<()> {
        let entry = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| InventoryError::HostNotFound(host.to_string()))?;
        entry.set_var(key, value);
        Ok(())
    }

    /// Get a host by name
    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// Get a group by name
    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// All hosts, in load order
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// All groups, in load order
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// All host names, in load order
    pub fn host_names(&self) -> impl Iterator<Item = &String> {
        self.hosts.keys()
    }

    /// Where this inventory was loaded from
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Count total hosts
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Count total groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Convert a JSON value into the YAML value type host variables use
pub(crate) fn json_to_yaml(value: &serde_json::Value) -> serde_yaml::Value {
    match value {
        serde_json::Value::Null => serde_yaml::Value::Null,
        serde_json::Value::Bool(b) => serde_yaml::Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_yaml::Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                serde_yaml::Value::Number(u.into())
            } else {
                serde_yaml::Value::Number(n.as_f64().unwrap_or_default().into())
            }
        }
        serde_json::Value::String(s) => serde_yaml::Value::String(s.clone()),
        serde_json::Value::Array(arr) => {
            serde_yaml::Value::Sequence(arr.iter().map(json_to_yaml).collect())
        }
        serde_json::Value::Object(obj) => {
            let mut map = serde_yaml::Mapping::new();
            for (k, v) in obj {
                map.insert(serde_yaml::Value::String(k.clone()), json_to_yaml(v));
            }
            serde_yaml::Value::Mapping(map)
        }
    }
}

impl std::fmt::Display for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Inventory ({} hosts, {} groups)",
            self.hosts.len(),
            self.groups.len()
        )?;

        for group in self.groups.values() {
            if group.hosts.is_empty() || group.name == "all" {
                continue;
            }
            writeln!(f, "  [{}]", group.name)?;
            for host_name in &group.hosts {
                if let Some(host) = self.hosts.get(host_name) {
                    writeln!(f, "    {}", host)?;
                }
            }
        }

        Ok(())
    }
}
