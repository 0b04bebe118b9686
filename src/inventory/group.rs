//! Group definition for the inventory runtime.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// A group of hosts in the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Group name
    pub name: String,

    /// Host names belonging to this group (insertion ordered)
    #[serde(default)]
    pub hosts: IndexSet<String>,

    /// Child group names
    #[serde(default)]
    pub children: IndexSet<String>,

    /// Group-specific variables
    #[serde(default)]
    pub vars: IndexMap<String, serde_yaml::Value>,
}

impl Group {
    /// Create a new group with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: IndexSet::new(),
            children: IndexSet::new(),
            vars: IndexMap::new(),
        }
    }

    /// The implicit "all" group
    pub fn all() -> Self {
        Self::new("all")
    }

    /// The implicit "ungrouped" group
    pub fn ungrouped() -> Self {
        Self::new("ungrouped")
    }

    /// Add a host to this group
    pub fn add_host(&mut self, host: impl Into<String>) {
        self.hosts.insert(host.into());
    }

    /// Check if a host belongs to this group
    pub fn has_host(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Add a child group
    pub fn add_child(&mut self, child: impl Into<String>) {
        self.children.insert(child.into());
    }

    /// Set a variable on this group
    pub fn set_var(&mut self, key: impl Into<String>, value: serde_yaml::Value) {
        self.vars.insert(key.into(), value);
    }

    /// Get a variable from this group
    pub fn get_var(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.vars.get(key)
    }

    /// No hosts, no children
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.children.is_empty()
    }

    /// Number of direct host members
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Group {}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} hosts", self.name, self.hosts.len())?;
        if !self.children.is_empty() {
            write!(f, ", {} children", self.children.len())?;
        }
        write!(f, ")")
    }
}
