//! Host definition for the inventory runtime.
//!
//! A `Host` is a name plus a bag of variables. `ansible_host`, the address
//! to connect to, is kept in its own field because plugins overwrite it and
//! the renderer always emits it first.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Variable name holding the connection address
pub const ANSIBLE_HOST: &str = "ansible_host";

/// A managed host in the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Inventory hostname
    pub name: String,

    /// Address to connect to, if different from `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible_host: Option<String>,

    /// Host-specific variables (insertion ordered)
    #[serde(default)]
    pub vars: IndexMap<String, serde_yaml::Value>,

    /// Groups this host belongs to
    #[serde(skip)]
    pub groups: IndexSet<String>,
}

impl Host {
    /// Create a new host with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ansible_host: None,
            vars: IndexMap::new(),
            groups: IndexSet::new(),
        }
    }

    /// Address to connect to
    pub fn address(&self) -> &str {
        self.ansible_host.as_deref().unwrap_or(&self.name)
    }

    /// Set a variable on this host.
    ///
    /// `ansible_host` goes to the dedicated field when the value is a string
    /// or number; any other shape is stored as a plain variable.
    pub fn set_var(&mut self, key: impl Into<String>, value: serde_yaml::Value) {
        let key = key.into();
        if key == ANSIBLE_HOST {
            match value {
                serde_yaml::Value::String(s) => {
                    self.vars.shift_remove(ANSIBLE_HOST);
                    self.ansible_host = Some(s);
                    return;
                }
                serde_yaml::Value::Number(n) => {
                    self.vars.shift_remove(ANSIBLE_HOST);
                    self.ansible_host = Some(n.to_string());
                    return;
                }
                _ => self.ansible_host = None,
            }
        }
        self.vars.insert(key, value);
    }

    /// Get a variable from this host (`ansible_host` included)
    pub fn get_var(&self, key: &str) -> Option<serde_yaml::Value> {
        if key == ANSIBLE_HOST {
            if let Some(addr) = &self.ansible_host {
                return Some(serde_yaml::Value::String(addr.clone()));
            }
        }
        self.vars.get(key).cloned()
    }

    /// Check if host has a specific variable
    pub fn has_var(&self, key: &str) -> bool {
        (key == ANSIBLE_HOST && self.ansible_host.is_some()) || self.vars.contains_key(key)
    }

    /// All variables, `ansible_host` first when set
    pub fn all_vars(&self) -> IndexMap<String, serde_yaml::Value> {
        let mut vars = IndexMap::with_capacity(self.vars.len() + 1);
        if let Some(addr) = &self.ansible_host {
            vars.insert(
                ANSIBLE_HOST.to_string(),
                serde_yaml::Value::String(addr.clone()),
            );
        }
        for (key, value) in &self.vars {
            vars.insert(key.clone(), value.clone());
        }
        vars
    }

    /// Add this host to a group
    pub fn add_to_group(&mut self, group: impl Into<String>) {
        self.groups.insert(group.into());
    }

    /// Check if host belongs to a specific group
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl std::hash::Hash for Host {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(addr) = &self.ansible_host {
            write!(f, " ({})", addr)?;
        }
        Ok(())
    }
}
