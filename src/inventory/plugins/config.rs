//! Plugin source file
//!
//! An inventory plugin is selected and configured by a small YAML file whose
//! `plugin:` key names the plugin; every other key is a plugin option.
//!
//! ```yaml
//! plugin: rabify
//! api_endpoint: https://netbox.example.org
//! validate_certs: false
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading plugin configuration
#[derive(Debug, Error)]
pub enum PluginConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for '{key}': expected {expected}")]
    InvalidType {
        /// Option name
        key: String,
        /// Expected YAML type
        expected: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for plugin configuration operations
pub type PluginConfigResult<T> = Result<T, PluginConfigError>;

/// Parsed plugin source file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name (e.g. "rabify")
    #[serde(default)]
    pub plugin: String,

    /// Plugin-specific options
    #[serde(default, flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl PluginConfig {
    /// Create a new configuration for a specific plugin
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            extra: IndexMap::new(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> PluginConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> PluginConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> PluginConfigResult<()> {
        if self.plugin.is_empty() {
            return Err(PluginConfigError::MissingField("plugin".to_string()));
        }
        Ok(())
    }

    /// Add an option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// String option; numbers are accepted and rendered as text.
    ///
    /// `Ok(None)` when the key is absent or null.
    pub fn get_string(&self, key: &str) -> PluginConfigResult<Option<String>> {
        match self.extra.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(PluginConfigError::InvalidType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    /// Boolean option; accepts YAML booleans and the usual string spellings
    pub fn get_bool(&self, key: &str) -> PluginConfigResult<Option<bool>> {
        match self.extra.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Bool(b)) => Ok(Some(*b)),
            Some(serde_yaml::Value::String(s)) => parse_bool(s).map(Some).ok_or_else(|| {
                PluginConfigError::InvalidType {
                    key: key.to_string(),
                    expected: "boolean",
                }
            }),
            Some(_) => Err(PluginConfigError::InvalidType {
                key: key.to_string(),
                expected: "boolean",
            }),
        }
    }
}

/// Parse a boolean the way inventory option strings spell them
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "y" | "t" => Some(true),
        "false" | "no" | "off" | "0" | "n" | "f" => Some(false),
        _ => None,
    }
}
