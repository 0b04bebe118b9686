//! NetBox admin-address inventory plugin
//!
//! Runs after an upstream source has filled the inventory and, for every
//! host, points `ansible_host` at the host's address on the admin network as
//! recorded in NetBox. Optionally the NetBox config context of the matching
//! virtual machine or device is flattened into host variables.
//!
//! # Configuration
//!
//! ```yaml
//! plugin: rabify
//! api_endpoint: https://netbox.example.org   # or NETBOX_API
//! token: 0123456789abcdef                    # or NETBOX_TOKEN / NETBOX_API_KEY
//! validate_certs: true
//! vm_admin_prefix: 10.136.0.0/16
//! device_admin_prefix: 10.128.0.0/16
//! device_interface_ignore: IPMI
//! config_context: true
//! ```
//!
//! # Resolution
//!
//! 1. An address in `vm_admin_prefix` assigned to a virtual machine of the
//!    same name is selected and the host counts as a VM.
//! 2. Addresses in `device_admin_prefix` assigned to a device of the same
//!    name are walked in API order; each one not on the ignored interface
//!    replaces the selection, so the last one wins and a device result
//!    always overrides the VM result.
//!
//! Failures in either lookup only mean "not of this kind". Failures while
//! merging config context abort the run.

use super::config::{PluginConfig, PluginConfigError, PluginConfigResult};
use crate::inventory::{
    json_to_yaml, Inventory, InventoryError, InventoryPlugin, InventoryResult, PluginOptionInfo,
    ANSIBLE_HOST,
};
use crate::netbox::{IpAddress, IpAddressFilter, NetBoxApi, NetBoxClient, NetBoxError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name in the `plugin:` key
pub const PLUGIN_NAME: &str = "rabify";

pub const DEFAULT_VM_ADMIN_PREFIX: &str = "10.136.0.0/16";
pub const DEFAULT_DEVICE_ADMIN_PREFIX: &str = "10.128.0.0/16";
pub const DEFAULT_DEVICE_INTERFACE_IGNORE: &str = "IPMI";

const API_ENDPOINT_ENV: &[&str] = &["NETBOX_API"];
const TOKEN_ENV: &[&str] = &["NETBOX_TOKEN", "NETBOX_API_KEY"];

/// Errors raised by the plugin itself
#[derive(Debug, Error)]
pub enum RabifyError {
    #[error("invalid plugin configuration: {0}")]
    Config(#[from] PluginConfigError),

    #[error("failed to create NetBox client: {0}")]
    Client(#[source] NetBoxError),

    #[error("config context of {owner} could not be merged: {reason}")]
    ConfigContext {
        owner: ContextOwner,
        #[source]
        reason: ConfigContextFailure,
    },

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// Why a config context could not be merged
#[derive(Debug, Error)]
pub enum ConfigContextFailure {
    #[error("request failed: {0}")]
    Fetch(#[from] NetBoxError),

    #[error("response has no config_context")]
    Missing,

    #[error("config_context is {0}, not a mapping")]
    NotMapping(&'static str),
}

/// Object whose config context is merged into a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOwner {
    VirtualMachine(u64),
    Device(u64),
}

impl fmt::Display for ContextOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextOwner::VirtualMachine(id) => write!(f, "virtual machine {}", id),
            ContextOwner::Device(id) => write!(f, "device {}", id),
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Resolved plugin options
#[derive(Clone, PartialEq, Eq)]
pub struct RabifyOptions {
    pub api_endpoint: String,
    pub token: String,
    pub validate_certs: bool,
    pub vm_admin_prefix: String,
    pub device_admin_prefix: String,
    pub device_interface_ignore: String,
    pub config_context: bool,
}

impl RabifyOptions {
    /// Options with defaults for everything but the endpoint and token
    pub fn new(api_endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            token: token.into(),
            validate_certs: true,
            vm_admin_prefix: DEFAULT_VM_ADMIN_PREFIX.to_string(),
            device_admin_prefix: DEFAULT_DEVICE_ADMIN_PREFIX.to_string(),
            device_interface_ignore: DEFAULT_DEVICE_INTERFACE_IGNORE.to_string(),
            config_context: true,
        }
    }

    /// Resolve options from a plugin file, falling back to the process environment
    pub fn from_config(config: &PluginConfig) -> PluginConfigResult<Self> {
        Self::from_config_with_env(config, |name| std::env::var(name).ok())
    }

    /// Resolve options with a custom environment lookup.
    ///
    /// Precedence: file value, then the option's env vars in order, then the
    /// default. Empty env values count as unset.
    pub fn from_config_with_env<F>(config: &PluginConfig, env: F) -> PluginConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !is_rabify(&config.plugin) {
            return Err(PluginConfigError::Invalid(format!(
                "plugin '{}' is not '{}'",
                config.plugin, PLUGIN_NAME
            )));
        }

        let from_env = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| env(*name).filter(|value| !value.is_empty()))
        };

        let api_endpoint = match config.get_string("api_endpoint")? {
            Some(value) => value,
            None => from_env(API_ENDPOINT_ENV)
                .ok_or_else(|| PluginConfigError::MissingField("api_endpoint".to_string()))?,
        };

        let token = match config.get_string("token")? {
            Some(value) => value,
            None => from_env(TOKEN_ENV)
                .ok_or_else(|| PluginConfigError::MissingField("token".to_string()))?,
        };

        let mut options = Self::new(api_endpoint, token);

        if let Some(value) = config.get_bool("validate_certs")? {
            options.validate_certs = value;
        }
        if let Some(value) = config.get_string("vm_admin_prefix")? {
            options.vm_admin_prefix = value;
        }
        if let Some(value) = config.get_string("device_admin_prefix")? {
            options.device_admin_prefix = value;
        }
        if let Some(value) = config.get_string("device_interface_ignore")? {
            options.device_interface_ignore = value;
        }
        if let Some(value) = config.get_bool("config_context")? {
            options.config_context = value;
        }

        Ok(options)
    }

    /// Check endpoint and token before any request is made
    pub fn validate(&self) -> PluginConfigResult<()> {
        let url = url::Url::parse(&self.api_endpoint).map_err(|e| {
            PluginConfigError::Invalid(format!("api_endpoint '{}': {}", self.api_endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PluginConfigError::Invalid(format!(
                "api_endpoint '{}' must be an http or https URL",
                self.api_endpoint
            )));
        }
        if self.token.trim().is_empty() {
            return Err(PluginConfigError::Invalid("token is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for RabifyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RabifyOptions")
            .field("api_endpoint", &self.api_endpoint)
            .field("token", &"<redacted>")
            .field("validate_certs", &self.validate_certs)
            .field("vm_admin_prefix", &self.vm_admin_prefix)
            .field("device_admin_prefix", &self.device_admin_prefix)
            .field("device_interface_ignore", &self.device_interface_ignore)
            .field("config_context", &self.config_context)
            .finish()
    }
}

/// Whether a `plugin:` value selects this plugin (bare or collection-qualified)
pub fn is_rabify(plugin: &str) -> bool {
    let plugin = plugin.to_lowercase();
    plugin == PLUGIN_NAME || plugin.ends_with(".rabify")
}

// ============================================================================
// Resolution
// ============================================================================

/// Outcome of the two NetBox lookups for one host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Address to use for `ansible_host`
    pub ip: Option<IpAddress>,
    /// Set when the host was found as a virtual machine
    pub virtual_machine_id: Option<u64>,
    /// Set when the host was found as a device
    pub device_id: Option<u64>,
}

impl Resolution {
    /// Whose config context applies; virtual machines take precedence
    pub fn context_owner(&self) -> Option<ContextOwner> {
        self.virtual_machine_id
            .map(ContextOwner::VirtualMachine)
            .or(self.device_id.map(ContextOwner::Device))
    }

    /// `ansible_host` value: selected address without its prefix length
    pub fn ansible_host(&self) -> Option<&str> {
        self.ip.as_ref().map(IpAddress::host_address)
    }
}

/// Result of the device lookup
#[derive(Debug)]
struct DeviceMatch {
    device_id: Option<u64>,
    ip: Option<IpAddress>,
}

/// Last address whose interface is not `ignore`
pub fn select_device_address(addresses: Vec<IpAddress>, ignore: &str) -> Option<IpAddress> {
    addresses
        .into_iter()
        .filter(|addr| addr.interface_name() != Some(ignore))
        .last()
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub hosts: usize,
    pub addresses: usize,
    pub virtual_machines: usize,
    pub devices: usize,
    pub contexts: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hosts, {} addresses set, {} virtual machines, {} devices, {} config contexts merged",
            self.hosts, self.addresses, self.virtual_machines, self.devices, self.contexts
        )
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// NetBox admin-address inventory plugin
pub struct RabifyPlugin {
    options: RabifyOptions,
    api: Arc<dyn NetBoxApi>,
}

impl RabifyPlugin {
    /// Create the plugin with an HTTP client built from `options`
    pub fn new(options: RabifyOptions) -> Result<Self, RabifyError> {
        options.validate()?;
        if !options.validate_certs {
            warn!(
                "rabify: TLS certificate validation disabled for {}",
                options.api_endpoint
            );
        }
        let client = NetBoxClient::new(
            &options.api_endpoint,
            options.token.clone(),
            options.validate_certs,
        )
        .map_err(RabifyError::Client)?;

        Ok(Self::with_api(options, Arc::new(client)))
    }

    /// Create the plugin on top of an existing API implementation
    pub fn with_api(options: RabifyOptions, api: Arc<dyn NetBoxApi>) -> Self {
        Self { options, api }
    }

    /// Create the plugin from a parsed plugin file
    pub fn from_config(config: &PluginConfig) -> Result<Self, RabifyError> {
        Self::new(RabifyOptions::from_config(config)?)
    }

    /// Resolved options
    pub fn options(&self) -> &RabifyOptions {
        &self.options
    }

    async fn lookup_virtual_machine(&self, host: &str) -> Result<Option<IpAddress>, NetBoxError> {
        let filter = IpAddressFilter::virtual_machine(host, self.options.vm_admin_prefix.as_str());
        self.api.get_ip_address(&filter).await
    }

    async fn lookup_device(&self, host: &str) -> Result<DeviceMatch, NetBoxError> {
        let filter = IpAddressFilter::device(host, self.options.device_admin_prefix.as_str());
        let addresses = self.api.filter_ip_addresses(&filter).await?;

        // The owning device normally comes with the addresses; look it up by
        // name only when none of them carries the back-reference.
        let device_id = match addresses.iter().find_map(IpAddress::device_id) {
            Some(id) => Some(id),
            None => match self.api.get_device_by_name(host).await {
                Ok(device) => device.map(|d| d.id),
                Err(e) => {
                    debug!(host, error = %e, "device lookup by name failed");
                    None
                }
            },
        };

        Ok(DeviceMatch {
            device_id,
            ip: select_device_address(addresses, &self.options.device_interface_ignore),
        })
    }

    /// Classify `host` and pick its admin address. Never fails.
    pub async fn resolve_host(&self, host: &str) -> Resolution {
        let mut resolution = Resolution::default();

        match self.lookup_virtual_machine(host).await {
            Ok(Some(ip)) => {
                resolution.virtual_machine_id = ip.virtual_machine_id();
                if resolution.virtual_machine_id.is_none() {
                    debug!(host, address = %ip.address, "VM admin address has no virtual machine reference");
                }
                resolution.ip = Some(ip);
            }
            Ok(None) => debug!(host, "no VM admin address"),
            Err(e) => debug!(host, error = %e, "VM lookup failed, not treating host as a VM"),
        }

        match self.lookup_device(host).await {
            Ok(device) => {
                resolution.device_id = device.device_id;
                if device.device_id.is_none() {
                    debug!(host, "no device named like the host");
                }
                match device.ip {
                    Some(ip) => resolution.ip = Some(ip),
                    None => debug!(host, "no usable device admin address"),
                }
            }
            Err(e) => debug!(host, error = %e, "device address lookup failed, not treating host as a device"),
        }

        resolution
    }

    /// Fetch the config context of `owner` as a JSON object
    pub async fn fetch_config_context(
        &self,
        owner: ContextOwner,
    ) -> Result<serde_json::Map<String, serde_json::Value>, RabifyError> {
        let fail = |reason| RabifyError::ConfigContext { owner, reason };

        let context = match owner {
            ContextOwner::VirtualMachine(id) => self
                .api
                .get_virtual_machine(id)
                .await
                .map(|vm| vm.config_context),
            ContextOwner::Device(id) => self.api.get_device(id).await.map(|dev| dev.config_context),
        }
        .map_err(|e| fail(ConfigContextFailure::Fetch(e)))?;

        match context {
            Some(serde_json::Value::Object(map)) => Ok(map),
            None | Some(serde_json::Value::Null) => Err(fail(ConfigContextFailure::Missing)),
            Some(other) => Err(fail(ConfigContextFailure::NotMapping(json_kind(&other)))),
        }
    }

    /// Enrich every host of `inventory`, one host at a time
    pub async fn run(&self, inventory: &mut Inventory) -> Result<RunSummary, RabifyError> {
        let mut summary = RunSummary::default();
        let hosts: Vec<String> = inventory.host_names().cloned().collect();

        for host in &hosts {
            summary.hosts += 1;
            let resolution = self.resolve_host(host).await;

            if resolution.virtual_machine_id.is_some() {
                summary.virtual_machines += 1;
            }
            if resolution.device_id.is_some() {
                summary.devices += 1;
            }

            if let Some(address) = resolution.ansible_host() {
                debug!(host = host.as_str(), address, "setting ansible_host");
                inventory.set_variable(
                    host,
                    ANSIBLE_HOST,
                    serde_yaml::Value::String(address.to_string()),
                )?;
                summary.addresses += 1;
            }

            if !self.options.config_context {
                continue;
            }

            if let Some(owner) = resolution.context_owner() {
                let context = self.fetch_config_context(owner).await?;
                debug!(host = host.as_str(), %owner, keys = context.len(), "merging config context");
                for (key, value) in &context {
                    inventory.set_variable(host, key, json_to_yaml(value))?;
                }
                summary.contexts += 1;
            }
        }

        info!("rabify: {}", summary);
        Ok(summary)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}

impl fmt::Debug for RabifyPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RabifyPlugin")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InventoryPlugin for RabifyPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn description(&self) -> &str {
        "Sets ansible_host to the NetBox admin address and merges NetBox config context"
    }

    fn verify(&self) -> InventoryResult<()> {
        self.options.validate().map_err(|e| InventoryError::Plugin {
            plugin: PLUGIN_NAME.to_string(),
            source: Box::new(e),
        })
    }

    async fn parse(&self, inventory: &mut Inventory) -> InventoryResult<()> {
        self.run(inventory)
            .await
            .map(|_| ())
            .map_err(|e| InventoryError::Plugin {
                plugin: PLUGIN_NAME.to_string(),
                source: Box::new(e),
            })
    }

    fn supported_options(&self) -> Vec<PluginOptionInfo> {
        options_documentation()
    }
}

/// Documentation for every option the plugin reads
pub fn options_documentation() -> Vec<PluginOptionInfo> {
    vec![
        PluginOptionInfo::required_string("plugin", "Token that marks this file as a rabify source; must be 'rabify'"),
        PluginOptionInfo::required_string("api_endpoint", "Endpoint of the NetBox API")
            .with_env_var(API_ENDPOINT_ENV[0]),
        PluginOptionInfo::required_string("token", "NetBox API token")
            .with_env_var(TOKEN_ENV[0])
            .with_env_var(TOKEN_ENV[1]),
        PluginOptionInfo::optional_bool(
            "validate_certs",
            "Verify the NetBox TLS certificate; set to false for untrusted certificates",
            true,
        ),
        PluginOptionInfo::optional_string(
            "vm_admin_prefix",
            "CIDR that VMs are expected to have their management interface in",
            DEFAULT_VM_ADMIN_PREFIX,
        ),
        PluginOptionInfo::optional_string(
            "device_admin_prefix",
            "CIDR that devices are expected to have their management interface in",
            DEFAULT_DEVICE_ADMIN_PREFIX,
        ),
        PluginOptionInfo::optional_string(
            "device_interface_ignore",
            "Ignore device interfaces with this name",
            DEFAULT_DEVICE_INTERFACE_IGNORE,
        ),
        PluginOptionInfo::optional_bool(
            "config_context",
            "Merge the NetBox config context of the VM or device into host variables",
            true,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Host;
    use crate::netbox::{AssignedInterface, Device, MockNetBoxApi, NestedEntity, VirtualMachine};
    use serde_json::json;
    use std::collections::HashMap;

    fn vm_ip(id: u64, address: &str, vm_id: u64) -> IpAddress {
        IpAddress {
            id,
            address: address.to_string(),
            assigned_object: Some(AssignedInterface {
                id: id + 100,
                name: Some("eth0".to_string()),
                device: None,
                virtual_machine: Some(NestedEntity { id: vm_id, name: None }),
            }),
        }
    }

    fn device_ip(id: u64, address: &str, interface: &str, device_id: u64) -> IpAddress {
        IpAddress {
            id,
            address: address.to_string(),
            assigned_object: Some(AssignedInterface {
                id: id + 100,
                name: Some(interface.to_string()),
                device: Some(NestedEntity { id: device_id, name: None }),
                virtual_machine: None,
            }),
        }
    }

    /// Device address as returned by brief serializers: no owner reference
    fn unowned_ip(id: u64, address: &str, interface: &str) -> IpAddress {
        IpAddress {
            id,
            address: address.to_string(),
            assigned_object: Some(AssignedInterface {
                id: id + 100,
                name: Some(interface.to_string()),
                device: None,
                virtual_machine: None,
            }),
        }
    }

    fn device(id: u64, context: Option<serde_json::Value>) -> Device {
        Device {
            id,
            name: Some("srv-01".to_string()),
            config_context: context,
        }
    }

    fn options(config_context: bool) -> RabifyOptions {
        let mut opts = RabifyOptions::new("https://netbox.example.org", "secret");
        opts.config_context = config_context;
        opts
    }

    fn inventory_with(hosts: &[&str]) -> Inventory {
        let mut inventory = Inventory::new();
        for name in hosts {
            inventory.add_host(Host::new(*name)).unwrap();
        }
        inventory
    }

    // ------------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------------

    #[test]
    fn test_options_defaults() {
        let config = PluginConfig::new("rabify")
            .with_option("api_endpoint", "https://netbox.example.org")
            .with_option("token", "abc");
        let opts = RabifyOptions::from_config_with_env(&config, |_| None).unwrap();

        assert_eq!(opts, RabifyOptions::new("https://netbox.example.org", "abc"));
        assert!(opts.validate_certs);
        assert!(opts.config_context);
        assert_eq!(opts.vm_admin_prefix, "10.136.0.0/16");
        assert_eq!(opts.device_admin_prefix, "10.128.0.0/16");
        assert_eq!(opts.device_interface_ignore, "IPMI");
    }

    #[test]
    fn test_options_env_fallback_order() {
        let env: HashMap<&str, &str> = [
            ("NETBOX_API", "https://from-env.example.org"),
            ("NETBOX_TOKEN", "token-one"),
            ("NETBOX_API_KEY", "token-two"),
        ]
        .into_iter()
        .collect();
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());

        let opts = RabifyOptions::from_config_with_env(&PluginConfig::new("rabify"), lookup).unwrap();
        assert_eq!(opts.api_endpoint, "https://from-env.example.org");
        assert_eq!(opts.token, "token-one");

        let only_key = |name: &str| match name {
            "NETBOX_API" => Some("https://x.example.org".to_string()),
            "NETBOX_TOKEN" => Some(String::new()),
            "NETBOX_API_KEY" => Some("token-two".to_string()),
            _ => None,
        };
        let opts = RabifyOptions::from_config_with_env(&PluginConfig::new("rabify"), only_key).unwrap();
        assert_eq!(opts.token, "token-two");
    }

    #[test]
    fn test_options_file_beats_env() {
        let config = PluginConfig::new("rabify")
            .with_option("api_endpoint", "https://file.example.org")
            .with_option("token", "file-token")
            .with_option("config_context", false)
            .with_option("device_interface_ignore", "BMC");
        let opts = RabifyOptions::from_config_with_env(&config, |_| Some("env".to_string())).unwrap();

        assert_eq!(opts.api_endpoint, "https://file.example.org");
        assert_eq!(opts.token, "file-token");
        assert!(!opts.config_context);
        assert_eq!(opts.device_interface_ignore, "BMC");
    }

    #[test]
    fn test_options_missing_required() {
        let config = PluginConfig::new("rabify").with_option("api_endpoint", "https://x");
        let err = RabifyOptions::from_config_with_env(&config, |_| None).unwrap_err();
        assert!(matches!(err, PluginConfigError::MissingField(f) if f == "token"));
    }

    #[test]
    fn test_options_wrong_plugin() {
        let config = PluginConfig::new("aws_ec2")
            .with_option("api_endpoint", "https://x")
            .with_option("token", "t");
        assert!(RabifyOptions::from_config_with_env(&config, |_| None).is_err());
        assert!(is_rabify("rabe.netbox.rabify"));
    }

    #[test]
    fn test_options_validate() {
        assert!(options(true).validate().is_ok());
        assert!(RabifyOptions::new("netbox.example.org", "t").validate().is_err());
        assert!(RabifyOptions::new("ftp://netbox.example.org", "t").validate().is_err());
        assert!(RabifyOptions::new("https://netbox.example.org", "  ").validate().is_err());
    }

    #[test]
    fn test_options_debug_hides_token() {
        let rendered = format!("{:?}", options(true));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    // ------------------------------------------------------------------------
    // Address selection
    // ------------------------------------------------------------------------

    #[test]
    fn test_select_device_address_last_wins() {
        let addresses = vec![
            device_ip(1, "10.128.0.1/16", "eno1", 5),
            device_ip(2, "10.128.0.2/16", "IPMI", 5),
            device_ip(3, "10.128.0.3/16", "eno2", 5),
            device_ip(4, "10.128.0.4/16", "IPMI", 5),
        ];
        let selected = select_device_address(addresses, "IPMI").unwrap();
        assert_eq!(selected.address, "10.128.0.3/16");
    }

    #[test]
    fn test_select_device_address_only_ignored() {
        let addresses = vec![device_ip(1, "10.128.0.1/16", "IPMI", 5)];
        assert_eq!(select_device_address(addresses, "IPMI"), None);
        assert_eq!(select_device_address(Vec::new(), "IPMI"), None);
    }

    #[test]
    fn test_context_owner_prefers_vm() {
        let both = Resolution {
            ip: None,
            virtual_machine_id: Some(3),
            device_id: Some(9),
        };
        assert_eq!(both.context_owner(), Some(ContextOwner::VirtualMachine(3)));

        let device_only = Resolution {
            device_id: Some(9),
            ..Default::default()
        };
        assert_eq!(device_only.context_owner(), Some(ContextOwner::Device(9)));
        assert_eq!(Resolution::default().context_owner(), None);
    }

    // ------------------------------------------------------------------------
    // Resolver
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_vm_only_host() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .withf(|f| f == &IpAddressFilter::virtual_machine("vm-01", "10.136.0.0/16"))
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses()
            .returning(|_| Err(NetBoxError::Api { status: 400, body: "unknown device".into() }));
        api.expect_get_virtual_machine().never();
        api.expect_get_device().never();

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let mut inventory = inventory_with(&["vm-01"]);
        let summary = plugin.run(&mut inventory).await.unwrap();

        let host = inventory.get_host("vm-01").unwrap();
        assert_eq!(host.ansible_host.as_deref(), Some("10.136.1.9"));
        assert!(host.vars.is_empty());
        assert_eq!(summary.virtual_machines, 1);
        assert_eq!(summary.devices, 0);
    }

    #[tokio::test]
    async fn test_device_overrides_vm() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses()
            .withf(|f| f == &IpAddressFilter::device("dual", "10.128.0.0/16"))
            .returning(|_| {
                Ok(vec![
                    device_ip(2, "10.128.4.5/16", "eno1", 7),
                    device_ip(3, "10.128.4.6/16", "eno2", 7),
                    device_ip(4, "10.128.4.7/16", "IPMI", 7),
                ])
            });
        api.expect_get_device_by_name()
            .withf(|name| name == "dual")
            .returning(|_| Ok(Some(device(7, None))));

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let resolution = plugin.resolve_host("dual").await;

        assert_eq!(resolution.ansible_host(), Some("10.128.4.6"));
        assert_eq!(resolution.virtual_machine_id, Some(42));
        assert_eq!(resolution.device_id, Some(7));
    }

    #[tokio::test]
    async fn test_ignored_interface_keeps_vm_address() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses()
            .returning(|_| Ok(vec![device_ip(2, "10.128.4.5/16", "IPMI", 7)]));
        api.expect_get_device_by_name()
            .returning(|_| Ok(Some(device(7, None))));

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let resolution = plugin.resolve_host("odd").await;

        assert_eq!(resolution.ansible_host(), Some("10.136.1.9"));
        assert_eq!(resolution.device_id, Some(7));
    }

    #[tokio::test]
    async fn test_device_with_no_addresses_is_still_classified() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address().returning(|_| Ok(None));
        api.expect_filter_ip_addresses().returning(|_| Ok(Vec::new()));
        api.expect_get_device_by_name()
            .returning(|_| Ok(Some(device(11, None))));

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let resolution = plugin.resolve_host("switch-01").await;

        assert_eq!(resolution.ip, None);
        assert_eq!(resolution.virtual_machine_id, None);
        assert_eq!(resolution.context_owner(), Some(ContextOwner::Device(11)));
    }

    #[tokio::test]
    async fn test_device_address_used_without_device_object() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address().returning(|_| Ok(None));
        api.expect_filter_ip_addresses()
            .returning(|_| Ok(vec![unowned_ip(2, "10.128.4.5/16", "eno1")]));
        api.expect_get_device_by_name().times(1).returning(|_| Ok(None));

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let resolution = plugin.resolve_host("ghost").await;

        assert_eq!(resolution.ansible_host(), Some("10.128.4.5"));
        assert_eq!(resolution.device_id, None);
        assert_eq!(resolution.context_owner(), None);
    }

    #[tokio::test]
    async fn test_device_name_lookup_error_keeps_device_address() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses()
            .returning(|_| Ok(vec![unowned_ip(2, "10.128.4.5/16", "eno1")]));
        api.expect_get_device_by_name().returning(|_| {
            Err(NetBoxError::MultipleResults {
                endpoint: "devices".into(),
                count: 2,
            })
        });

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let resolution = plugin.resolve_host("dual").await;

        assert_eq!(resolution.ansible_host(), Some("10.128.4.5"));
        assert_eq!(resolution.virtual_machine_id, Some(42));
        assert_eq!(resolution.device_id, None);
    }

    #[tokio::test]
    async fn test_device_id_taken_from_address_reference() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address().returning(|_| Ok(None));
        api.expect_filter_ip_addresses().returning(|_| {
            Ok(vec![
                unowned_ip(1, "10.128.4.4/16", "eno0"),
                device_ip(2, "10.128.4.5/16", "eno1", 7),
            ])
        });
        api.expect_get_device_by_name().never();

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let resolution = plugin.resolve_host("srv-01").await;

        assert_eq!(resolution.ansible_host(), Some("10.128.4.5"));
        assert_eq!(resolution.context_owner(), Some(ContextOwner::Device(7)));
    }

    #[tokio::test]
    async fn test_both_lookups_fail() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address().returning(|_| {
            Err(NetBoxError::MultipleResults {
                endpoint: "ip-addresses".into(),
                count: 2,
            })
        });
        api.expect_filter_ip_addresses()
            .returning(|_| Err(NetBoxError::Authentication("403 Forbidden".into())));
        api.expect_get_device_by_name().never();
        api.expect_get_virtual_machine().never();
        api.expect_get_device().never();

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));
        let mut inventory = inventory_with(&["broken"]);
        let summary = plugin.run(&mut inventory).await.unwrap();

        let host = inventory.get_host("broken").unwrap();
        assert_eq!(host.ansible_host, None);
        assert!(host.vars.is_empty());
        assert_eq!(summary.contexts, 0);
        assert_eq!(summary.addresses, 0);
    }

    // ------------------------------------------------------------------------
    // Config context
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_config_context_merged_for_device() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address().returning(|_| Ok(None));
        api.expect_filter_ip_addresses()
            .returning(|_| Ok(vec![device_ip(2, "10.128.4.5/24", "eno1", 7)]));
        api.expect_get_device_by_name()
            .returning(|_| Ok(Some(device(7, None))));
        api.expect_get_device()
            .withf(|id| *id == 7)
            .times(1)
            .returning(|id| {
                Ok(device(
                    id,
                    Some(json!({"ntp_servers": ["10.1.1.1"], "syslog": {"port": 514}, "ansible_user": "ops"})),
                ))
            });

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));
        let mut inventory = inventory_with(&["srv-01"]);
        inventory
            .set_variable("srv-01", "ansible_user", serde_yaml::Value::String("root".into()))
            .unwrap();
        let summary = plugin.run(&mut inventory).await.unwrap();

        let host = inventory.get_host("srv-01").unwrap();
        assert_eq!(host.ansible_host.as_deref(), Some("10.128.4.5"));
        assert_eq!(
            host.get_var("ansible_user"),
            Some(serde_yaml::Value::String("ops".into()))
        );
        assert_eq!(
            host.get_var("syslog"),
            Some(serde_yaml::from_str("port: 514").unwrap())
        );
        assert!(host.has_var("ntp_servers"));
        assert_eq!(summary.contexts, 1);
    }

    #[tokio::test]
    async fn test_config_context_keeps_key_order() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address().returning(|_| Ok(None));
        api.expect_filter_ip_addresses()
            .returning(|_| Ok(vec![device_ip(2, "10.128.4.5/24", "eno1", 7)]));
        api.expect_get_device().returning(|id| {
            Ok(device(
                id,
                Some(serde_json::from_str(r#"{"zone": "b", "mtu": 9000, "alpha": true}"#).unwrap()),
            ))
        });

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));
        let mut inventory = inventory_with(&["srv-01"]);
        plugin.run(&mut inventory).await.unwrap();

        let host = inventory.get_host("srv-01").unwrap();
        let keys: Vec<&str> = host.vars.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zone", "mtu", "alpha"]);
    }

    #[tokio::test]
    async fn test_config_context_prefers_vm() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses().returning(|_| Ok(Vec::new()));
        api.expect_get_device_by_name()
            .returning(|_| Ok(Some(device(7, None))));
        api.expect_get_virtual_machine().times(1).returning(|id| {
            Ok(VirtualMachine {
                id,
                name: "both".into(),
                config_context: Some(json!({"source": "vm"})),
            })
        });
        api.expect_get_device().never();

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));
        let mut inventory = inventory_with(&["both"]);
        plugin.run(&mut inventory).await.unwrap();

        assert_eq!(
            inventory.get_host("both").unwrap().get_var("source"),
            Some(serde_yaml::Value::String("vm".into()))
        );
    }

    #[tokio::test]
    async fn test_config_context_disabled() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses().returning(|_| Ok(Vec::new()));
        api.expect_get_device_by_name().returning(|_| Ok(None));
        api.expect_get_virtual_machine().never();
        api.expect_get_device().never();

        let plugin = RabifyPlugin::with_api(options(false), Arc::new(api));
        let mut inventory = inventory_with(&["vm-01"]);
        plugin.run(&mut inventory).await.unwrap();

        let host = inventory.get_host("vm-01").unwrap();
        assert_eq!(host.all_vars().len(), 1);
        assert_eq!(host.ansible_host.as_deref(), Some("10.136.1.9"));
    }

    #[tokio::test]
    async fn test_config_context_fetch_failure_aborts_run() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses().returning(|_| Ok(Vec::new()));
        api.expect_get_device_by_name().returning(|_| Ok(None));
        api.expect_get_virtual_machine()
            .returning(|id| Err(NetBoxError::NotFound(format!("virtual machine {}", id))));

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));
        let mut inventory = inventory_with(&["vm-01", "vm-02"]);
        let err = plugin.run(&mut inventory).await.unwrap_err();

        assert!(matches!(
            err,
            RabifyError::ConfigContext {
                owner: ContextOwner::VirtualMachine(42),
                reason: ConfigContextFailure::Fetch(_),
            }
        ));
        // The run stops at the first host; the second is never touched
        assert_eq!(inventory.get_host("vm-02").unwrap().ansible_host, None);
    }

    #[tokio::test]
    async fn test_config_context_absent_is_an_error() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_device().returning(|id| Ok(device(id, None)));
        api.expect_get_virtual_machine().returning(|id| {
            Ok(VirtualMachine {
                id,
                name: "vm".into(),
                config_context: Some(json!(["not", "a", "map"])),
            })
        });

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));

        let err = plugin
            .fetch_config_context(ContextOwner::Device(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RabifyError::ConfigContext { reason: ConfigContextFailure::Missing, .. }
        ));

        let err = plugin
            .fetch_config_context(ContextOwner::VirtualMachine(4))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "config context of virtual machine 4 could not be merged: config_context is a list, not a mapping"
        );
    }

    #[tokio::test]
    async fn test_parse_wraps_errors() {
        let mut api = MockNetBoxApi::new();
        api.expect_get_ip_address()
            .returning(|_| Ok(Some(vm_ip(1, "10.136.1.9/16", 42))));
        api.expect_filter_ip_addresses().returning(|_| Ok(Vec::new()));
        api.expect_get_device_by_name().returning(|_| Ok(None));
        api.expect_get_virtual_machine()
            .returning(|_| Err(NetBoxError::Api { status: 500, body: "boom".into() }));

        let plugin = RabifyPlugin::with_api(options(true), Arc::new(api));
        let mut inventory = inventory_with(&["vm-01"]);
        let err = plugin.parse(&mut inventory).await.unwrap_err();

        assert!(matches!(err, InventoryError::Plugin { ref plugin, .. } if plugin == "rabify"));
        assert_eq!(plugin.name(), "rabify");
        assert_eq!(plugin.supported_options().len(), 8);
    }
}
