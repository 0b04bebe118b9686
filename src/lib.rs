//! # rabify - NetBox admin-address inventory plugin
//!
//! Runs over an inventory that an upstream source already produced and, for
//! each host, sets `ansible_host` to the host's management address recorded
//! in NetBox. When enabled, the NetBox config context of the matching virtual
//! machine or device is merged into the host's variables.
//!
//! ## Layout
//!
//! - [`inventory`]: hosts, groups, loading, the [`InventoryPlugin`] trait and
//!   the `rabify` plugin itself
//! - [`netbox`]: the read-only REST client and the [`NetBoxApi`] trait the
//!   plugin consumes
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rabify::prelude::*;
//!
//! let mut inventory = Inventory::load("hosts.yml")?;
//! let options = RabifyOptions::from_config(&PluginConfig::from_file(Path::new("rabify.yml"))?)?;
//! let summary = RabifyPlugin::new(options)?.run(&mut inventory).await?;
//! println!("{}", summary);
//! ```
//!
//! [`InventoryPlugin`]: inventory::InventoryPlugin
//! [`NetBoxApi`]: netbox::NetBoxApi

pub mod inventory;
pub mod netbox;

/// Commonly used types
pub mod prelude {
    pub use crate::inventory::plugins::{
        PluginConfig, RabifyError, RabifyOptions, RabifyPlugin, RunSummary,
    };
    pub use crate::inventory::{Group, Host, Inventory, InventoryError, InventoryPlugin};
    pub use crate::netbox::{NetBoxApi, NetBoxClient, NetBoxError};
}
