//! NetBox API trait
//!
//! The inventory plugin talks to NetBox only through [`NetBoxApi`], so tests
//! can swap the HTTP client for a mock.

use super::error::NetBoxError;
use super::models::{Device, IpAddress, VirtualMachine};
use async_trait::async_trait;

/// Which object an IP address must be bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpOwner {
    /// `virtual_machine=<name>`
    VirtualMachine(String),
    /// `device=<name>`
    Device(String),
}

/// Filter for `/api/ipam/ip-addresses/`: owner plus containing prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAddressFilter {
    pub owner: IpOwner,
    /// Parent prefix in CIDR notation (`parent=` query parameter)
    pub parent: String,
}

impl IpAddressFilter {
    /// Addresses of the named virtual machine inside `parent`
    pub fn virtual_machine(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            owner: IpOwner::VirtualMachine(name.into()),
            parent: parent.into(),
        }
    }

    /// Addresses of the named device inside `parent`
    pub fn device(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            owner: IpOwner::Device(name.into()),
            parent: parent.into(),
        }
    }

    /// Query parameters in the order NetBox documents them
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let owner = match &self.owner {
            IpOwner::VirtualMachine(name) => ("virtual_machine", name.as_str()),
            IpOwner::Device(name) => ("device", name.as_str()),
        };
        vec![owner, ("parent", self.parent.as_str())]
    }
}

/// Read-only NetBox operations used by the inventory plugin
///
/// All methods must be `Send` so the plugin can run on a multi-threaded
/// runtime.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetBoxApi: Send + Sync {
    /// Single IP address matching `filter`.
    ///
    /// `Ok(None)` when nothing matches, [`NetBoxError::MultipleResults`]
    /// when more than one object does.
    async fn get_ip_address(&self, filter: &IpAddressFilter)
        -> Result<Option<IpAddress>, NetBoxError>;

    /// Every IP address matching `filter`, across all pages, in API order
    async fn filter_ip_addresses(
        &self,
        filter: &IpAddressFilter,
    ) -> Result<Vec<IpAddress>, NetBoxError>;

    /// Device with exactly this name, if any
    async fn get_device_by_name(&self, name: &str) -> Result<Option<Device>, NetBoxError>;

    /// Device by id, including its rendered config context
    async fn get_device(&self, id: u64) -> Result<Device, NetBoxError>;

    /// Virtual machine by id, including its rendered config context
    async fn get_virtual_machine(&self, id: u64) -> Result<VirtualMachine, NetBoxError>;
}
