//! NetBox API models
//!
//! Only the fields the inventory plugin reads are modelled. Unknown fields in
//! NetBox responses are ignored, so these types work against both brief and
//! full serializers.

use serde::{Deserialize, Serialize};

/// Paginated list wrapper returned by every NetBox list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Reference to a device or virtual machine as nested inside other objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedEntity {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Interface an IP address is assigned to
///
/// NetBox serializes this as `assigned_object`; releases before 2.9 used
/// `interface`, which is accepted as an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedInterface {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device: Option<NestedEntity>,
    #[serde(default)]
    pub virtual_machine: Option<NestedEntity>,
}

/// IP address object (`/api/ipam/ip-addresses/`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: u64,
    /// Address in CIDR notation, e.g. `10.128.4.5/24`
    pub address: String,
    #[serde(default, alias = "interface")]
    pub assigned_object: Option<AssignedInterface>,
}

impl IpAddress {
    /// Address with the prefix length removed (`10.128.4.5/24` -> `10.128.4.5`)
    pub fn host_address(&self) -> &str {
        self.address
            .split_once('/')
            .map_or(self.address.as_str(), |(addr, _)| addr)
    }

    /// Name of the interface this address is bound to
    pub fn interface_name(&self) -> Option<&str> {
        self.assigned_object
            .as_ref()
            .and_then(|iface| iface.name.as_deref())
    }

    /// Id of the virtual machine owning the interface, if any
    pub fn virtual_machine_id(&self) -> Option<u64> {
        self.assigned_object
            .as_ref()
            .and_then(|iface| iface.virtual_machine.as_ref())
            .map(|vm| vm.id)
    }

    /// Id of the device owning the interface, if any
    pub fn device_id(&self) -> Option<u64> {
        self.assigned_object
            .as_ref()
            .and_then(|iface| iface.device.as_ref())
            .map(|dev| dev.id)
    }
}

/// Device object (`/api/dcim/devices/`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Rendered config context; only present on full (non-brief) responses
    #[serde(default)]
    pub config_context: Option<serde_json::Value>,
}

/// Virtual machine object (`/api/virtualization/virtual-machines/`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub config_context: Option<serde_json::Value>,
}
