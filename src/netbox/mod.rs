//! NetBox REST API access
//!
//! Read-only client for the IPAM, DCIM and virtualization endpoints the
//! `rabify` inventory plugin consults.
//!
//! ```rust,ignore
//! use rabify::netbox::{IpAddressFilter, NetBoxApi, NetBoxClient};
//!
//! let client = NetBoxClient::new("https://netbox.example.org", token, true)?;
//! let ips = client
//!     .filter_ip_addresses(&IpAddressFilter::device("srv-01", "10.128.0.0/16"))
//!     .await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod models;

pub use api::{IpAddressFilter, IpOwner, NetBoxApi};
#[cfg(test)]
pub use api::MockNetBoxApi;
pub use client::NetBoxClient;
pub use error::NetBoxError;
pub use models::{AssignedInterface, Device, IpAddress, NestedEntity, PaginatedResponse, VirtualMachine};
