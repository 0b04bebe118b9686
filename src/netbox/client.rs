//! NetBox API client
//!
//! Thin reqwest wrapper over the handful of read-only endpoints the inventory
//! plugin needs. Every request carries `Authorization: Token <token>`.

use super::api::{IpAddressFilter, NetBoxApi};
use super::error::NetBoxError;
use super::models::{Device, IpAddress, PaginatedResponse, VirtualMachine};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

const IP_ADDRESSES: &str = "api/ipam/ip-addresses/";
const DEVICES: &str = "api/dcim/devices/";
const VIRTUAL_MACHINES: &str = "api/virtualization/virtual-machines/";

/// Longest response excerpt carried in error messages
const BODY_EXCERPT: usize = 500;

/// NetBox API client
#[derive(Debug, Clone)]
pub struct NetBoxClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl NetBoxClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - NetBox root URL (e.g. `https://netbox.example.org`), without `/api`
    /// * `token` - API token
    /// * `validate_certs` - verify the server's TLS certificate
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        validate_certs: bool,
    ) -> Result<Self, NetBoxError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(!validate_certs)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Root URL all endpoints are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, NetBoxError> {
        Ok(self.base_url.join(path)?)
    }

    fn ip_address_url(&self, filter: &IpAddressFilter) -> Result<Url, NetBoxError> {
        let mut url = self.endpoint(IP_ADDRESSES)?;
        url.query_pairs_mut().extend_pairs(filter.query_pairs());
        Ok(url)
    }

    /// GET `url` and decode the JSON body.
    ///
    /// `what` names the object for not-found errors.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, NetBoxError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(NetBoxError::NotFound(what.to_string()));
        }

        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NetBoxError::Authentication(format!(
                "{} - {}",
                status,
                excerpt(&body)
            )));
        }

        if !status.is_success() {
            return Err(NetBoxError::Api {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| NetBoxError::Decode {
            url: url.to_string(),
            message: format!("{} - Response (first {} chars): {}", e, BODY_EXCERPT, excerpt(&body)),
        })
    }

    /// Follow `next` links until the last page
    async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        first: Url,
        what: &str,
    ) -> Result<Vec<T>, NetBoxError> {
        let mut all_results = Vec::new();
        let mut url = first;

        loop {
            let page: PaginatedResponse<T> = self.get_json(url, what).await?;
            all_results.extend(page.results);

            match page.next {
                // NetBox normally returns absolute links; relative ones resolve against the root
                Some(next) => url = self.base_url.join(&next)?,
                None => break,
            }
        }

        Ok(all_results)
    }

    /// First page of a list query, enforcing "at most one match"
    async fn get_single<T: DeserializeOwned>(
        &self,
        url: Url,
        what: &str,
    ) -> Result<Option<T>, NetBoxError> {
        let page: PaginatedResponse<T> = self.get_json(url, what).await?;

        if page.count > 1 || page.results.len() > 1 {
            return Err(NetBoxError::MultipleResults {
                endpoint: what.to_string(),
                count: page.count.max(page.results.len() as u64),
            });
        }

        Ok(page.results.into_iter().next())
    }
}

#[async_trait]
impl NetBoxApi for NetBoxClient {
    async fn get_ip_address(
        &self,
        filter: &IpAddressFilter,
    ) -> Result<Option<IpAddress>, NetBoxError> {
        let url = self.ip_address_url(filter)?;
        self.get_single(url, "ip-addresses").await
    }

    async fn filter_ip_addresses(
        &self,
        filter: &IpAddressFilter,
    ) -> Result<Vec<IpAddress>, NetBoxError> {
        let url = self.ip_address_url(filter)?;
        self.fetch_all_pages(url, "ip-addresses").await
    }

    async fn get_device_by_name(&self, name: &str) -> Result<Option<Device>, NetBoxError> {
        let mut url = self.endpoint(DEVICES)?;
        url.query_pairs_mut().append_pair("name", name);
        self.get_single(url, "devices").await
    }

    async fn get_device(&self, id: u64) -> Result<Device, NetBoxError> {
        let url = self.endpoint(&format!("{}{}/", DEVICES, id))?;
        self.get_json(url, &format!("device {}", id)).await
    }

    async fn get_virtual_machine(&self, id: u64) -> Result<VirtualMachine, NetBoxError> {
        let url = self.endpoint(&format!("{}{}/", VIRTUAL_MACHINES, id))?;
        self.get_json(url, &format!("virtual machine {}", id)).await
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}
