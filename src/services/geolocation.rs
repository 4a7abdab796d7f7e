//! IP geolocation lookups
//!
//! Best-effort: every failure path produces a placeholder location.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeolocationConfig;
use crate::models::GeoLocation;
use crate::services::ip_resolver::is_private_ip;

/// Response shape of ip-api.com compatible endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

/// Client for the third-party geolocation API
pub struct GeoLocator {
    client: Option<Client>,
    api_url: String,
}

impl GeoLocator {
    pub fn new(config: &GeolocationConfig) -> Result<Self> {
        let client = if config.enabled {
            Some(
                Client::builder()
                    .timeout(Duration::from_secs(config.timeout_secs))
                    .connect_timeout(Duration::from_secs(config.timeout_secs))
                    .user_agent(concat!("lms-admin/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .context("Failed to build geolocation HTTP client")?,
            )
        } else {
            None
        };

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    /// A locator that never makes network calls
    pub fn disabled() -> Self {
        Self {
            client: None,
            api_url: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Look up the location of `ip`
    ///
    /// Private and loopback addresses resolve locally to a "Private Network"
    /// placeholder without touching the network.
    pub async fn lookup(&self, ip: &str) -> GeoLocation {
        let addr = match ip.parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => return GeoLocation::unknown(),
        };

        if is_private_ip(&addr) {
            return GeoLocation::private_network();
        }

        let Some(client) = self.client.as_ref() else {
            return GeoLocation::unknown();
        };

        match self.fetch(client, &addr).await {
            Ok(location) => location,
            Err(e) => {
                warn!(ip = %addr, error = %e, "Geolocation lookup failed");
                GeoLocation::unknown()
            }
        }
    }

    async fn fetch(&self, client: &Client, addr: &IpAddr) -> Result<GeoLocation> {
        let url = self.api_url.replace("{ip}", &addr.to_string());
        debug!(url = %url, "Requesting geolocation");

        let response = client
            .get(&url)
            .send()
            .await
            .context("Geolocation request failed")?
            .error_for_status()
            .context("Geolocation API returned an error status")?;

        let body: LookupResponse = response
            .json()
            .await
            .context("Malformed geolocation response")?;

        if let Some(status) = body.status.as_deref() {
            if status != "success" {
                anyhow::bail!(
                    "Geolocation API reported {}: {}",
                    status,
                    body.message.as_deref().unwrap_or("no message")
                );
            }
        }

        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Ok(GeoLocation::resolved(
            non_empty(body.city),
            non_empty(body.region_name),
            non_empty(body.country),
            non_empty(body.country_code),
        ))
    }
}
