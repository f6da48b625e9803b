//! Remote geolocation over HTTP (ip-api.com JSON API)

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

use crate::models::Location;
use crate::tracking::geo::{GeoError, GeoResolver};

/// `GET {base}/{ip}` response body
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
}

pub struct RemoteResolver {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteResolver {
    /// `timeout` bounds the whole request, connect included
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build geolocation HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, ip: IpAddr) -> String {
        format!("{}/{}", self.base_url, ip)
    }
}

#[async_trait]
impl GeoResolver for RemoteResolver {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn resolve(&self, ip: IpAddr) -> Result<Location, GeoError> {
        let body: IpApiResponse = self
            .client
            .get(self.url_for(ip))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(status) = body.status.as_deref() {
            if status != "success" {
                return Err(GeoError::Upstream(
                    body.message.unwrap_or_else(|| status.to_string()),
                ));
            }
        }

        Ok(Location::from_parts(
            body.country.as_deref(),
            body.region_name.as_deref(),
            body.city.as_deref(),
        ))
    }
}
