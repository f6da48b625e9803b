//! Geolocation resolution
//!
//! A [`GeoResolver`] performs one lookup and reports failures as
//! [`GeoError`]. [`GeoService`] owns the policy around it: lookup-address
//! normalisation and conversion of every failure into an all-"Unknown"
//! [`Location`].

use anyhow::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{GeoBackend, GeoConfig};
use crate::models::Location;
use crate::tracking::geoip::MaxMindResolver;
use crate::tracking::ip_extractor::lookup_ip;
use crate::tracking::remote::RemoteResolver;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("no location known for {0}")]
    NotFound(IpAddr),
    #[error("lookup service rejected the request: {0}")]
    Upstream(String),
    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geolocation database error: {0}")]
    Database(#[from] maxminddb::MaxMindDbError),
    #[error("geolocation is disabled")]
    Disabled,
}

#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    async fn resolve(&self, ip: IpAddr) -> Result<Location, GeoError>;
}

/// Resolver used when geolocation is turned off
pub struct DisabledResolver;

#[async_trait]
impl GeoResolver for DisabledResolver {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn resolve(&self, _ip: IpAddr) -> Result<Location, GeoError> {
        Err(GeoError::Disabled)
    }
}

pub struct GeoService {
    resolver: Arc<dyn GeoResolver>,
    placeholder_ip: IpAddr,
}

impl GeoService {
    pub fn new(resolver: Arc<dyn GeoResolver>, placeholder_ip: IpAddr) -> Self {
        Self {
            resolver,
            placeholder_ip,
        }
    }

    /// Build the service for the configured backend
    pub fn from_config(config: &GeoConfig) -> Result<Self> {
        let resolver: Arc<dyn GeoResolver> = match config.backend {
            GeoBackend::Remote => Arc::new(RemoteResolver::new(
                &config.api_url,
                Duration::from_secs(config.timeout_secs),
            )?),
            GeoBackend::Maxmind => {
                let path = config
                    .mmdb_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("GEOIP_DB_PATH is required for the maxmind backend"))?;
                Arc::new(MaxMindResolver::new(path)?)
            }
            GeoBackend::None => Arc::new(DisabledResolver),
        };

        info!(
            backend = resolver.name(),
            placeholder = %config.placeholder_ip,
            "Geolocation configured"
        );

        Ok(Self::new(resolver, config.placeholder_ip))
    }

    pub fn backend_name(&self) -> &'static str {
        self.resolver.name()
    }

    /// Address actually sent to the resolver for a raw client IP
    pub fn lookup_ip(&self, raw_ip: &str) -> Option<IpAddr> {
        lookup_ip(raw_ip, self.placeholder_ip)
    }

    /// Best-effort location of a raw client IP; never fails
    pub async fn locate(&self, raw_ip: &str) -> Location {
        let Some(ip) = self.lookup_ip(raw_ip) else {
            debug!(raw_ip, "Client address is not an IP, skipping geolocation");
            return Location::unknown();
        };

        match self.resolver.resolve(ip).await {
            Ok(location) => location,
            Err(GeoError::Disabled) => Location::unknown(),
            Err(err) => {
                warn!(
                    backend = self.resolver.name(),
                    lookup_ip = %ip,
                    error = %err,
                    "Geolocation failed, recording unknown location"
                );
                Location::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingResolver {
        seen: Mutex<Vec<IpAddr>>,
        result: fn(IpAddr) -> Result<Location, GeoError>,
    }

    #[async_trait]
    impl GeoResolver for RecordingResolver {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn resolve(&self, ip: IpAddr) -> Result<Location, GeoError> {
            self.seen.lock().unwrap().push(ip);
            (self.result)(ip)
        }
    }

    fn service(result: fn(IpAddr) -> Result<Location, GeoError>) -> (GeoService, Arc<RecordingResolver>) {
        let resolver = Arc::new(RecordingResolver {
            seen: Mutex::new(Vec::new()),
            result,
        });
        let placeholder: IpAddr = "8.8.8.8".parse().unwrap();
        (GeoService::new(resolver.clone(), placeholder), resolver)
    }

    fn berlin(_ip: IpAddr) -> Result<Location, GeoError> {
        Ok(Location::from_parts(Some("Germany"), Some("Berlin"), Some("Berlin")))
    }

    #[tokio::test]
    async fn test_loopback_resolved_via_placeholder() {
        let (service, resolver) = service(berlin);

        let location = service.locate("127.0.0.1").await;

        assert_eq!(location.country, "Germany");
        assert_eq!(
            resolver.seen.lock().unwrap().as_slice(),
            &["8.8.8.8".parse::<IpAddr>().unwrap()]
        );
    }

    #[tokio::test]
    async fn test_public_address_passed_through() {
        let (service, resolver) = service(berlin);

        service.locate("203.0.113.7").await;

        assert_eq!(
            resolver.seen.lock().unwrap().as_slice(),
            &["203.0.113.7".parse::<IpAddr>().unwrap()]
        );
    }

    #[tokio::test]
    async fn test_failure_becomes_unknown() {
        let (service, _) = service(|ip| Err(GeoError::NotFound(ip)));

        assert!(service.locate("203.0.113.7").await.is_unknown());
    }

    #[tokio::test]
    async fn test_non_ip_skips_lookup() {
        let (service, resolver) = service(berlin);

        assert!(service.locate("unknown").await.is_unknown());
        assert!(resolver.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_backend() {
        let service = GeoService::new(Arc::new(DisabledResolver), "8.8.8.8".parse().unwrap());
        assert_eq!(service.backend_name(), "none");
        assert!(service.locate("203.0.113.7").await.is_unknown());
    }
}
