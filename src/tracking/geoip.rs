//! Offline geolocation using a MaxMind GeoLite2/GeoIP2 City MMDB
//!
//! The database is memory-mapped once at startup and shared by every request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use crate::models::Location;
use crate::tracking::geo::{GeoError, GeoResolver};

#[derive(Clone)]
pub struct MaxMindResolver {
    city_reader: Arc<Reader<Mmap>>,
}

impl MaxMindResolver {
    /// Open a City database
    ///
    /// # Arguments
    /// * `city_path` - Path to the MaxMind GeoLite2-City or GeoIP2-City .mmdb file
    pub fn new(city_path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(city_path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", city_path))?;

        Ok(Self {
            city_reader: Arc::new(reader),
        })
    }

    /// Synchronous lookup; the MMDB read never blocks on I/O beyond page faults
    pub fn lookup(&self, ip: IpAddr) -> Result<Location, GeoError> {
        let result = self.city_reader.lookup(ip)?;

        // The City database is a superset of Country, so fall back to the
        // country fields when a record carries no city data.
        if let Some(city) = result.decode::<geoip2::City>()? {
            let country = city
                .country
                .names
                .english
                .or(city.country.iso_code);
            let region = city
                .subdivisions
                .first()
                .and_then(|subdivision| subdivision.names.english);
            return Ok(Location::from_parts(country, region, city.city.names.english));
        }

        if let Some(country) = result.decode::<geoip2::Country>()? {
            let name = country
                .country
                .names
                .english
                .or(country.country.iso_code);
            return Ok(Location::from_parts(name, None, None));
        }

        Err(GeoError::NotFound(ip))
    }
}

#[async_trait]
impl GeoResolver for MaxMindResolver {
    fn name(&self) -> &'static str {
        "maxmind"
    }

    async fn resolve(&self, ip: IpAddr) -> Result<Location, GeoError> {
        self.lookup(ip)
    }
}
