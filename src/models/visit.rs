use anyhow::anyhow;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placeholder for any field that could not be determined
pub const UNKNOWN: &str = "Unknown";

/// Placeholder for the device name when nothing is known about the caller
pub const UNKNOWN_DEVICE: &str = "Unknown Device";

/// Current time at the microsecond precision the stores persist
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Coarse location of a visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub region: String,
    pub city: String,
}

impl Location {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
        }
    }

    /// Build a location from optional parts, substituting "Unknown" for
    /// anything missing or blank.
    pub fn from_parts(country: Option<&str>, region: Option<&str>, city: Option<&str>) -> Self {
        fn or_unknown(value: Option<&str>) -> String {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        }

        Self {
            country: or_unknown(country),
            region: or_unknown(region),
            city: or_unknown(city),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.country == UNKNOWN && self.region == UNKNOWN && self.city == UNKNOWN
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A visit that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub ip: String,
    pub location: Location,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
}

impl NewVisit {
    /// Start a visit for `ip` stamped with the current time; every other field
    /// holds its default until filled in.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            location: Location::unknown(),
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
            device: UNKNOWN_DEVICE.to_string(),
            timestamp: now(),
        }
    }

    /// Re-stamp with the current time. Call right before inserting so the
    /// sort key reflects insertion order rather than request arrival.
    pub fn stamp_now(&mut self) {
        self.timestamp = now();
    }
}

/// One stored `/track` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub ip: String,
    pub location: Location,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
}

impl Visit {
    /// The record a store hands back after persisting `visit` under `id`.
    pub fn stored(id: i64, visit: &NewVisit) -> Self {
        Self {
            id,
            ip: visit.ip.clone(),
            location: visit.location.clone(),
            browser: visit.browser.clone(),
            os: visit.os.clone(),
            device: visit.device.clone(),
            timestamp: visit.timestamp,
        }
    }
}

/// Flat row as laid out in the `visits` table
#[derive(Debug, Clone, FromRow)]
pub struct VisitRow {
    pub id: i64,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub browser: String,
    pub os: String,
    pub device: String,
    /// Microseconds since the Unix epoch
    pub timestamp: i64,
}

impl TryFrom<VisitRow> for Visit {
    type Error = anyhow::Error;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp_micros(row.timestamp).ok_or_else(|| {
            anyhow!(
                "visit {} has out-of-range timestamp {}",
                row.id,
                row.timestamp
            )
        })?;

        Ok(Self {
            id: row.id,
            ip: row.ip,
            location: Location {
                country: row.country,
                region: row.region,
                city: row.city,
            },
            browser: row.browser,
            os: row.os,
            device: row.device,
            timestamp,
        })
    }
}
