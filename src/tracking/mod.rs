//! Visitor tracking: who is calling, from where, with what
//!
//! Each piece degrades to "Unknown" defaults instead of failing, so a
//! `/track` request only fails when the visit cannot be stored.

pub mod geo;
pub mod geoip;
pub mod ip_extractor;
pub mod remote;
pub mod user_agent;

pub use geo::{GeoError, GeoResolver, GeoService};
pub use geoip::MaxMindResolver;
pub use ip_extractor::extract_client_ip;
pub use remote::RemoteResolver;
pub use user_agent::{classify, DeviceClass, UserAgentInfo};
