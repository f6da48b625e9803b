//! Client IP extraction and lookup-address normalisation
//!
//! The raw address is what gets stored with a visit. Geolocation uses a
//! separate lookup address so that loopback and private callers (which
//! cannot be geolocated) are resolved through a public placeholder instead.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Extract the raw client address for a request
///
/// Preference order: first entry of `X-Forwarded-For`, then the `for=`
/// parameter of an RFC 7239 `Forwarded` header, then the socket peer address.
/// Header values are returned as sent (trimmed), even when they are not
/// valid addresses.
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr) -> String {
    extract_from_x_forwarded_for(headers)
        .or_else(|| extract_from_forwarded(headers))
        .unwrap_or_else(|| socket_addr.to_string())
}

/// First value of `X-Forwarded-For`, i.e. the originating client
fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    xff.split(',')
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse RFC 7239 Forwarded header: `Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43`
fn extract_from_forwarded(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    for element in forwarded.split(',') {
        for param in element.split(';') {
            let param = param.trim();
            let Some(value) = param
                .strip_prefix("for=")
                .or_else(|| param.strip_prefix("For="))
            else {
                continue;
            };

            let value = value.trim_matches('"');
            let ip = if let Some(rest) = value.strip_prefix('[') {
                // [2001:db8::1]:4711
                rest.split(']').next().unwrap_or(rest)
            } else {
                value
            };

            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    None
}

/// Parse a raw client address, tolerating a trailing port and IPv6 brackets
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    raw.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
}

/// Address to use for geolocation of a raw client IP
///
/// Loopback, private, link-local and unspecified addresses (and the literal
/// `localhost`) map to `placeholder`. IPv4-mapped IPv6 addresses are unwrapped
/// first. Returns `None` when `raw` is not an address at all.
pub fn lookup_ip(raw: &str, placeholder: IpAddr) -> Option<IpAddr> {
    if raw.trim().eq_ignore_ascii_case("localhost") {
        return Some(placeholder);
    }

    let ip = match parse_ip(raw)? {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        ip => ip,
    };

    if is_non_routable(&ip) {
        Some(placeholder)
    } else {
        Some(ip)
    }
}

/// Check if an address cannot be geolocated
pub fn is_non_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
    }
}
