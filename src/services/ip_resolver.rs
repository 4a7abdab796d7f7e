//! Client IP resolution
//!
//! Proxy and CDN headers are checked in priority order before the socket
//! address. These headers are supplied by the client and are trusted as-is,
//! so the result can be spoofed by anyone able to reach the server directly.
//! Set `audit.trust_proxy_headers: false` when the service is not behind a
//! proxy that overwrites them.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::http::HeaderMap;

/// Returned when no header or socket address yields a valid IP
pub const UNKNOWN_IP: &str = "unknown";

/// Headers consulted, highest priority first
pub const IP_HEADER_PRIORITY: [&str; 8] = [
    "cf-connecting-ip",
    "true-client-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-client-ip",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

/// Resolve the best-guess client IP for a request
pub fn resolve_client_ip(
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        if let Some(ip) = ip_from_headers(headers) {
            return ip.to_string();
        }
    }

    match remote_addr {
        Some(addr) => normalize(addr.ip()).to_string(),
        None => UNKNOWN_IP.to_string(),
    }
}

/// First valid IP found in the priority headers
pub fn ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    IP_HEADER_PRIORITY.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        if *name == "forwarded" {
            parse_forwarded(value)
        } else {
            parse_first_token(value)
        }
    })
}

/// Only the first entry of a comma-separated list is considered; an invalid
/// first entry disqualifies the whole header.
fn parse_first_token(value: &str) -> Option<IpAddr> {
    let first = value.split(',').next()?.trim();
    parse_ip(first)
}

/// RFC 7239: `Forwarded: for=192.0.2.60;proto=http, for="[2001:db8::1]:4711"`
fn parse_forwarded(value: &str) -> Option<IpAddr> {
    let first = value.split(',').next()?;
    first.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("for") {
            return None;
        }
        parse_ip(val.trim().trim_matches('"'))
    })
}

/// Accepts a bare IP, `ip:port`, or `[ipv6]:port`
fn parse_ip(token: &str) -> Option<IpAddr> {
    if token.is_empty() {
        return None;
    }
    if let Ok(ip) = token.parse::<IpAddr>() {
        return Some(normalize(ip));
    }
    if let Ok(addr) = token.parse::<SocketAddr>() {
        return Some(normalize(addr.ip()));
    }
    token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse::<Ipv6Addr>().ok())
        .map(|ip| normalize(IpAddr::V6(ip)))
}

/// IPv4-mapped IPv6 (`::ffff:10.0.0.1`) is reported as plain IPv4
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Loopback, private, link-local, CGNAT, unique-local and unspecified ranges
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_v4(&v4);
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // fc00::/7 unique local
                || (first & 0xffc0) == 0xfe80 // fe80::/10 link local
        }
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || (octets[0] == 100 && (64..=127).contains(&octets[1])) // 100.64.0.0/10 CGNAT
}
