//! Address guard for outbound fetches.
//!
//! Resolves the target host and refuses to connect when any answer is a
//! private, loopback, link-local or otherwise non-public address.

use std::net::IpAddr;
use std::sync::LazyLock;

use ipnet::Ipv4Net;
use url::{Host, Url};

/// Carrier-grade NAT shared address space (RFC 6598).
static CGNAT: LazyLock<Option<Ipv4Net>> = LazyLock::new(|| "100.64.0.0/10".parse().ok());

/// Error type for address guard failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

/// Check if an IP address is private, reserved, or otherwise non-public.
///
/// IPv4-mapped IPv6 addresses are judged by their IPv4 form.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
                || CGNAT.is_some_and(|net| net.contains(&v4))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(v4));
            }
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is public.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Resolve `url`'s host and validate every answer.
pub async fn check_host(url: &Url) -> Result<(), SsrfError> {
    let port = url.port_or_known_default().unwrap_or(443);
    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let addrs = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| SsrfError::DnsError(format!("{domain}: {e}")))?;

            let mut resolved = false;
            for addr in addrs {
                validate_ip(addr.ip())?;
                resolved = true;
            }
            if resolved { Ok(()) } else { Err(SsrfError::DnsError(format!("{domain}: no addresses"))) }
        }
        None => Err(SsrfError::DnsError("missing host".into())),
    }
}
