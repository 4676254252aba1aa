//! Forward DNS resolution for the local host name

use dns_lookup::lookup_host;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// DNS lookup timeout (synchronous, so we use spawn_blocking)
const DNS_TIMEOUT_MS: u64 = 2000;

/// Resolve `hostname` to its first non-loopback IPv4 address
pub fn forward_lookup(hostname: &str) -> Option<Ipv4Addr> {
    match lookup_host(hostname) {
        Ok(addrs) => addrs.into_iter().find_map(|addr| match addr {
            IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
            _ => None,
        }),
        Err(e) => {
            tracing::debug!("DNS lookup for {} failed: {}", hostname, e);
            None
        }
    }
}

/// Async wrapper around [`forward_lookup`] bounded by a timeout
pub async fn resolve_hostname(hostname: &str) -> Option<Ipv4Addr> {
    let name = hostname.to_string();
    let lookup_result = tokio::time::timeout(
        Duration::from_millis(DNS_TIMEOUT_MS),
        tokio::task::spawn_blocking(move || forward_lookup(&name)),
    )
    .await;

    match lookup_result {
        Ok(Ok(ip)) => ip,
        Ok(Err(e)) => {
            tracing::warn!("DNS worker join failed for {}: {}", hostname, e);
            None
        }
        Err(_) => {
            tracing::debug!("DNS lookup for {} timed out", hostname);
            None
        }
    }
}
