//! Address eligibility for the crawl frontier
//!
//! Only literal IP addresses inside the RFC 1918 private ranges are crawled;
//! everything else (hostnames, public, loopback, link-local, IPv6) is dropped.

use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr};

/// RFC 1918 private blocks
const PRIVATE_BLOCKS: [(Ipv4Addr, u8); 3] = [
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
];

/// Checks if an IPv4 address falls inside one of the private blocks
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    PRIVATE_BLOCKS.iter().any(|(network, prefix)| {
        Ipv4Network::new(*network, *prefix)
            .map(|block| block.contains(ip))
            .unwrap_or(false)
    })
}

/// Returns true when `candidate` is a valid IP literal in a private block
pub fn is_crawl_eligible(candidate: &str) -> bool {
    match candidate.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => is_private_ipv4(ip),
        Ok(IpAddr::V6(_)) => false,
        Err(_) => {
            tracing::debug!("Rejected non-literal crawl candidate {:?}", candidate);
            false
        }
    }
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod subnet_tests;
