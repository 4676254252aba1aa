//! Parsers for the kernel routing and neighbor tables
//!
//! Two textual sources are understood: the Linux procfs tables
//! (`/proc/net/route`, `/proc/net/arp`) and the output of the `ip` command
//! (`ip route show default`, `ip neigh`).

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::interface::normalize_mac;

/// The default route of this machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoute {
    pub interface: String,
    pub gateway: Option<Ipv4Addr>,
}

/// One resolved entry of the neighbor (ARP) cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    pub interface: String,
    pub mac: String,
}

/// `/proc/net/route` stores addresses as host-endian hex words
fn parse_proc_hex_ipv4(raw: &str) -> Option<Ipv4Addr> {
    let value = u32::from_str_radix(raw, 16).ok()?;
    Some(Ipv4Addr::from(value.to_ne_bytes()))
}

/// Default route from `/proc/net/route` content
pub fn parse_proc_route(content: &str) -> Option<DefaultRoute> {
    content.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return None;
        }
        let destination = parse_proc_hex_ipv4(fields[1])?;
        let mask = parse_proc_hex_ipv4(fields[7])?;
        if !destination.is_unspecified() || !mask.is_unspecified() {
            return None;
        }
        let gateway = parse_proc_hex_ipv4(fields[2]).filter(|g| !g.is_unspecified());
        Some(DefaultRoute {
            interface: fields[0].to_string(),
            gateway,
        })
    })
}

/// Complete neighbor entries from `/proc/net/arp` content
pub fn parse_proc_arp(content: &str) -> Vec<NeighborEntry> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            // Flags 0x0 marks an incomplete entry
            if fields[2] == "0x0" {
                return None;
            }
            Some(NeighborEntry {
                ip: fields[0].parse().ok()?,
                mac: normalize_mac(fields[3])?,
                interface: fields[5].to_string(),
            })
        })
        .collect()
}

fn token_after<'a>(parts: &[&'a str], key: &str) -> Option<&'a str> {
    parts
        .iter()
        .position(|p| *p == key)
        .and_then(|i| parts.get(i + 1).copied())
}

/// Default route from `ip route show default` output
pub fn parse_ip_route(output: &str) -> Option<DefaultRoute> {
    output.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"default") {
            return None;
        }
        let interface = token_after(&parts, "dev")?;
        Some(DefaultRoute {
            interface: interface.to_string(),
            gateway: token_after(&parts, "via").and_then(|g| g.parse().ok()),
        })
    })
}

/// IPv4 neighbor entries with a link-layer address from `ip neigh` output
pub fn parse_ip_neigh(output: &str) -> Vec<NeighborEntry> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            Some(NeighborEntry {
                ip: parts.first()?.parse().ok()?,
                interface: token_after(&parts, "dev")?.to_string(),
                mac: normalize_mac(token_after(&parts, "lladdr")?)?,
            })
        })
        .collect()
}
