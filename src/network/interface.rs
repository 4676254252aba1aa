//! Local network interface enumeration

use pnet::datalink;
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// One interface of the machine running the crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInterface {
    pub name: String,
    pub mac: Option<String>,
    pub ipv4: Option<Ipv4Addr>,
    pub prefix_len: u8,
    pub is_up: bool,
}

fn is_link_local(ip: &Ipv4Addr) -> bool {
    ip.octets()[0] == 169 && ip.octets()[1] == 254
}

fn to_local_interface(pnet_if: &datalink::NetworkInterface) -> LocalInterface {
    let mac = pnet_if
        .mac
        .filter(|m| *m != MacAddr::zero())
        .map(|m| m.to_string());

    // First routable IPv4 wins.
    let (ipv4, prefix_len) = pnet_if
        .ips
        .iter()
        .find_map(|net| match net.ip() {
            IpAddr::V4(ip) if !ip.is_unspecified() && !is_link_local(&ip) => {
                Some((Some(ip), net.prefix()))
            }
            _ => None,
        })
        .unwrap_or((None, 0));

    LocalInterface {
        name: pnet_if.name.clone(),
        mac,
        ipv4,
        prefix_len,
        is_up: pnet_if.is_up(),
    }
}

/// Lists the non-loopback interfaces of this machine
pub fn list_local_interfaces() -> Vec<LocalInterface> {
    let pnet_interfaces = datalink::interfaces();
    tracing::debug!("Scanning {} network interfaces...", pnet_interfaces.len());

    pnet_interfaces
        .iter()
        .filter(|pnet_if| !pnet_if.is_loopback())
        .map(to_local_interface)
        .collect()
}

/// Scores an IP address for management-address selection priority
pub fn interface_score(ip: &Ipv4Addr) -> u32 {
    let octets = ip.octets();
    match octets[0] {
        192 if octets[1] == 168 => 100, // 192.168.x.x - typical home/office LAN
        10 => 90,                       // 10.x.x.x - typical office LAN
        172 if octets[1] >= 16 && octets[1] <= 31 => 50, // 172.16-31.x.x - could be virtual
        _ => 70,
    }
}

/// Picks the best-scored up interface with an IPv4 address
pub fn best_interface(interfaces: &[LocalInterface]) -> Option<&LocalInterface> {
    interfaces
        .iter()
        .filter(|i| i.is_up && i.ipv4.is_some())
        .max_by_key(|i| i.ipv4.as_ref().map(interface_score).unwrap_or(0))
}

/// Normalizes a textual MAC address to lower-case colon-separated form
pub fn normalize_mac(raw: &str) -> Option<String> {
    let mac: MacAddr = raw.trim().replace('-', ":").parse().ok()?;
    if mac == MacAddr::zero() {
        return None;
    }
    Some(mac.to_string())
}
