//! Neighbor resolver
//!
//! Turns LLDP and CDP neighbor tables into Connections between interfaces,
//! creating name-only stub devices for neighbors not yet probed. Routing
//! neighbor tables (OSPF, OSPFv3, BGP) only feed the crawl frontier.

use anyhow::Result;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::{DiscoveryModule, ModuleSet};
use crate::database::{InterfacePatch, InventoryStore};
use crate::scanner::{SnmpAgent, SnmpValue, oids};

use super::prober::interface_index_map;

/// What one local port knows about the device on the other end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NeighborDescriptor {
    hostname: Option<String>,
    port: Option<String>,
}

#[derive(Clone, Copy)]
enum Field {
    Hostname,
    Port,
}

/// Neighbor tables in merge order; later rows overwrite earlier ones
const NEIGHBOR_TABLES: [(DiscoveryModule, &[u64], Field); 4] = [
    (DiscoveryModule::Lldp, oids::LLDP_REM_SYS_NAME, Field::Hostname),
    (DiscoveryModule::Lldp, oids::LLDP_REM_PORT_ID, Field::Port),
    (DiscoveryModule::Cdp, oids::CDP_CACHE_DEVICE_ID, Field::Hostname),
    (DiscoveryModule::Cdp, oids::CDP_CACHE_DEVICE_PORT, Field::Port),
];

const ROUTING_TABLES: [(DiscoveryModule, &[u64]); 3] = [
    (DiscoveryModule::Ospf, oids::OSPF_NBR_IP_ADDR),
    (DiscoveryModule::Ospfv3, oids::OSPFV3_NBR_ADDRESS),
    (DiscoveryModule::Bgp, oids::BGP_PEER_REMOTE_ADDR),
];

/// Decode an address column: dotted text, or 4/16 raw octets
pub fn address_from_value(value: &SnmpValue) -> Option<String> {
    if let SnmpValue::Text(text) = value
        && let Ok(ip) = text.trim().parse::<IpAddr>()
    {
        return Some(ip.to_string());
    }
    let bytes = value.as_bytes()?;
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(Ipv4Addr::from(octets).to_string());
    }
    if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        return Some(Ipv6Addr::from(octets).to_string());
    }
    None
}

/// Resolve the neighbor tables of the device owning `address`.
///
/// Returns addresses learned from routing-protocol neighbor tables; empty
/// when no device owns `address` or no routing module is enabled.
pub async fn resolve_neighbors(
    store: &dyn InventoryStore,
    agent: &dyn SnmpAgent,
    address: &str,
    community: &str,
    modules: &ModuleSet,
) -> Result<Vec<String>> {
    let Some(device) = store.device_by_address(address)? else {
        return Ok(Vec::new());
    };

    if modules.wants_neighbors() {
        let local_ports =
            interface_index_map(store, agent, address, community, device.id).await?;

        let mut descriptors: BTreeMap<u64, NeighborDescriptor> = BTreeMap::new();
        for (module, root, field) in NEIGHBOR_TABLES {
            if !modules.contains(module) {
                continue;
            }
            for row in agent.walk(address, community, root).await {
                let (Some(local_idx), Some(text)) = (row.local_port_index(), row.value.as_text())
                else {
                    continue;
                };
                let entry = descriptors.entry(local_idx).or_default();
                match field {
                    Field::Hostname => entry.hostname = Some(text),
                    Field::Port => entry.port = Some(text),
                }
            }
        }

        let mut created = 0;
        for (local_idx, descriptor) in descriptors {
            let Some(local) = local_ports.get(&local_idx) else {
                tracing::debug!("{}: no local interface for neighbor port {}", address, local_idx);
                continue;
            };
            let Some(hostname) = descriptor.hostname.filter(|h| !h.is_empty()) else {
                tracing::debug!("{}: neighbor on {} has no hostname", address, local.name);
                continue;
            };
            let Some(port) = descriptor.port.filter(|p| !p.is_empty()) else {
                tracing::debug!("{}: neighbor {} on {} has no port", address, hostname, local.name);
                continue;
            };

            let remote = store.upsert_stub_device(&hostname)?;
            let remote_port = store.upsert_interface(remote.id, &port, &InterfacePatch::default())?;
            if remote_port.id == local.id {
                tracing::debug!("{}: {} reports itself as its own neighbor", address, local.name);
                continue;
            }
            let (_, is_new) = store.upsert_connection(local.id, remote_port.id)?;
            if is_new {
                created += 1;
                tracing::debug!(
                    "Linked {} {} <-> {} {}",
                    device.hostname,
                    local.name,
                    hostname,
                    port
                );
            }
        }
        if created > 0 {
            crate::log_stderr!("{}: {} new link(s)", address, created);
        }
    }

    let mut frontier: Vec<String> = Vec::new();
    for (module, root) in ROUTING_TABLES {
        if !modules.contains(module) {
            continue;
        }
        for row in agent.walk(address, community, root).await {
            if let Some(peer) = address_from_value(&row.value)
                && !frontier.contains(&peer)
            {
                frontier.push(peer);
            }
        }
    }
    Ok(frontier)
}
