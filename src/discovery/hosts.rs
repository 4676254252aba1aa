//! Host correlator
//!
//! Attaches end hosts to switch ports using the bridge forwarding table
//! (MAC → bridge port → ifIndex) and learns host IPs from the ARP table.

use anyhow::Result;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::database::{HostPatch, InventoryStore};
use crate::scanner::{SnmpAgent, format_mac, oids};

use super::prober::interface_index_map;

/// Counts of host rows written by one correlation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCorrelation {
    pub forwarding: usize,
    pub arp: usize,
}

fn octets<const N: usize>(arcs: &[u64]) -> Option<[u8; N]> {
    let tail = arcs.get(arcs.len().checked_sub(N)?..)?;
    let mut out = [0u8; N];
    for (slot, arc) in out.iter_mut().zip(tail) {
        *slot = u8::try_from(*arc).ok()?;
    }
    Some(out)
}

/// Trailing six index arcs rendered as a MAC address
pub fn mac_from_index(index: &[u64]) -> Option<String> {
    octets::<6>(index).and_then(|bytes| format_mac(&bytes))
}

/// Trailing four index arcs as an IPv4 address
pub fn ipv4_from_index(index: &[u64]) -> Option<Ipv4Addr> {
    octets::<4>(index).map(Ipv4Addr::from)
}

/// Correlate hosts seen by the device owning `address`. A no-op when the
/// address has no device.
pub async fn collect_hosts(
    store: &dyn InventoryStore,
    agent: &dyn SnmpAgent,
    address: &str,
    community: &str,
) -> Result<HostCorrelation> {
    let mut outcome = HostCorrelation::default();
    let Some(device) = store.device_by_address(address)? else {
        return Ok(outcome);
    };

    let ports = interface_index_map(store, agent, address, community, device.id).await?;

    let bridge_to_if: HashMap<u64, u64> = agent
        .walk(address, community, oids::DOT1D_BASE_PORT_IF_INDEX)
        .await
        .into_iter()
        .filter_map(|row| {
            let if_index = u64::try_from(row.value.as_integer()?).ok()?;
            Some((row.last_index()?, if_index))
        })
        .collect();

    for row in agent.walk(address, community, oids::DOT1D_TP_FDB_PORT).await {
        let Some(mac) = mac_from_index(&row.index) else {
            continue;
        };
        let iface = row
            .value
            .as_integer()
            .and_then(|port| u64::try_from(port).ok())
            .and_then(|port| bridge_to_if.get(&port))
            .and_then(|if_index| ports.get(if_index));
        let Some(iface) = iface else {
            tracing::debug!("{}: forwarding entry {} has no resolvable port", address, mac);
            continue;
        };

        store.upsert_host(
            &mac,
            &HostPatch {
                interface_id: Some(iface.id),
                ..Default::default()
            },
        )?;
        outcome.forwarding += 1;
    }

    for row in agent
        .walk(address, community, oids::IP_NET_TO_MEDIA_PHYS_ADDRESS)
        .await
    {
        if row.index.len() < 5 {
            continue;
        }
        let (Some(ip), Some(mac)) = (ipv4_from_index(&row.index), row.value.as_mac()) else {
            tracing::debug!("{}: skipping malformed ARP row {:?}", address, row.index);
            continue;
        };
        let iface = ports.get(&row.index[0]);

        store.upsert_host(
            &mac,
            &HostPatch {
                ip_address: Some(ip.to_string()),
                interface_id: iface.map(|i| i.id),
            },
        )?;
        outcome.arp += 1;
    }

    tracing::debug!(
        "{}: {} forwarding and {} ARP host entries",
        address,
        outcome.forwarding,
        outcome.arp
    );
    Ok(outcome)
}
