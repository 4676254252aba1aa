//! Device prober
//!
//! Identity (sysName, sysDescr) plus the interface table for one address.

use anyhow::Result;
use std::collections::HashMap;

use crate::database::{DevicePatch, DeviceRecord, InterfacePatch, InterfaceRecord, InventoryStore};
use crate::models::Credentials;
use crate::scanner::{SnmpAgent, SnmpValue, WalkRow, oids};

/// A device that answered, and the community it answered to
#[derive(Debug, Clone)]
pub struct ProbedDevice {
    pub device: DeviceRecord,
    pub community: String,
}

/// First whitespace token of sysDescr
pub fn vendor_from_descr(descr: &str) -> String {
    descr.split_whitespace().next().unwrap_or("").to_string()
}

fn index_map(rows: Vec<WalkRow>) -> HashMap<u64, SnmpValue> {
    rows.into_iter()
        .filter_map(|row| row.last_index().map(|idx| (idx, row.value)))
        .collect()
}

/// Probe `address`. `Ok(None)` means the device did not answer sysName on
/// any community in the chain.
pub async fn probe(
    store: &dyn InventoryStore,
    agent: &dyn SnmpAgent,
    address: &str,
    credentials: &Credentials,
) -> Result<Option<ProbedDevice>> {
    let known = store.device_by_address(address)?;

    let mut answered: Option<(String, SnmpValue)> = None;
    for community in credentials.community_chain(known.as_ref()) {
        let sys_name = agent.get(address, &community, oids::SYS_NAME).await;
        if !sys_name.is_absent() {
            answered = Some((community, sys_name));
            break;
        }
        tracing::debug!("{} did not answer sysName on one community", address);
    }

    let Some((community, sys_name)) = answered else {
        if known.is_some() {
            let patch = DevicePatch {
                roadblocks: Some("snmp: no response".to_string()),
                is_online: Some(false),
                ..Default::default()
            };
            store.upsert_device_by_address(address, &patch)?;
        }
        return Ok(None);
    };

    let descr = agent
        .get(address, &community, oids::SYS_DESCR)
        .await
        .as_text()
        .unwrap_or_default();

    let patch = DevicePatch {
        hostname: sys_name.as_nonempty_text(),
        vendor: Some(vendor_from_descr(&descr)),
        os_version: Some(descr),
        discovered_snmp_community: Some(community.clone()),
        roadblocks: Some(String::new()),
        is_online: Some(true),
        touch_last_seen: true,
        touch_last_scanned: true,
        ..Default::default()
    };
    let device = store.upsert_device_by_address(address, &patch)?;
    tracing::debug!("{} answered as {:?} (device {})", address, device.hostname, device.id);

    let names = agent.walk(address, &community, oids::IF_DESCR).await;
    let macs = index_map(agent.walk(address, &community, oids::IF_PHYS_ADDRESS).await);
    let statuses = index_map(agent.walk(address, &community, oids::IF_OPER_STATUS).await);

    for row in names {
        let (Some(idx), Some(name)) = (row.last_index(), row.value.as_nonempty_text()) else {
            continue;
        };
        let patch = InterfacePatch {
            mac_address: macs.get(&idx).and_then(SnmpValue::as_mac),
            status: statuses
                .get(&idx)
                .and_then(SnmpValue::as_integer)
                .map(|s| s.to_string()),
            ..Default::default()
        };
        store.upsert_interface(device.id, &name, &patch)?;
    }

    Ok(Some(ProbedDevice { device, community }))
}

/// ifIndex → stored Interface of `device_id`, by re-walking ifDescr.
/// Indexes whose name has no stored Interface are left out.
pub async fn interface_index_map(
    store: &dyn InventoryStore,
    agent: &dyn SnmpAgent,
    address: &str,
    community: &str,
    device_id: i64,
) -> Result<HashMap<u64, InterfaceRecord>> {
    let by_name: HashMap<String, InterfaceRecord> = store
        .interfaces_for_device(device_id)?
        .into_iter()
        .map(|iface| (iface.name.clone(), iface))
        .collect();

    let rows = agent.walk(address, community, oids::IF_DESCR).await;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let idx = row.last_index()?;
            let name = row.value.as_nonempty_text()?;
            by_name.get(&name).map(|iface| (idx, iface.clone()))
        })
        .collect())
}
