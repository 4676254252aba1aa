#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use nexus_inventory::network::{DefaultRoute, LocalInterface, NeighborEntry};
use nexus_inventory::scanner::oids;
use nexus_inventory::{LocalSystem, SnmpAgent, SnmpValue, WalkRow};

fn octets(raw: &str) -> Vec<u64> {
    raw.split(['.', ':'])
        .map(|part| {
            if raw.contains(':') {
                u64::from_str_radix(part, 16).expect("hex octet")
            } else {
                part.parse().expect("decimal octet")
            }
        })
        .collect()
}

fn mac_bytes(mac: &str) -> Vec<u8> {
    octets(mac).into_iter().map(|o| o as u8).collect()
}

/// Scripted SNMP agent: one MIB per address, answering only to `community`.
/// Every request yields once so concurrent crawls interleave.
pub struct ScriptedAgent {
    community: String,
    mibs: HashMap<String, BTreeMap<Vec<u64>, SnmpValue>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(community: &str) -> Self {
        Self {
            community: community.to_string(),
            mibs: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn value(mut self, address: &str, root: &[u64], index: &[u64], value: SnmpValue) -> Self {
        let oid = [root, index].concat();
        self.mibs
            .entry(address.to_string())
            .or_default()
            .insert(oid, value);
        self
    }

    pub fn system(self, address: &str, sys_name: &str, sys_descr: &str) -> Self {
        self.value(address, oids::SYS_NAME, &[], SnmpValue::Text(sys_name.into()))
            .value(address, oids::SYS_DESCR, &[], SnmpValue::Text(sys_descr.into()))
    }

    pub fn if_entry(self, address: &str, index: u64, name: &str, mac: &str, status: i64) -> Self {
        self.value(address, oids::IF_DESCR, &[index], SnmpValue::Text(name.into()))
            .value(
                address,
                oids::IF_PHYS_ADDRESS,
                &[index],
                SnmpValue::RawBytes(mac_bytes(mac)),
            )
            .value(address, oids::IF_OPER_STATUS, &[index], SnmpValue::Integer(status))
    }

    pub fn lldp(self, address: &str, local_index: u64, remote_name: &str, remote_port: &str) -> Self {
        let index = [42, local_index, 1];
        self.value(
            address,
            oids::LLDP_REM_SYS_NAME,
            &index,
            SnmpValue::Text(remote_name.into()),
        )
        .value(
            address,
            oids::LLDP_REM_PORT_ID,
            &index,
            SnmpValue::Text(remote_port.into()),
        )
    }

    pub fn bridge_port(self, address: &str, port: u64, if_index: u64) -> Self {
        self.value(
            address,
            oids::DOT1D_BASE_PORT_IF_INDEX,
            &[port],
            SnmpValue::Integer(if_index as i64),
        )
    }

    pub fn fdb(self, address: &str, mac: &str, port: u64) -> Self {
        self.value(address, oids::DOT1D_TP_FDB_PORT, &octets(mac), SnmpValue::Integer(port as i64))
    }

    pub fn arp(self, address: &str, if_index: u64, ip: &str, mac: &str) -> Self {
        let mut index = vec![if_index];
        index.extend(octets(ip));
        self.value(
            address,
            oids::IP_NET_TO_MEDIA_PHYS_ADDRESS,
            &index,
            SnmpValue::RawBytes(mac_bytes(mac)),
        )
    }

    /// Every address that received at least one request, in first-request order
    pub fn contacted(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for address in self.requests.lock().expect("request log lock").iter() {
            if !seen.contains(address) {
                seen.push(address.clone());
            }
        }
        seen
    }

    fn record(&self, address: &str) {
        self.requests
            .lock()
            .expect("request log lock")
            .push(address.to_string());
    }

    fn mib(&self, address: &str, community: &str) -> Option<&BTreeMap<Vec<u64>, SnmpValue>> {
        if community != self.community {
            return None;
        }
        self.mibs.get(address)
    }
}

impl SnmpAgent for ScriptedAgent {
    fn agent_id(&self) -> &'static str {
        "scripted"
    }

    fn get<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        oid: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = SnmpValue> + Send + 'a>> {
        self.record(address);
        let value = self
            .mib(address, community)
            .and_then(|mib| mib.get(oid).cloned())
            .unwrap_or(SnmpValue::Absent);
        Box::pin(async move {
            tokio::task::yield_now().await;
            value
        })
    }

    fn walk<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        root: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = Vec<WalkRow>> + Send + 'a>> {
        self.record(address);
        let rows: Vec<WalkRow> = self
            .mib(address, community)
            .map(|mib| {
                mib.iter()
                    .filter(|(oid, _)| oid.len() > root.len() && oid.starts_with(root))
                    .map(|(oid, value)| WalkRow::new(oid[root.len()..].to_vec(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Box::pin(async move {
            tokio::task::yield_now().await;
            rows
        })
    }
}

/// Local machine with fixed tables and no DNS
#[derive(Default, Clone)]
pub struct StaticLocal {
    pub hostname: Option<String>,
    pub route: Option<DefaultRoute>,
    pub interfaces: Vec<LocalInterface>,
    pub neighbors: Vec<NeighborEntry>,
}

impl StaticLocal {
    /// Host "nms" on eth0 10.0.0.9/24 behind gateway 10.0.0.1
    pub fn nms(neighbors: &[(&str, &str)]) -> Self {
        Self {
            hostname: Some("nms".into()),
            route: Some(DefaultRoute {
                interface: "eth0".into(),
                gateway: Some(Ipv4Addr::new(10, 0, 0, 1)),
            }),
            interfaces: vec![LocalInterface {
                name: "eth0".into(),
                mac: Some("52:54:00:00:00:09".into()),
                ipv4: Some(Ipv4Addr::new(10, 0, 0, 9)),
                prefix_len: 24,
                is_up: true,
            }],
            neighbors: neighbors
                .iter()
                .map(|(ip, mac)| NeighborEntry {
                    ip: ip.parse().expect("neighbor ip"),
                    interface: "eth0".into(),
                    mac: mac.to_string(),
                })
                .collect(),
        }
    }
}

impl LocalSystem for StaticLocal {
    fn source_id(&self) -> &'static str {
        "static"
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn default_route<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<DefaultRoute>> + Send + 'a>> {
        let route = self.route.clone();
        Box::pin(async move { route })
    }

    fn interfaces(&self) -> Vec<LocalInterface> {
        self.interfaces.clone()
    }

    fn neighbors<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<NeighborEntry>> + Send + 'a>> {
        let neighbors = self.neighbors.clone();
        Box::pin(async move { neighbors })
    }

    fn resolve_hostname<'a>(
        &'a self,
        _hostname: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Ipv4Addr>> + Send + 'a>> {
        Box::pin(async { None })
    }

    fn os_version(&self) -> Option<String> {
        Some("Linux-6.1.0-x86_64".into())
    }
}

pub fn unique_temp_db_path(prefix: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{}_{}_{}.db", prefix, std::process::id(), timestamp))
}

/// Two switches linked Gig0/1 <-> Eth0/1, each seeing the other in ARP
pub fn two_switch_network() -> ScriptedAgent {
    ScriptedAgent::new("public")
        .system("10.0.0.1", "sw1", "Cisco IOS Software")
        .if_entry("10.0.0.1", 1, "Gig0/1", "02:00:00:00:01:01", 1)
        .lldp("10.0.0.1", 1, "sw2", "Eth0/1")
        .arp("10.0.0.1", 1, "10.0.0.2", "02:00:00:00:02:01")
        .system("10.0.0.2", "sw2", "Arista EOS")
        .if_entry("10.0.0.2", 1, "Eth0/1", "02:00:00:00:02:01", 1)
        .lldp("10.0.0.2", 1, "sw1", "Gig0/1")
        .arp("10.0.0.2", 1, "10.0.0.1", "02:00:00:00:01:01")
}
