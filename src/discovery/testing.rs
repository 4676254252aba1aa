//! In-memory fakes for the discovery unit tests

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::network::{DefaultRoute, LocalInterface, NeighborEntry};
use crate::scanner::{SnmpAgent, SnmpValue, WalkRow, oids};

use super::local::LocalSystem;

type Mib = BTreeMap<Vec<u64>, SnmpValue>;

/// SNMP agent answering from per-(address, community) MIB tables
#[derive(Default)]
pub(crate) struct MibAgent {
    mibs: HashMap<(String, String), Mib>,
    communities: HashMap<String, String>,
    gets: Mutex<HashMap<(String, String), usize>>,
}

fn oid(root: &[u64], index: &[u64]) -> Vec<u64> {
    [root, index].concat()
}

impl MibAgent {
    pub fn new() -> Self {
        Self::default()
    }

    fn community_of(&self, address: &str) -> String {
        self.communities
            .get(address)
            .cloned()
            .unwrap_or_else(|| "public".to_string())
    }

    pub fn set(mut self, address: &str, oid: Vec<u64>, value: SnmpValue) -> Self {
        let key = (address.to_string(), self.community_of(address));
        self.mibs.entry(key).or_default().insert(oid, value);
        self
    }

    pub fn device(mut self, address: &str, community: &str, sys_name: &str, sys_descr: &str) -> Self {
        self.communities
            .insert(address.to_string(), community.to_string());
        self.set(address, oids::SYS_NAME.to_vec(), SnmpValue::Text(sys_name.into()))
            .set(address, oids::SYS_DESCR.to_vec(), SnmpValue::Text(sys_descr.into()))
    }

    pub fn interface(
        self,
        address: &str,
        if_index: u64,
        name: &str,
        mac: Option<[u8; 6]>,
        status: Option<i64>,
    ) -> Self {
        let mut agent = self.set(
            address,
            oid(oids::IF_DESCR, &[if_index]),
            SnmpValue::Text(name.into()),
        );
        if let Some(mac) = mac {
            agent = agent.set(
                address,
                oid(oids::IF_PHYS_ADDRESS, &[if_index]),
                SnmpValue::RawBytes(mac.to_vec()),
            );
        }
        if let Some(status) = status {
            agent = agent.set(
                address,
                oid(oids::IF_OPER_STATUS, &[if_index]),
                SnmpValue::Integer(status),
            );
        }
        agent
    }

    pub fn lldp(self, address: &str, local_port: u64, remote: u64, sys_name: &str, port: &str) -> Self {
        self.set(
            address,
            oid(oids::LLDP_REM_SYS_NAME, &[0, local_port, remote]),
            SnmpValue::Text(sys_name.into()),
        )
        .set(
            address,
            oid(oids::LLDP_REM_PORT_ID, &[0, local_port, remote]),
            SnmpValue::Text(port.into()),
        )
    }

    pub fn cdp(self, address: &str, local_port: u64, device_id: &str, port: &str) -> Self {
        self.set(
            address,
            oid(oids::CDP_CACHE_DEVICE_ID, &[local_port, 1]),
            SnmpValue::Text(device_id.into()),
        )
        .set(
            address,
            oid(oids::CDP_CACHE_DEVICE_PORT, &[local_port, 1]),
            SnmpValue::Text(port.into()),
        )
    }

    pub fn bridge_port(self, address: &str, bridge_port: u64, if_index: u64) -> Self {
        self.set(
            address,
            oid(oids::DOT1D_BASE_PORT_IF_INDEX, &[bridge_port]),
            SnmpValue::Integer(if_index as i64),
        )
    }

    pub fn fdb(self, address: &str, mac: [u8; 6], bridge_port: u64) -> Self {
        let index: Vec<u64> = mac.iter().map(|b| u64::from(*b)).collect();
        self.set(
            address,
            oid(oids::DOT1D_TP_FDB_PORT, &index),
            SnmpValue::Integer(bridge_port as i64),
        )
    }

    pub fn arp(self, address: &str, if_index: u64, ip: [u8; 4], mac: [u8; 6]) -> Self {
        let mut index = vec![if_index];
        index.extend(ip.iter().map(|b| u64::from(*b)));
        self.set(
            address,
            oid(oids::IP_NET_TO_MEDIA_PHYS_ADDRESS, &index),
            SnmpValue::RawBytes(mac.to_vec()),
        )
    }

    pub fn ospf_neighbor(self, address: &str, ip: [u8; 4]) -> Self {
        let index: Vec<u64> = ip.iter().map(|b| u64::from(*b)).chain([0]).collect();
        let text = ip.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(".");
        self.set(address, oid(oids::OSPF_NBR_IP_ADDR, &index), SnmpValue::Text(text))
    }

    pub fn gets_for(&self, address: &str, community: &str) -> usize {
        self.gets
            .lock()
            .unwrap()
            .get(&(address.to_string(), community.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn mib(&self, address: &str, community: &str) -> Option<&Mib> {
        self.mibs.get(&(address.to_string(), community.to_string()))
    }
}

impl SnmpAgent for MibAgent {
    fn agent_id(&self) -> &'static str {
        "mib-fake"
    }

    fn get<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        oid: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = SnmpValue> + Send + 'a>> {
        *self
            .gets
            .lock()
            .unwrap()
            .entry((address.to_string(), community.to_string()))
            .or_default() += 1;
        let value = self
            .mib(address, community)
            .and_then(|mib| mib.get(oid).cloned())
            .unwrap_or(SnmpValue::Absent);
        Box::pin(async move { value })
    }

    fn walk<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        root: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = Vec<WalkRow>> + Send + 'a>> {
        let rows = self
            .mib(address, community)
            .map(|mib| {
                mib.iter()
                    .filter(|(oid, _)| oid.len() > root.len() && oid.starts_with(root))
                    .map(|(oid, value)| WalkRow::new(oid[root.len()..].to_vec(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Box::pin(async move { rows })
    }
}

/// Local system with canned answers
#[derive(Default, Clone)]
pub(crate) struct FakeLocal {
    pub hostname: Option<String>,
    pub route: Option<DefaultRoute>,
    pub interfaces: Vec<LocalInterface>,
    pub neighbors: Vec<NeighborEntry>,
    pub dns: Option<std::net::Ipv4Addr>,
}

impl LocalSystem for FakeLocal {
    fn source_id(&self) -> &'static str {
        "fake"
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
    ) -> Pin<Box<dyn Future<Output = Option<std::net::Ipv4Addr>> + Send + 'a>> {
        let dns = self.dns;
        Box::pin(async move { dns })
    }

    fn os_version(&self) -> Option<String> {
        Some("linux-test x86_64".to_string())
    }
}
