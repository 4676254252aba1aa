//! SNMP protocol agent
//!
//! Single-value GET and table WALK against one target address. Wire values
//! are decoded into [`SnmpValue`] here so nothing above this module touches
//! `snmp2` types. Transport failures never surface as errors: a GET yields
//! [`SnmpValue::Absent`] and a WALK yields the rows collected so far.

use snmp2::{AsyncSession, Oid, Value};
use std::future::Future;
use std::pin::Pin;
use tokio::time::timeout;

use crate::config::SnmpSettings;

/// Standard OIDs used by the crawler (u64 arcs, as `snmp2` expects)
pub mod oids {
    pub const SYS_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
    pub const SYS_NAME: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];

    pub const IF_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
    pub const IF_PHYS_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 6];
    pub const IF_OPER_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];

    pub const LLDP_REM_PORT_ID: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 7];
    pub const LLDP_REM_SYS_NAME: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 9];

    pub const CDP_CACHE_DEVICE_ID: &[u64] = &[1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1, 6];
    pub const CDP_CACHE_DEVICE_PORT: &[u64] = &[1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1, 7];

    pub const DOT1D_BASE_PORT_IF_INDEX: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 1, 4, 1, 2];
    pub const DOT1D_TP_FDB_PORT: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2];

    pub const IP_NET_TO_MEDIA_PHYS_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 4, 22, 1, 2];

    pub const OSPF_NBR_IP_ADDR: &[u64] = &[1, 3, 6, 1, 2, 1, 14, 10, 1, 1];
    pub const OSPFV3_NBR_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 191, 1, 9, 1, 4];
    pub const BGP_PEER_REMOTE_ADDR: &[u64] = &[1, 3, 6, 1, 2, 1, 15, 3, 1, 7];
}

/// A decoded SNMP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    Text(String),
    RawBytes(Vec<u8>),
    /// No value: missing object, unsupported type or transport failure
    Absent,
}

impl SnmpValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, SnmpValue::Absent)
    }

    /// Render as display text. Raw bytes become `0x`-prefixed hex.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::Integer(n) => Some(n.to_string()),
            SnmpValue::Text(s) => Some(s.trim().to_string()),
            SnmpValue::RawBytes(bytes) => Some(format!("0x{}", hex(bytes))),
            SnmpValue::Absent => None,
        }
    }

    /// Non-empty text only
    pub fn as_nonempty_text(&self) -> Option<String> {
        self.as_text().filter(|s| !s.is_empty())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(n) => Some(*n),
            SnmpValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::Text(s) => Some(s.as_bytes()),
            SnmpValue::RawBytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Six raw octets rendered as `aa:bb:cc:dd:ee:ff`
    pub fn as_mac(&self) -> Option<String> {
        self.as_bytes().and_then(format_mac)
    }

    fn from_wire(value: &Value<'_>) -> Option<Self> {
        let decoded = match value {
            Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => return None,
            Value::Integer(n) => SnmpValue::Integer(*n),
            Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
                SnmpValue::Integer(i64::from(*n))
            }
            Value::Counter64(n) => SnmpValue::Integer(i64::try_from(*n).unwrap_or(i64::MAX)),
            Value::IpAddress(octets) => SnmpValue::Text(
                octets
                    .iter()
                    .map(|o| o.to_string())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            Value::OctetString(bytes) => decode_octets(bytes),
            _ => SnmpValue::Absent,
        };
        Some(decoded)
    }
}

fn decode_octets(bytes: &[u8]) -> SnmpValue {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
            SnmpValue::Text(s.to_string())
        }
        _ => SnmpValue::RawBytes(bytes.to_vec()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Format six octets as a lower-case colon-separated MAC address
pub fn format_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    Some(
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

/// One row of a table walk. `index` is the OID suffix after the table root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkRow {
    pub index: Vec<u64>,
    pub value: SnmpValue,
}

impl WalkRow {
    pub fn new(index: Vec<u64>, value: SnmpValue) -> Self {
        Self { index, value }
    }

    pub fn last_index(&self) -> Option<u64> {
        self.index.last().copied()
    }

    /// Second-to-last index arc (the local port in LLDP/CDP tables)
    pub fn local_port_index(&self) -> Option<u64> {
        self.index.len().checked_sub(2).map(|i| self.index[i])
    }
}

/// Render a dotted OID string
pub fn oid_to_string(arcs: &[u64]) -> String {
    arcs.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// SNMP GET/WALK capability
pub trait SnmpAgent: Send + Sync {
    fn agent_id(&self) -> &'static str;

    fn get<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        oid: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = SnmpValue> + Send + 'a>>;

    fn walk<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        root: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = Vec<WalkRow>> + Send + 'a>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
}

/// Agent backed by a `snmp2` UDP session
#[derive(Debug, Clone)]
pub struct Snmp2Agent {
    version: SnmpVersion,
    settings: SnmpSettings,
}

impl Snmp2Agent {
    pub fn new(version: SnmpVersion, settings: SnmpSettings) -> Self {
        Self { version, settings }
    }

    fn target(&self, address: &str) -> String {
        if address.contains(':') {
            format!("[{}]:{}", address, self.settings.port)
        } else {
            format!("{}:{}", address, self.settings.port)
        }
    }

    async fn open_session(&self, address: &str, community: &str) -> Option<AsyncSession> {
        let target = self.target(address);
        let opened = match self.version {
            SnmpVersion::V2c => {
                timeout(
                    self.settings.timeout,
                    AsyncSession::new_v2c(&target, community.as_bytes(), 0),
                )
                .await
            }
            SnmpVersion::V1 => {
                timeout(
                    self.settings.timeout,
                    AsyncSession::new_v1(&target, community.as_bytes(), 0),
                )
                .await
            }
        };

        match opened {
            Ok(Ok(session)) => Some(session),
            Ok(Err(e)) => {
                tracing::debug!("SNMP session to {} failed: {}", target, e);
                None
            }
            Err(_) => {
                tracing::debug!("SNMP session to {} timed out", target);
                None
            }
        }
    }

    async fn fetch(&self, address: &str, community: &str, oid: &[u64]) -> SnmpValue {
        let Ok(request_oid) = Oid::from(oid) else {
            return SnmpValue::Absent;
        };
        let Some(mut session) = self.open_session(address, community).await else {
            return SnmpValue::Absent;
        };

        for attempt in 0..=self.settings.retries {
            match timeout(self.settings.timeout, session.get(&request_oid)).await {
                Ok(Ok(mut response)) => {
                    return response
                        .varbinds
                        .next()
                        .and_then(|(_, value)| SnmpValue::from_wire(&value))
                        .unwrap_or(SnmpValue::Absent);
                }
                Ok(Err(e)) => {
                    tracing::debug!(
                        "SNMP GET {} on {} failed: {}",
                        oid_to_string(oid),
                        address,
                        e
                    );
                    return SnmpValue::Absent;
                }
                Err(_) => tracing::debug!(
                    "SNMP GET {} on {} timed out (attempt {})",
                    oid_to_string(oid),
                    address,
                    attempt + 1
                ),
            }
        }
        SnmpValue::Absent
    }

    /// One GETNEXT with the retry budget. `None` ends the walk.
    async fn next_row(
        &self,
        session: &mut AsyncSession,
        address: &str,
        cursor: &[u64],
    ) -> Option<(Vec<u64>, Option<SnmpValue>)> {
        let request_oid = Oid::from(cursor).ok()?;

        for attempt in 0..=self.settings.retries {
            match timeout(self.settings.timeout, session.getnext(&request_oid)).await {
                Ok(Ok(mut response)) => {
                    let (oid, value) = response.varbinds.next()?;
                    let arcs: Vec<u64> = oid.iter()?.collect();
                    return Some((arcs, SnmpValue::from_wire(&value)));
                }
                Ok(Err(e)) => {
                    tracing::debug!("SNMP GETNEXT on {} failed: {}", address, e);
                    return None;
                }
                Err(_) => tracing::debug!(
                    "SNMP GETNEXT {} on {} timed out (attempt {})",
                    oid_to_string(cursor),
                    address,
                    attempt + 1
                ),
            }
        }
        None
    }

    async fn walk_table(&self, address: &str, community: &str, root: &[u64]) -> Vec<WalkRow> {
        let Some(mut session) = self.open_session(address, community).await else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        let mut cursor = root.to_vec();

        while rows.len() < self.settings.max_walk_rows {
            let Some((arcs, value)) = self.next_row(&mut session, address, &cursor).await else {
                break;
            };
            if arcs.len() <= root.len() || !arcs.starts_with(root) {
                break;
            }
            if arcs <= cursor {
                tracing::debug!(
                    "SNMP walk of {} on {} returned non-increasing OID {}",
                    oid_to_string(root),
                    address,
                    oid_to_string(&arcs)
                );
                break;
            }
            let Some(value) = value else {
                break;
            };

            rows.push(WalkRow::new(arcs[root.len()..].to_vec(), value));
            cursor = arcs;
        }

        if rows.len() >= self.settings.max_walk_rows {
            tracing::warn!(
                "SNMP walk of {} on {} stopped at {} rows",
                oid_to_string(root),
                address,
                rows.len()
            );
        }
        rows
    }
}

impl SnmpAgent for Snmp2Agent {
    fn agent_id(&self) -> &'static str {
        match self.version {
            SnmpVersion::V1 => "snmp-v1",
            SnmpVersion::V2c => "snmp-v2c",
        }
    }

    fn get<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        oid: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = SnmpValue> + Send + 'a>> {
        Box::pin(self.fetch(address, community, oid))
    }

    fn walk<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        root: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = Vec<WalkRow>> + Send + 'a>> {
        Box::pin(self.walk_table(address, community, root))
    }
}

/// Ordered list of agents; the first one that answers wins
pub struct AgentChain {
    agents: Vec<Box<dyn SnmpAgent>>,
}

impl AgentChain {
    pub fn new(agents: Vec<Box<dyn SnmpAgent>>) -> Self {
        Self { agents }
    }

    /// SNMPv2c first, then SNMPv1 for older gear
    pub fn production(settings: SnmpSettings) -> Self {
        Self::new(vec![
            Box::new(Snmp2Agent::new(SnmpVersion::V2c, settings.clone())),
            Box::new(Snmp2Agent::new(SnmpVersion::V1, settings)),
        ])
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl SnmpAgent for AgentChain {
    fn agent_id(&self) -> &'static str {
        "chain"
    }

    fn get<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        oid: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = SnmpValue> + Send + 'a>> {
        Box::pin(async move {
            for agent in &self.agents {
                let value = agent.get(address, community, oid).await;
                if !value.is_absent() {
                    return value;
                }
            }
            SnmpValue::Absent
        })
    }

    fn walk<'a>(
        &'a self,
        address: &'a str,
        community: &'a str,
        root: &'a [u64],
    ) -> Pin<Box<dyn Future<Output = Vec<WalkRow>> + Send + 'a>> {
        Box::pin(async move {
            for agent in &self.agents {
                let rows = agent.walk(address, community, root).await;
                if !rows.is_empty() {
                    return rows;
                }
            }
            Vec::new()
        })
    }
}
