//! Configuration constants and runtime-tunable settings for the inventory crawler

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ====== SNMP Configuration ======

/// SNMP community string for v1/v2c
pub const SNMP_COMMUNITY: &str = "public";

/// SNMP query timeout (per request attempt)
pub const SNMP_TIMEOUT: Duration = Duration::from_secs(1);

/// Extra attempts after the first timed-out SNMP request
pub const SNMP_RETRIES: u8 = 0;

/// SNMP port
pub const SNMP_PORT: u16 = 161;

/// Hard cap on rows accepted from a single table walk
pub const SNMP_MAX_WALK_ROWS: usize = 10_000;

// ====== Crawl Configuration ======

/// Modules enabled when nothing is configured
pub const DEFAULT_DISCOVERY_MODULES: &str = "arp,cdp,lldp";

/// Overall crawl deadline in seconds (0 disables the deadline)
pub const CRAWL_DEADLINE_SECS: u64 = 0;

/// Maximum number of pending addresses in the crawl frontier
pub const CRAWL_MAX_QUEUE: usize = 4096;

// ====== SSH Configuration ======

/// Per-command SSH timeout
pub const SSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Device type assumed by the SSH prober when none is given
pub const SSH_DEFAULT_DEVICE_TYPE: &str = "cisco_ios";

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_u16(name: &str, default: u16, min: u16, max: u16) -> u16 {
    match env_var(name).and_then(|v| v.parse::<u16>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_u8(name: &str, default: u8, min: u8, max: u8) -> u8 {
    match env_var(name).and_then(|v| v.parse::<u8>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

/// Runtime-tunable SNMP community.
/// Env: `NEXUS_SNMP_COMMUNITY`
pub fn snmp_community() -> String {
    env_var("NEXUS_SNMP_COMMUNITY").unwrap_or_else(|| SNMP_COMMUNITY.to_string())
}

/// Runtime-tunable SNMP timeout.
/// Env: `NEXUS_SNMP_TIMEOUT_MS`
pub fn snmp_timeout() -> Duration {
    Duration::from_millis(env_parse_u64(
        "NEXUS_SNMP_TIMEOUT_MS",
        SNMP_TIMEOUT.as_millis() as u64,
        100,
        10_000,
    ))
}

/// Runtime-tunable SNMP retry count.
/// Env: `NEXUS_SNMP_RETRIES`
pub fn snmp_retries() -> u8 {
    env_parse_u8("NEXUS_SNMP_RETRIES", SNMP_RETRIES, 0, 5)
}

/// Runtime-tunable SNMP port.
/// Env: `NEXUS_SNMP_PORT`
pub fn snmp_port() -> u16 {
    env_parse_u16("NEXUS_SNMP_PORT", SNMP_PORT, 1, u16::MAX)
}

/// Runtime-tunable walk row cap.
/// Env: `NEXUS_SNMP_MAX_WALK_ROWS`
pub fn snmp_max_walk_rows() -> usize {
    env_parse_usize(
        "NEXUS_SNMP_MAX_WALK_ROWS",
        SNMP_MAX_WALK_ROWS,
        16,
        1_000_000,
    )
}

/// Runtime-tunable crawl deadline; `None` when disabled.
/// Env: `NEXUS_CRAWL_DEADLINE_SECS`
pub fn crawl_deadline() -> Option<Duration> {
    match env_parse_u64("NEXUS_CRAWL_DEADLINE_SECS", CRAWL_DEADLINE_SECS, 0, 86_400) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

/// Runtime-tunable frontier cap.
/// Env: `NEXUS_CRAWL_MAX_QUEUE`
pub fn crawl_max_queue() -> usize {
    env_parse_usize("NEXUS_CRAWL_MAX_QUEUE", CRAWL_MAX_QUEUE, 16, 1_000_000)
}

/// Runtime-tunable SSH command timeout.
/// Env: `NEXUS_SSH_TIMEOUT_MS`
pub fn ssh_timeout() -> Duration {
    Duration::from_millis(env_parse_u64(
        "NEXUS_SSH_TIMEOUT_MS",
        SSH_TIMEOUT.as_millis() as u64,
        500,
        120_000,
    ))
}

/// Runtime-tunable enabled discovery modules.
/// Env: `NEXUS_DISCOVERY_MODULES` (comma-separated, e.g. `arp,cdp,lldp,ospf`)
pub fn discovery_modules() -> ModuleSet {
    env_var("NEXUS_DISCOVERY_MODULES")
        .map(|raw| ModuleSet::parse_lenient(&raw))
        .unwrap_or_default()
}

/// Database path override.
/// Env: `NEXUS_DB_PATH`
pub fn db_path_override() -> Option<PathBuf> {
    env_var("NEXUS_DB_PATH").map(PathBuf::from)
}

/// A data source the crawler may consult for each visited device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscoveryModule {
    Arp,
    Cdp,
    Lldp,
    Ospf,
    Ospfv3,
    Bgp,
}

impl DiscoveryModule {
    pub const ALL: [DiscoveryModule; 6] = [
        DiscoveryModule::Arp,
        DiscoveryModule::Cdp,
        DiscoveryModule::Lldp,
        DiscoveryModule::Ospf,
        DiscoveryModule::Ospfv3,
        DiscoveryModule::Bgp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryModule::Arp => "arp",
            DiscoveryModule::Cdp => "cdp",
            DiscoveryModule::Lldp => "lldp",
            DiscoveryModule::Ospf => "ospf",
            DiscoveryModule::Ospfv3 => "ospfv3",
            DiscoveryModule::Bgp => "bgp",
        }
    }

    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            DiscoveryModule::Ospf | DiscoveryModule::Ospfv3 | DiscoveryModule::Bgp
        )
    }
}

impl fmt::Display for DiscoveryModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arp" => Ok(DiscoveryModule::Arp),
            "cdp" => Ok(DiscoveryModule::Cdp),
            "lldp" => Ok(DiscoveryModule::Lldp),
            "ospf" => Ok(DiscoveryModule::Ospf),
            "ospfv3" => Ok(DiscoveryModule::Ospfv3),
            "bgp" => Ok(DiscoveryModule::Bgp),
            other => Err(format!("Unknown discovery module: {}", other)),
        }
    }
}

/// The set of enabled discovery modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSet(BTreeSet<DiscoveryModule>);

impl ModuleSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn all() -> Self {
        Self(DiscoveryModule::ALL.into_iter().collect())
    }

    /// Strict parse used by the CLI: every entry must be a known module.
    pub fn parse(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(DiscoveryModule::from_str)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Lenient parse used for env configuration: unknown entries are dropped.
    pub fn parse_lenient(raw: &str) -> Self {
        let mut set = BTreeSet::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match entry.parse::<DiscoveryModule>() {
                Ok(module) => {
                    set.insert(module);
                }
                Err(e) => tracing::warn!("Ignoring discovery module entry: {}", e),
            }
        }
        Self(set)
    }

    pub fn contains(&self, module: DiscoveryModule) -> bool {
        self.0.contains(&module)
    }

    /// True when CDP or LLDP neighbor tables should be consulted
    pub fn wants_neighbors(&self) -> bool {
        self.contains(DiscoveryModule::Cdp) || self.contains(DiscoveryModule::Lldp)
    }

    pub fn wants_routing(&self) -> bool {
        self.0.iter().any(DiscoveryModule::is_routing)
    }

    pub fn iter(&self) -> impl Iterator<Item = DiscoveryModule> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self::parse_lenient(DEFAULT_DISCOVERY_MODULES)
    }
}

impl FromIterator<DiscoveryModule> for ModuleSet {
    fn from_iter<T: IntoIterator<Item = DiscoveryModule>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(DiscoveryModule::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// SNMP transport policy shared by every request of one crawl
#[derive(Debug, Clone)]
pub struct SnmpSettings {
    pub port: u16,
    pub timeout: Duration,
    pub retries: u8,
    pub max_walk_rows: usize,
}

impl SnmpSettings {
    pub fn from_env() -> Self {
        Self {
            port: snmp_port(),
            timeout: snmp_timeout(),
            retries: snmp_retries(),
            max_walk_rows: snmp_max_walk_rows(),
        }
    }
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            port: SNMP_PORT,
            timeout: SNMP_TIMEOUT,
            retries: SNMP_RETRIES,
            max_walk_rows: SNMP_MAX_WALK_ROWS,
        }
    }
}

/// Snapshot of all crawl settings, read once per crawl invocation
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub modules: ModuleSet,
    pub community: String,
    pub snmp: SnmpSettings,
    pub deadline: Option<Duration>,
    pub max_queue: usize,
    pub ssh_timeout: Duration,
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        Self {
            modules: discovery_modules(),
            community: snmp_community(),
            snmp: SnmpSettings::from_env(),
            deadline: crawl_deadline(),
            max_queue: crawl_max_queue(),
            ssh_timeout: ssh_timeout(),
        }
    }

    pub fn with_modules(mut self, modules: ModuleSet) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            modules: ModuleSet::default(),
            community: SNMP_COMMUNITY.to_string(),
            snmp: SnmpSettings::default(),
            deadline: None,
            max_queue: CRAWL_MAX_QUEUE,
            ssh_timeout: SSH_TIMEOUT,
        }
    }
}
