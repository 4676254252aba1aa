//! Local endpoint probe
//!
//! Records the machine running the crawl as a device, with its interfaces and
//! the hosts in its neighbor cache, so the crawl starts from a known point.
//! Everything here is best-effort: a failure is logged and never aborts the
//! crawl.

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::process::Command;

use crate::database::{DevicePatch, DeviceRecord, HostPatch, InterfacePatch, InventoryStore};
use crate::network::{
    self, DefaultRoute, LocalInterface, NeighborEntry, best_interface, list_local_interfaces,
};
use crate::scanner::SnmpAgent;

use super::hosts::collect_hosts;

/// What the crawler may learn about the machine it runs on
pub trait LocalSystem: Send + Sync {
    fn source_id(&self) -> &'static str;

    fn hostname(&self) -> Option<String> {
        dns_lookup::get_hostname()
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
    }

    fn default_route<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<DefaultRoute>> + Send + 'a>>;

    fn interfaces(&self) -> Vec<LocalInterface> {
        list_local_interfaces()
    }

    fn neighbors<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<NeighborEntry>> + Send + 'a>>;

    fn resolve_hostname<'a>(
        &'a self,
        hostname: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Ipv4Addr>> + Send + 'a>> {
        Box::pin(network::resolve_hostname(hostname))
    }

    /// OS family shown as the self-device vendor
    fn os_family(&self) -> String {
        let os = std::env::consts::OS;
        let mut chars = os.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn os_version(&self) -> Option<String> {
        None
    }
}

/// Reads the Linux procfs tables
#[derive(Debug, Clone)]
pub struct ProcFsSystem {
    root: PathBuf,
}

impl ProcFsSystem {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, relative: &str) -> Option<String> {
        let path = self.root.join(relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_sync(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(relative))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl Default for ProcFsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSystem for ProcFsSystem {
    fn source_id(&self) -> &'static str {
        "procfs"
    }

    fn hostname(&self) -> Option<String> {
        self.read_sync("sys/kernel/hostname")
    }

    fn default_route<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<DefaultRoute>> + Send + 'a>> {
        Box::pin(async move {
            let content = self.read("net/route").await?;
            network::parse_proc_route(&content)
        })
    }

    fn neighbors<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<NeighborEntry>> + Send + 'a>> {
        Box::pin(async move {
            self.read("net/arp")
                .await
                .map(|content| network::parse_proc_arp(&content))
                .unwrap_or_default()
        })
    }

    fn os_version(&self) -> Option<String> {
        let release = self.read_sync("sys/kernel/osrelease")?;
        Some(format!(
            "{}-{}-{}",
            self.os_family(),
            release,
            std::env::consts::ARCH
        ))
    }
}

/// Parses the output of the `ip` command
#[derive(Debug, Clone, Default)]
pub struct IpCommandSystem;

impl IpCommandSystem {
    async fn run(args: &[&str]) -> Option<String> {
        match Command::new("ip").args(args).kill_on_drop(true).output().await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                tracing::debug!("`ip {}` exited with {}", args.join(" "), output.status);
                None
            }
            Err(e) => {
                tracing::debug!("`ip {}` failed to start: {}", args.join(" "), e);
                None
            }
        }
    }
}

impl LocalSystem for IpCommandSystem {
    fn source_id(&self) -> &'static str {
        "ip-command"
    }

    fn default_route<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<DefaultRoute>> + Send + 'a>> {
        Box::pin(async move {
            let output = Self::run(&["route", "show", "default"]).await?;
            network::parse_ip_route(&output)
        })
    }

    fn neighbors<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<NeighborEntry>> + Send + 'a>> {
        Box::pin(async move {
            Self::run(&["neigh"])
                .await
                .map(|output| network::parse_ip_neigh(&output))
                .unwrap_or_default()
        })
    }
}

/// Ordered list of sources; for each question the first useful answer wins
pub struct LocalSystemChain {
    sources: Vec<Box<dyn LocalSystem>>,
}

impl LocalSystemChain {
    pub fn new(sources: Vec<Box<dyn LocalSystem>>) -> Self {
        Self { sources }
    }

    /// procfs first, then the `ip` command
    pub fn production() -> Self {
        Self::new(vec![
            Box::new(ProcFsSystem::new()),
            Box::new(IpCommandSystem),
        ])
    }
}

impl LocalSystem for LocalSystemChain {
    fn source_id(&self) -> &'static str {
        "chain"
    }

    fn hostname(&self) -> Option<String> {
        self.sources.iter().find_map(|s| s.hostname())
    }

    fn default_route<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<DefaultRoute>> + Send + 'a>> {
        Box::pin(async move {
            for source in &self.sources {
                if let Some(route) = source.default_route().await {
                    tracing::debug!("Default route from {}", source.source_id());
                    return Some(route);
                }
            }
            None
        })
    }

    fn interfaces(&self) -> Vec<LocalInterface> {
        self.sources
            .iter()
            .map(|s| s.interfaces())
            .find(|list| !list.is_empty())
            .unwrap_or_default()
    }

    fn neighbors<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<NeighborEntry>> + Send + 'a>> {
        Box::pin(async move {
            for source in &self.sources {
                let entries = source.neighbors().await;
                if !entries.is_empty() {
                    return entries;
                }
            }
            Vec::new()
        })
    }

    fn resolve_hostname<'a>(
        &'a self,
        hostname: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Ipv4Addr>> + Send + 'a>> {
        Box::pin(async move {
            for source in &self.sources {
                if let Some(ip) = source.resolve_hostname(hostname).await {
                    return Some(ip);
                }
            }
            None
        })
    }

    fn os_family(&self) -> String {
        self.sources
            .first()
            .map(|s| s.os_family())
            .unwrap_or_default()
    }

    fn os_version(&self) -> Option<String> {
        self.sources.iter().find_map(|s| s.os_version())
    }
}

/// Management address: the default-route interface's IPv4, else the
/// hostname's DNS answer, else the best-scored up interface
async fn management_address(
    system: &dyn LocalSystem,
    hostname: &str,
    route: Option<&DefaultRoute>,
    interfaces: &[LocalInterface],
) -> Option<Ipv4Addr> {
    if let Some(route) = route
        && let Some(ip) = interfaces
            .iter()
            .find(|i| i.name == route.interface)
            .and_then(|i| i.ipv4)
    {
        return Some(ip);
    }
    if let Some(ip) = system.resolve_hostname(hostname).await {
        return Some(ip);
    }
    best_interface(interfaces).and_then(|i| i.ipv4)
}

/// Record this machine as a device and correlate what it can see locally.
///
/// Returns `Ok(None)` when the host name cannot be determined.
pub async fn probe_self(
    store: &dyn InventoryStore,
    agent: &dyn SnmpAgent,
    system: &dyn LocalSystem,
    community: &str,
) -> Result<Option<DeviceRecord>> {
    let Some(hostname) = system.hostname() else {
        tracing::warn!("Local host name unavailable; skipping self probe");
        return Ok(None);
    };

    let route = system.default_route().await;
    let interfaces = system.interfaces();
    let mgmt = management_address(system, &hostname, route.as_ref(), &interfaces).await;

    let patch = DevicePatch {
        vendor: Some(system.os_family()),
        os_version: system.os_version(),
        is_online: Some(true),
        touch_last_seen: true,
        touch_last_scanned: true,
        ..Default::default()
    };
    let mgmt_text = mgmt.map(|ip| ip.to_string());
    let device = store.upsert_device_by_hostname(&hostname, mgmt_text.as_deref(), &patch)?;
    crate::log_stderr!(
        "Local host {} recorded as device {} ({})",
        hostname,
        device.id,
        mgmt_text.as_deref().unwrap_or("no management address")
    );

    let mut by_name: HashMap<String, i64> = HashMap::new();
    for iface in &interfaces {
        let patch = InterfacePatch {
            mac_address: iface.mac.clone(),
            ip_address: iface.ipv4.map(|ip| ip.to_string()),
            // ifOperStatus codes: 1 up, 2 down
            status: Some(if iface.is_up { "1" } else { "2" }.to_string()),
        };
        let stored = store.upsert_interface(device.id, &iface.name, &patch)?;
        by_name.insert(stored.name.clone(), stored.id);
    }

    for entry in system.neighbors().await {
        let patch = HostPatch {
            ip_address: Some(entry.ip.to_string()),
            interface_id: by_name.get(&entry.interface).copied(),
        };
        if let Err(e) = store.upsert_host(&entry.mac, &patch) {
            tracing::warn!("Failed to store local neighbor {}: {}", entry.ip, e);
        }
    }

    let gateway = route.as_ref().and_then(|r| r.gateway).map(|g| g.to_string());
    for target in [mgmt_text.as_deref(), gateway.as_deref()].into_iter().flatten() {
        if let Err(e) = collect_hosts(store, agent, target, community).await {
            tracing::warn!("Host correlation via {} failed: {}", target, e);
        }
    }

    Ok(Some(device))
}
