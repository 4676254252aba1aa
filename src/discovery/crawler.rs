//! Topology crawler
//!
//! Breadth-first walk over candidate addresses. Each address that answers the
//! device probe is visited exactly once per crawl; its neighbor tables, host
//! tables and routing peers feed the queue.

use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{DiscoveryConfig, DiscoveryModule};
use crate::database::{DeviceRecord, InventoryStore};
use crate::models::{CrawlMode, CrawlReport, Credentials};
use crate::network::is_crawl_eligible;
use crate::scanner::SnmpAgent;

use super::hosts::collect_hosts;
use super::local::{LocalSystem, probe_self};
use super::neighbors::resolve_neighbors;
use super::prober::probe;

/// FIFO work queue that never hands out the same address twice
struct Frontier {
    queue: VecDeque<String>,
    /// queued, visited or already probed without an answer
    seen: HashSet<String>,
    visited: Vec<String>,
    skipped: usize,
    max_queue: usize,
}

impl Frontier {
    fn new(max_queue: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            visited: Vec::new(),
            skipped: 0,
            max_queue,
        }
    }

    fn offer(&mut self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if self.seen.contains(candidate) || !is_crawl_eligible(candidate) {
            self.skipped += 1;
            return false;
        }
        if self.queue.len() >= self.max_queue {
            tracing::warn!("Crawl queue full ({}); dropping {}", self.max_queue, candidate);
            self.skipped += 1;
            return false;
        }
        self.seen.insert(candidate.to_string());
        self.queue.push_back(candidate.to_string());
        true
    }

    /// Keep `address` out of the queue for the rest of the crawl
    fn exclude(&mut self, address: &str) {
        self.seen.insert(address.trim().to_string());
    }

    fn next(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    fn mark_visited(&mut self, address: &str) {
        self.visited.push(address.to_string());
    }
}

/// Drives one crawl against an inventory store
pub struct TopologyCrawler {
    store: Arc<dyn InventoryStore>,
    agent: Arc<dyn SnmpAgent>,
    local: Arc<dyn LocalSystem>,
    config: DiscoveryConfig,
}

impl TopologyCrawler {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        agent: Arc<dyn SnmpAgent>,
        local: Arc<dyn LocalSystem>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            store,
            agent,
            local,
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Probe the local machine, then crawl outward from `seed`
    pub async fn discover(&self, seed: &str) -> Result<CrawlReport> {
        let started = Instant::now();
        crate::log_stderr!(
            "Discovery from {} (modules: {})",
            seed,
            self.config.modules
        );

        let self_device = self.probe_local().await;
        let seeds = vec![seed.trim().to_string()];
        self.crawl(CrawlMode::Discover, seeds, self_device, started)
            .await
    }

    /// Re-walk everything already known: addresses seen from this machine
    /// plus every stored management address
    pub async fn rescan_known(&self) -> Result<CrawlReport> {
        let started = Instant::now();
        crate::log_stderr!("Rescan of known devices (modules: {})", self.config.modules);

        let self_device = self.probe_local().await;
        let mut seeds: Vec<String> = Vec::new();
        if let Some(device) = &self_device {
            match self.store.host_ips_for_device(device.id) {
                Ok(ips) => seeds.extend(ips),
                Err(e) => tracing::warn!("Failed to read local host addresses: {}", e),
            }
        }
        seeds.extend(
            self.store
                .known_management_addresses()
                .context("Failed to read known management addresses")?,
        );

        self.crawl(CrawlMode::Rescan, seeds, self_device, started)
            .await
    }

    async fn probe_local(&self) -> Option<DeviceRecord> {
        match probe_self(
            self.store.as_ref(),
            self.agent.as_ref(),
            self.local.as_ref(),
            &self.config.community,
        )
        .await
        {
            Ok(device) => device,
            Err(e) => {
                tracing::warn!("Local endpoint probe failed: {}", e);
                None
            }
        }
    }

    async fn crawl(
        &self,
        mode: CrawlMode,
        seeds: Vec<String>,
        self_device: Option<DeviceRecord>,
        started: Instant,
    ) -> Result<CrawlReport> {
        let mut frontier = Frontier::new(self.config.max_queue);
        // The local machine is recorded by probe_self; an SNMP probe of it
        // would mark it offline whenever no agent runs there.
        if let Some(own) = self_device.as_ref().and_then(|d| d.management_ip.as_deref()) {
            frontier.exclude(own);
        }
        for seed in &seeds {
            frontier.offer(seed);
        }

        let credentials = Credentials::snmp(self.config.community.clone());
        let mut probed = 0usize;
        let mut deadline_reached = false;

        loop {
            if let Some(deadline) = self.config.deadline
                && started.elapsed() >= deadline
                && !frontier.queue.is_empty()
            {
                crate::log_warn!(
                    "Crawl deadline of {:?} reached with {} address(es) queued",
                    deadline,
                    frontier.queue.len()
                );
                deadline_reached = true;
                break;
            }
            let Some(address) = frontier.next() else {
                break;
            };

            probed += 1;
            let device = match probe(
                self.store.as_ref(),
                self.agent.as_ref(),
                &address,
                &credentials,
            )
            .await
            {
                Ok(Some(found)) => found,
                Ok(None) => {
                    tracing::debug!("{} did not answer; not visited", address);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Probe of {} failed: {}", address, e);
                    continue;
                }
            };
            frontier.mark_visited(&address);
            crate::log_stderr!(
                "Visited {} ({})",
                address,
                device.device.hostname
            );

            let mut routing_peers: Vec<String> = Vec::new();
            let modules = &self.config.modules;
            if modules.wants_neighbors() || modules.wants_routing() {
                match resolve_neighbors(
                    self.store.as_ref(),
                    self.agent.as_ref(),
                    &address,
                    &device.community,
                    modules,
                )
                .await
                {
                    Ok(peers) => routing_peers = peers,
                    Err(e) => tracing::warn!("Neighbor resolution for {} failed: {}", address, e),
                }
            }

            if modules.contains(DiscoveryModule::Arp)
                && let Err(e) = collect_hosts(
                    self.store.as_ref(),
                    self.agent.as_ref(),
                    &address,
                    &device.community,
                )
                .await
            {
                tracing::warn!("Host correlation for {} failed: {}", address, e);
            }

            match self.store.host_ips_for_device(device.device.id) {
                Ok(ips) => {
                    for ip in ips {
                        frontier.offer(&ip);
                    }
                }
                Err(e) => tracing::warn!("Failed to read host addresses of {}: {}", address, e),
            }
            for peer in routing_peers {
                frontier.offer(&peer);
            }
        }

        let inventory = self
            .store
            .inventory_counts()
            .context("Failed to count inventory")?;
        let duration_ms = started.elapsed().as_millis() as u64;
        crate::log_stderr!(
            "Crawl finished: {} visited, {} probed, {} skipped in {} ms",
            frontier.visited.len(),
            probed,
            frontier.skipped,
            duration_ms
        );

        Ok(CrawlReport {
            mode,
            seeds,
            modules: self.config.modules.to_string(),
            visited: frontier.visited,
            probed,
            skipped: frontier.skipped,
            self_device: self_device.map(|d| d.hostname),
            deadline_reached,
            duration_ms,
            inventory,
        })
    }
}
