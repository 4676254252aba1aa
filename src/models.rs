//! Data models shared by the crawler, the probers and the CLI

use serde::{Deserialize, Serialize};

use crate::database::{DeviceRecord, InventoryCounts};

/// Credentials handed to the probers for one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub community: String,
    pub ssh_username: String,
    pub ssh_password: String,
}

impl Credentials {
    pub fn snmp(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            ..Default::default()
        }
    }

    pub fn ssh(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssh_username: username.into(),
            ssh_password: password.into(),
            ..Default::default()
        }
    }

    /// Communities to try for `device`: its configured override first, then
    /// this crawl's default. Empty and repeated entries are dropped.
    pub fn community_chain(&self, device: Option<&DeviceRecord>) -> Vec<String> {
        let mut chain: Vec<String> = Vec::with_capacity(2);
        let configured = device.map(|d| d.snmp_community.trim()).unwrap_or("");
        for candidate in [configured, self.community.trim()] {
            if !candidate.is_empty() && !chain.iter().any(|c| c == candidate) {
                chain.push(candidate.to_string());
            }
        }
        chain
    }

    /// SSH login for `device`: these credentials when they name a user,
    /// otherwise the device's configured ones
    pub fn ssh_for(&self, device: Option<&DeviceRecord>) -> Credentials {
        match device {
            Some(d) if self.ssh_username.trim().is_empty() && !d.ssh_username.is_empty() => {
                Credentials {
                    community: self.community.clone(),
                    ssh_username: d.ssh_username.clone(),
                    ssh_password: d.ssh_password.clone(),
                }
            }
            _ => self.clone(),
        }
    }
}

/// Which crawl entry point produced a report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    Discover,
    Rescan,
}

/// Outcome of one crawl invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub mode: CrawlMode,
    pub seeds: Vec<String>,
    pub modules: String,
    /// Addresses that answered the device probe, in visit order
    pub visited: Vec<String>,
    /// Addresses handed to the device probe (answered or not)
    pub probed: usize,
    /// Queue entries discarded as duplicate, ineligible or over capacity
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_device: Option<String>,
    /// Set when the crawl stopped on its deadline with work still queued
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deadline_reached: bool,
    pub duration_ms: u64,
    pub inventory: InventoryCounts,
}

/// Outcome of an SSH probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshProbeReport {
    pub address: String,
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceRecord>,
    pub interfaces: usize,
}
