//! NEXUS Inventory: network topology discovery
//!
//! This crate provides:
//! - SNMP device probing (identity and interface table)
//! - LLDP/CDP neighbor resolution into interface-to-interface links
//! - Host correlation from bridge forwarding and ARP tables
//! - A breadth-first crawler over private addresses
//! - An SSH prober for devices without SNMP
//! - SQLite inventory storage with idempotent upserts

pub mod app;
pub mod cli;
pub(crate) mod command_handlers;
pub mod config;
pub mod database;
pub mod discovery;
pub mod logging;
pub mod models;
pub mod network;
pub mod scanner;

pub use app::{AppContext, OutputHook, execute_command, execute_command_with_context, run};
pub use cli::{CliCommand, CrawlOptions};
pub use config::*;
pub use database::{Database, DeviceRecord, InterfaceRecord, InventoryCounts, InventoryStore};
pub use discovery::{LocalSystem, LocalSystemChain, TopologyCrawler, probe_self};
pub use models::*;
pub use scanner::{AgentChain, SnmpAgent, SnmpValue, SshTransport, WalkRow, ssh_probe};

// Re-export logging macros for use across crate
pub use crate::logging::macros;
