//! NEXUS Inventory CLI
//!
//! Crawls a network from a seed address over SNMP (LLDP/CDP neighbors,
//! forwarding and ARP tables, routing peers) and keeps a SQLite inventory
//! of devices, interfaces, links and end hosts.

#[tokio::main]
async fn main() {
    if let Err(e) = nexus_inventory::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    if let Err(e) = nexus_inventory::run(std::env::args()).await {
        nexus_inventory::log_error!("{:#}", e);
        std::process::exit(1);
    }
}
