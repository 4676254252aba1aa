use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::AppContext;
use crate::cli::CrawlOptions;
use crate::database::{Database, InventoryCounts, get_all_devices, get_interfaces_for_device};
use crate::discovery::TopologyCrawler;
use crate::models::Credentials;
use crate::scanner::ssh_probe;

/// One line of the `summary` device table
#[derive(Debug, Serialize)]
pub(crate) struct DeviceSummary {
    hostname: String,
    management_ip: Option<String>,
    vendor: String,
    os_version: String,
    is_online: bool,
    is_stub: bool,
    interfaces: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    roadblocks: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InventorySummary {
    database: String,
    inventory: InventoryCounts,
    devices: Vec<DeviceSummary>,
}

fn crawler_for(context: &AppContext, options: &CrawlOptions) -> Result<TopologyCrawler> {
    let config = context.crawl_config(options);
    let db = context.open_database(options.db.as_ref())?;
    crate::log_stderr!("Inventory database: {}", db.path().display());
    Ok(TopologyCrawler::new(
        Arc::new(db),
        context.snmp_agent(&config),
        context.local_system(),
        config,
    ))
}

pub(crate) async fn handle_discover(
    context: &AppContext,
    seed: &str,
    options: &CrawlOptions,
) -> Result<()> {
    crate::log_stderr!(
        "NEXUS Inventory v{}: discover",
        env!("CARGO_PKG_VERSION")
    );
    let crawler = crawler_for(context, options)?;
    let report = crawler.discover(seed).await?;
    context.emit_json(&report, "discover report")
}

pub(crate) async fn handle_rescan(context: &AppContext, options: &CrawlOptions) -> Result<()> {
    crate::log_stderr!(
        "NEXUS Inventory v{}: rescan",
        env!("CARGO_PKG_VERSION")
    );
    let crawler = crawler_for(context, options)?;
    let report = crawler.rescan_known().await?;
    context.emit_json(&report, "rescan report")
}

pub(crate) async fn handle_ssh_probe(
    context: &AppContext,
    address: &str,
    username: Option<&str>,
    password: Option<&str>,
    device_type: &str,
    db: Option<&PathBuf>,
) -> Result<()> {
    let db = context.open_database(db)?;
    let transport = context.ssh_transport();
    let credentials = Credentials::ssh(username.unwrap_or_default(), password.unwrap_or_default());

    let report = ssh_probe(&db, transport.as_ref(), address, &credentials, device_type).await?;
    context.emit_json(&report, "ssh-probe report")
}

pub(crate) async fn handle_summary(context: &AppContext, db: Option<&PathBuf>) -> Result<()> {
    let db = context.open_database(db)?;
    let summary = build_summary(&db)?;
    context.emit_json(&summary, "inventory summary")
}

fn build_summary(db: &Database) -> Result<InventorySummary> {
    let conn = db.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;

    let inventory = crate::database::get_inventory_counts(&conn)
        .context("Failed to count inventory")?;
    let mut devices = Vec::new();
    for device in get_all_devices(&conn).context("Failed to load devices")? {
        let interfaces = get_interfaces_for_device(&conn, device.id)
            .with_context(|| format!("Failed to load interfaces of {}", device.hostname))?
            .len();
        devices.push(DeviceSummary {
            is_stub: device.is_stub(),
            hostname: device.hostname,
            management_ip: device.management_ip,
            vendor: device.vendor,
            os_version: device.os_version,
            is_online: device.is_online,
            interfaces,
            roadblocks: device.roadblocks,
        });
    }

    Ok(InventorySummary {
        database: db.path().display().to_string(),
        inventory,
        devices,
    })
}
