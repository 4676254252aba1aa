//! SSH-based device prober
//!
//! Alternate identity source for devices that do not speak SNMP. Runs
//! "show version" and "show ip interface brief" through an [`SshTransport`]
//! and folds the parsed output into the inventory.

use anyhow::{Context, Result, anyhow, bail};
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::database::{DevicePatch, InterfacePatch, InventoryStore};
use crate::models::{Credentials, SshProbeReport};

const SHOW_VERSION: &str = "show version";
const SHOW_INTERFACES: &str = "show ip interface brief";
const HOSTNAME_COMMAND: &str = "hostname";

/// Runs one remote command and returns its stdout
pub trait SshTransport: Send + Sync {
    fn run<'a>(
        &'a self,
        address: &'a str,
        credentials: &'a Credentials,
        command: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Transport backed by the system OpenSSH client (`sshpass` when a password is set)
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    timeout: Duration,
}

impl OpenSshTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_command(&self, address: &str, credentials: &Credentials, command: &str) -> Command {
        let use_password = !credentials.ssh_password.is_empty();
        let mut cmd = if use_password {
            let mut c = Command::new("sshpass");
            c.arg("-e").arg("ssh").env("SSHPASS", &credentials.ssh_password);
            c
        } else {
            let mut c = Command::new("ssh");
            c.args(["-o", "BatchMode=yes"]);
            c
        };

        cmd.args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.timeout.as_secs().max(1)))
            .arg("-l")
            .arg(&credentials.ssh_username)
            .arg(address)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl SshTransport for OpenSshTransport {
    fn run<'a>(
        &'a self,
        address: &'a str,
        credentials: &'a Credentials,
        command: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let output = tokio::time::timeout(
                self.timeout,
                self.build_command(address, credentials, command).output(),
            )
            .await
            .map_err(|_| anyhow!("ssh to {} timed out after {:?}", address, self.timeout))?
            .context("Failed to launch ssh client")?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!(
                    "ssh {} `{}` exited with {}: {}",
                    address,
                    command,
                    output.status,
                    stderr.trim()
                );
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }
}

/// Hostname from "show version" output: the last token of the first line
/// starting with "hostname" or containing "name:"
pub fn parse_version_hostname(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let lower = line.to_lowercase();
        if lower.trim_start().starts_with("hostname") || lower.contains("name:") {
            line.split_whitespace().last().map(str::to_string)
        } else {
            None
        }
    })
}

/// One row of "show ip interface brief"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefInterface {
    pub name: String,
    pub ip_address: Option<String>,
    pub status: Option<String>,
}

/// Rows of "show ip interface brief"; the header line is skipped and
/// "unassigned" addresses become `None`
pub fn parse_interface_brief(output: &str) -> Vec<BriefInterface> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 || line.trim_start().to_lowercase().starts_with("interface") {
                return None;
            }
            let ip_address = Some(parts[1])
                .filter(|ip| !ip.eq_ignore_ascii_case("unassigned"))
                .map(str::to_string);
            // Interface IP-Address OK? Method Status Protocol; Status may be two words
            let status = (parts.len() >= 6).then(|| parts[4..parts.len() - 1].join(" "));
            Some(BriefInterface {
                name: parts[0].to_string(),
                ip_address,
                status,
            })
        })
        .collect()
}

/// Probe `address` over SSH and upsert the device and its interfaces
pub async fn ssh_probe(
    store: &dyn InventoryStore,
    transport: &dyn SshTransport,
    address: &str,
    credentials: &Credentials,
    device_type: &str,
) -> Result<SshProbeReport> {
    let known = store.device_by_address(address)?;
    let credentials = &credentials.ssh_for(known.as_ref());
    if credentials.ssh_username.trim().is_empty() {
        bail!("No SSH user name given or configured for {}", address);
    }
    crate::log_stderr!("SSH probe of {} as {} ({})", address, credentials.ssh_username, device_type);

    let version = match transport.run(address, credentials, SHOW_VERSION).await {
        Ok(out) => out,
        Err(e) => {
            record_roadblock(store, address, &format!("ssh: {}", e));
            return Err(e.context(format!("SSH probe of {} failed", address)));
        }
    };

    let mut hostname = parse_version_hostname(&version);
    if hostname.is_none() {
        hostname = transport
            .run(address, credentials, HOSTNAME_COMMAND)
            .await
            .ok()
            .and_then(|out| out.lines().next().map(|l| l.trim().to_string()))
            .filter(|h| !h.is_empty() && !h.contains(char::is_whitespace));
    }

    let brief = match transport.run(address, credentials, SHOW_INTERFACES).await {
        Ok(out) => parse_interface_brief(&out),
        Err(e) => {
            tracing::debug!("Interface listing on {} failed: {}", address, e);
            Vec::new()
        }
    };

    let patch = DevicePatch {
        hostname,
        discovered_ssh_username: Some(credentials.ssh_username.clone()),
        discovered_ssh_password: Some(credentials.ssh_password.clone()),
        roadblocks: Some(String::new()),
        is_online: Some(true),
        touch_last_seen: true,
        touch_last_scanned: true,
        ..Default::default()
    };
    let device = store.upsert_device_by_address(address, &patch)?;

    let mut interfaces = 0;
    for row in &brief {
        let patch = InterfacePatch {
            ip_address: row.ip_address.clone(),
            status: row.status.clone(),
            ..Default::default()
        };
        match store.upsert_interface(device.id, &row.name, &patch) {
            Ok(_) => interfaces += 1,
            Err(e) => tracing::warn!("Failed to store interface {} of {}: {}", row.name, address, e),
        }
    }

    Ok(SshProbeReport {
        address: address.to_string(),
        device_type: device_type.to_string(),
        device: Some(device),
        interfaces,
    })
}

fn record_roadblock(store: &dyn InventoryStore, address: &str, note: &str) {
    match store.device_by_address(address) {
        Ok(Some(_)) => {
            let patch = DevicePatch {
                roadblocks: Some(note.to_string()),
                is_online: Some(false),
                ..Default::default()
            };
            if let Err(e) = store.upsert_device_by_address(address, &patch) {
                tracing::warn!("Failed to record roadblock for {}: {}", address, e);
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to look up {}: {}", address, e),
    }
}
