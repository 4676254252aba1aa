//! Database models
//!
//! Inventory records returned by the store, plus the patch types the
//! discovery components hand to the upsert operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    pub id: i64,
    pub hostname: String,
    /// `None` for stub devices created only to anchor a neighbor link
    pub management_ip: Option<String>,
    pub vendor: String,
    pub model: String,
    pub os_version: String,
    /// Operator-configured community, tried before the crawl default
    pub snmp_community: String,
    pub ssh_username: String,
    #[serde(skip_serializing, default)]
    pub ssh_password: String,
    pub discovered_snmp_community: String,
    pub discovered_ssh_username: String,
    #[serde(skip_serializing, default)]
    pub discovered_ssh_password: String,
    /// Last obstacle met while probing this device
    pub roadblocks: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_scanned: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    pub fn is_stub(&self) -> bool {
        self.management_ip.is_none()
    }
}

/// Interface record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceRecord {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub status: String,
    pub last_scanned: Option<DateTime<Utc>>,
}

/// Connection record; `interface_a < interface_b` always holds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionRecord {
    pub id: i64,
    pub interface_a: i64,
    pub interface_b: i64,
    pub description: String,
}

impl ConnectionRecord {
    /// The far end of this link as seen from `interface_id`
    pub fn other_end(&self, interface_id: i64) -> Option<i64> {
        if self.interface_a == interface_id {
            Some(self.interface_b)
        } else if self.interface_b == interface_id {
            Some(self.interface_a)
        } else {
            None
        }
    }
}

/// Host record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostRecord {
    pub id: i64,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub interface_id: Option<i64>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Row counts for the summary command
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InventoryCounts {
    pub devices: i64,
    pub stub_devices: i64,
    pub online_devices: i64,
    pub interfaces: i64,
    pub connections: i64,
    pub hosts: i64,
}

/// Field updates applied to a Device after it is located or created.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
    pub discovered_snmp_community: Option<String>,
    pub discovered_ssh_username: Option<String>,
    pub discovered_ssh_password: Option<String>,
    pub roadblocks: Option<String>,
    pub is_online: Option<bool>,
    pub touch_last_seen: bool,
    pub touch_last_scanned: bool,
}

/// Field updates applied to an Interface; `None` keeps the stored value
/// (or the column default on creation).
#[derive(Debug, Clone, Default)]
pub struct InterfacePatch {
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub status: Option<String>,
}

/// Field updates applied to a Host; `last_seen` is always refreshed.
#[derive(Debug, Clone, Default)]
pub struct HostPatch {
    pub ip_address: Option<String>,
    pub interface_id: Option<i64>,
}
