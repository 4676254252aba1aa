//! Inventory store abstraction
//!
//! The crawler and probers only talk to the store through this trait so they
//! can be driven against an in-memory database in tests. Every method is
//! atomic with respect to other callers, including other processes sharing
//! the same database file.

use anyhow::Result;

use super::connection::Database;
use super::models::*;
use super::queries;

pub trait InventoryStore: Send + Sync {
    /// Get or create the device owning `address`, then apply `patch`
    fn upsert_device_by_address(&self, address: &str, patch: &DevicePatch) -> Result<DeviceRecord>;

    /// Get or create the device named `hostname`, optionally moving it to `address`
    fn upsert_device_by_hostname(
        &self,
        hostname: &str,
        address: Option<&str>,
        patch: &DevicePatch,
    ) -> Result<DeviceRecord>;

    /// Get the device carrying `hostname`, creating an address-less stub if none
    fn upsert_stub_device(&self, hostname: &str) -> Result<DeviceRecord>;

    fn upsert_interface(
        &self,
        device_id: i64,
        name: &str,
        patch: &InterfacePatch,
    ) -> Result<InterfaceRecord>;

    /// Record an undirected link; the flag is `true` when the row is new
    fn upsert_connection(&self, a: i64, b: i64) -> Result<(ConnectionRecord, bool)>;

    fn upsert_host(&self, mac: &str, patch: &HostPatch) -> Result<HostRecord>;

    fn device_by_address(&self, address: &str) -> Result<Option<DeviceRecord>>;

    fn device_by_hostname(&self, hostname: &str) -> Result<Option<DeviceRecord>>;

    fn interfaces_for_device(&self, device_id: i64) -> Result<Vec<InterfaceRecord>>;

    fn host_ips_for_device(&self, device_id: i64) -> Result<Vec<String>>;

    fn known_management_addresses(&self) -> Result<Vec<String>>;

    fn inventory_counts(&self) -> Result<InventoryCounts>;
}

impl InventoryStore for Database {
    fn upsert_device_by_address(&self, address: &str, patch: &DevicePatch) -> Result<DeviceRecord> {
        let conn = self.lock()?;
        queries::upsert_device_by_address(&conn, address, patch)
    }

    fn upsert_device_by_hostname(
        &self,
        hostname: &str,
        address: Option<&str>,
        patch: &DevicePatch,
    ) -> Result<DeviceRecord> {
        let conn = self.lock()?;
        queries::upsert_device_by_hostname(&conn, hostname, address, patch)
    }

    fn upsert_stub_device(&self, hostname: &str) -> Result<DeviceRecord> {
        let conn = self.lock()?;
        queries::upsert_stub_device(&conn, hostname)
    }

    fn upsert_interface(
        &self,
        device_id: i64,
        name: &str,
        patch: &InterfacePatch,
    ) -> Result<InterfaceRecord> {
        let conn = self.lock()?;
        queries::upsert_interface(&conn, device_id, name, patch)
    }

    fn upsert_connection(&self, a: i64, b: i64) -> Result<(ConnectionRecord, bool)> {
        let conn = self.lock()?;
        queries::upsert_connection(&conn, a, b)
    }

    fn upsert_host(&self, mac: &str, patch: &HostPatch) -> Result<HostRecord> {
        let conn = self.lock()?;
        queries::upsert_host(&conn, mac, patch)
    }

    fn device_by_address(&self, address: &str) -> Result<Option<DeviceRecord>> {
        let conn = self.lock()?;
        queries::get_device_by_address(&conn, address)
    }

    fn device_by_hostname(&self, hostname: &str) -> Result<Option<DeviceRecord>> {
        let conn = self.lock()?;
        queries::get_device_by_hostname(&conn, hostname)
    }

    fn interfaces_for_device(&self, device_id: i64) -> Result<Vec<InterfaceRecord>> {
        let conn = self.lock()?;
        queries::get_interfaces_for_device(&conn, device_id)
    }

    fn host_ips_for_device(&self, device_id: i64) -> Result<Vec<String>> {
        let conn = self.lock()?;
        queries::get_host_ips_for_device(&conn, device_id)
    }

    fn known_management_addresses(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        queries::get_known_management_addresses(&conn)
    }

    fn inventory_counts(&self) -> Result<InventoryCounts> {
        let conn = self.lock()?;
        queries::get_inventory_counts(&conn)
    }
}
