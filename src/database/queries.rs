//! Database query functions
//!
//! Atomic get-or-create-then-update operations for devices, interfaces,
//! connections and hosts. Each multi-statement upsert runs inside one
//! `BEGIN IMMEDIATE` transaction (or a savepoint when nested) so two crawls
//! sharing the database file serialize on the write lock instead of racing.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;

const DEVICE_COLUMNS: &str = r#"
    id, hostname, management_ip, vendor, model, os_version,
    snmp_community, ssh_username, ssh_password,
    discovered_snmp_community, discovered_ssh_username, discovered_ssh_password,
    roadblocks, is_online, last_seen, last_scanned
"#;

const INTERFACE_COLUMNS: &str =
    "id, device_id, name, mac_address, ip_address, status, last_scanned";

const CONNECTION_COLUMNS: &str = "id, interface_low, interface_high, description";

const HOST_COLUMNS: &str = "id, mac_address, ip_address, interface_id, last_seen";

/// Current time in SQLite `datetime('now')` layout
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Run `f` atomically. Opens an immediate transaction, or a savepoint when the
/// caller already holds one.
fn in_transaction<T>(
    conn: &Connection,
    label: &str,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let (begin, commit, rollback) = if conn.is_autocommit() {
        (
            "BEGIN IMMEDIATE".to_string(),
            "COMMIT".to_string(),
            "ROLLBACK".to_string(),
        )
    } else {
        (
            format!("SAVEPOINT {label}"),
            format!("RELEASE SAVEPOINT {label}"),
            format!("ROLLBACK TO SAVEPOINT {label}; RELEASE SAVEPOINT {label}"),
        )
    };

    conn.execute_batch(&begin)
        .with_context(|| format!("Failed to start {label} transaction"))?;

    let outcome = f(conn).and_then(|value| {
        conn.execute_batch(&commit)
            .with_context(|| format!("Failed to commit {label} transaction"))?;
        Ok(value)
    });

    if outcome.is_err() {
        let _ = conn.execute_batch(&rollback);
    }
    outcome
}

fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b { (a, b) } else { (b, a) }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Locate the device owning `address` (creating it when needed) and apply `patch`.
///
/// A stub carrying the patch hostname is upgraded in place when no device owns
/// the address yet, or merged into the owner when one does.
pub fn upsert_device_by_address(
    conn: &Connection,
    address: &str,
    patch: &DevicePatch,
) -> Result<DeviceRecord> {
    in_transaction(conn, "upsert_device_by_address", |conn| {
        let hostname = patch.hostname.as_deref().filter(|h| !h.is_empty());

        let id = match device_id_by_address(conn, address)? {
            Some(owner) => owner,
            None => match hostname.map(|h| stub_id_by_hostname(conn, h)).transpose()? {
                Some(Some(stub)) => {
                    conn.execute(
                        "UPDATE devices SET management_ip = ?2 WHERE id = ?1",
                        params![stub, address],
                    )
                    .context("Failed to upgrade stub device")?;
                    tracing::debug!("Upgraded stub device {} to address {}", stub, address);
                    stub
                }
                _ => insert_device(conn, hostname.unwrap_or(address), Some(address))?,
            },
        };

        if let Some(hostname) = hostname {
            absorb_stub(conn, id, hostname)?;
        }
        apply_device_patch(conn, id, patch)?;
        require_device(conn, id)
    })
}

/// Locate a device by hostname, optionally pinning its management address.
///
/// Used for the engine's own host, whose hostname is stable while its
/// address may move between runs.
pub fn upsert_device_by_hostname(
    conn: &Connection,
    hostname: &str,
    address: Option<&str>,
    patch: &DevicePatch,
) -> Result<DeviceRecord> {
    if hostname.trim().is_empty() {
        bail!("Cannot key a device on an empty hostname");
    }

    in_transaction(conn, "upsert_device_by_hostname", |conn| {
        let by_hostname = first_device_id_by_hostname(conn, hostname)?;
        let by_address = match address {
            Some(address) => device_id_by_address(conn, address)?,
            None => None,
        };

        let id = match (by_hostname, by_address) {
            (Some(named), Some(owner)) if named != owner => {
                merge_device_into(conn, named, owner)?;
                owner
            }
            (Some(named), Some(_)) => named,
            (Some(named), None) => {
                if let Some(address) = address {
                    conn.execute(
                        "UPDATE devices SET management_ip = ?2 WHERE id = ?1",
                        params![named, address],
                    )
                    .context("Failed to move device address")?;
                }
                named
            }
            (None, Some(owner)) => owner,
            (None, None) => insert_device(conn, hostname, address)?,
        };

        absorb_stub(conn, id, hostname)?;

        let mut patch = patch.clone();
        patch.hostname = Some(hostname.to_string());
        apply_device_patch(conn, id, &patch)?;
        require_device(conn, id)
    })
}

/// Get or create the placeholder device for a neighbor known only by name.
///
/// A device that already has an address and carries this hostname is
/// returned instead, so links attach to the real record once it exists.
pub fn upsert_stub_device(conn: &Connection, hostname: &str) -> Result<DeviceRecord> {
    if hostname.trim().is_empty() {
        bail!("Cannot create a stub device without a hostname");
    }

    in_transaction(conn, "upsert_stub_device", |conn| {
        let id = match first_device_id_by_hostname(conn, hostname)? {
            Some(id) => id,
            None => insert_device(conn, hostname, None)?,
        };
        require_device(conn, id)
    })
}

fn insert_device(conn: &Connection, hostname: &str, address: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO devices (hostname, management_ip) VALUES (?1, ?2)",
        params![hostname, address],
    )
    .context("Failed to insert device")?;
    Ok(conn.last_insert_rowid())
}

fn device_id_by_address(conn: &Connection, address: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM devices WHERE management_ip = ?1",
        params![address],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up device by address")
}

fn stub_id_by_hostname(conn: &Connection, hostname: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM devices WHERE hostname = ?1 AND management_ip IS NULL",
        params![hostname],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up stub device")
}

/// Devices with an address win over stubs; ties go to the oldest row.
fn first_device_id_by_hostname(conn: &Connection, hostname: &str) -> Result<Option<i64>> {
    conn.query_row(
        r#"
        SELECT id FROM devices
        WHERE hostname = ?1
        ORDER BY management_ip IS NULL, id
        LIMIT 1
        "#,
        params![hostname],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up device by hostname")
}

/// Merge the stub named `hostname` into `id`, if one exists and is not `id`.
fn absorb_stub(conn: &Connection, id: i64, hostname: &str) -> Result<()> {
    if let Some(stub) = stub_id_by_hostname(conn, hostname)?
        && stub != id
    {
        merge_device_into(conn, stub, id)?;
    }
    Ok(())
}

/// Move every interface, link and host of device `from` onto device `into`,
/// then delete `from`.
pub fn merge_device_into(conn: &Connection, from: i64, into: i64) -> Result<()> {
    if from == into {
        return Ok(());
    }

    in_transaction(conn, "merge_device_into", |conn| {
        for iface in get_interfaces_for_device(conn, from)? {
            let target: Option<i64> = conn
                .query_row(
                    "SELECT id FROM interfaces WHERE device_id = ?1 AND name = ?2",
                    params![into, &iface.name],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to look up merge target interface")?;

            match target {
                Some(target) => {
                    repoint_connections(conn, iface.id, target)?;
                    conn.execute(
                        "UPDATE hosts SET interface_id = ?2 WHERE interface_id = ?1",
                        params![iface.id, target],
                    )
                    .context("Failed to move hosts during merge")?;
                    conn.execute(
                        r#"
                        UPDATE interfaces SET
                            mac_address = CASE WHEN mac_address = '' THEN ?2 ELSE mac_address END,
                            ip_address = COALESCE(ip_address, ?3)
                        WHERE id = ?1
                        "#,
                        params![target, &iface.mac_address, &iface.ip_address],
                    )
                    .context("Failed to carry interface fields during merge")?;
                    conn.execute("DELETE FROM interfaces WHERE id = ?1", params![iface.id])
                        .context("Failed to delete merged interface")?;
                }
                None => {
                    conn.execute(
                        "UPDATE interfaces SET device_id = ?2 WHERE id = ?1",
                        params![iface.id, into],
                    )
                    .context("Failed to move interface during merge")?;
                }
            }
        }

        conn.execute("DELETE FROM devices WHERE id = ?1", params![from])
            .context("Failed to delete merged device")?;
        tracing::debug!("Merged device {} into {}", from, into);
        Ok(())
    })
}

/// Re-attach every link ending on interface `old` to interface `new`.
fn repoint_connections(conn: &Connection, old: i64, new: i64) -> Result<()> {
    let links: Vec<ConnectionRecord> = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE interface_low = ?1 OR interface_high = ?1"
        ))?;
        stmt.query_map(params![old], map_connection_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
    };

    for link in links {
        conn.execute("DELETE FROM connections WHERE id = ?1", params![link.id])
            .context("Failed to drop repointed connection")?;

        let Some(other) = link.other_end(old) else {
            continue;
        };
        if other == new {
            continue;
        }
        let (low, high) = ordered_pair(other, new);
        conn.execute(
            r#"
            INSERT INTO connections (interface_low, interface_high, description)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(interface_low, interface_high) DO NOTHING
            "#,
            params![low, high, &link.description],
        )
        .context("Failed to re-create repointed connection")?;
    }
    Ok(())
}

fn apply_device_patch(conn: &Connection, id: i64, patch: &DevicePatch) -> Result<()> {
    conn.execute(
        r#"
        UPDATE devices SET
            hostname = COALESCE(?2, hostname),
            vendor = COALESCE(?3, vendor),
            model = COALESCE(?4, model),
            os_version = COALESCE(?5, os_version),
            discovered_snmp_community = COALESCE(?6, discovered_snmp_community),
            discovered_ssh_username = COALESCE(?7, discovered_ssh_username),
            discovered_ssh_password = COALESCE(?8, discovered_ssh_password),
            roadblocks = COALESCE(?9, roadblocks),
            is_online = COALESCE(?10, is_online),
            last_seen = CASE WHEN ?11 THEN ?13 ELSE last_seen END,
            last_scanned = CASE WHEN ?12 THEN ?13 ELSE last_scanned END
        WHERE id = ?1
        "#,
        params![
            id,
            patch.hostname.as_deref().filter(|h| !h.trim().is_empty()),
            &patch.vendor,
            &patch.model,
            &patch.os_version,
            &patch.discovered_snmp_community,
            &patch.discovered_ssh_username,
            &patch.discovered_ssh_password,
            &patch.roadblocks,
            patch.is_online,
            patch.touch_last_seen,
            patch.touch_last_scanned,
            now_timestamp(),
        ],
    )
    .context("Failed to update device")?;
    Ok(())
}

/// Set the operator-configured SNMP community for a device
pub fn set_device_snmp_community(conn: &Connection, id: i64, community: &str) -> Result<()> {
    conn.execute(
        "UPDATE devices SET snmp_community = ?2 WHERE id = ?1",
        params![id, community],
    )
    .context("Failed to set device SNMP community")?;
    Ok(())
}

/// Set the operator-configured SSH credentials for a device
pub fn set_device_ssh_credentials(
    conn: &Connection,
    id: i64,
    username: &str,
    password: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE devices SET ssh_username = ?2, ssh_password = ?3 WHERE id = ?1",
        params![id, username, password],
    )
    .context("Failed to set device SSH credentials")?;
    Ok(())
}

fn require_device(conn: &Connection, id: i64) -> Result<DeviceRecord> {
    get_device(conn, id)?.ok_or_else(|| anyhow!("Device {} vanished during upsert", id))
}

/// Get a device by id
pub fn get_device(conn: &Connection, id: i64) -> Result<Option<DeviceRecord>> {
    conn.query_row(
        &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
        params![id],
        map_device_row,
    )
    .optional()
    .context("Failed to load device")
}

/// Get the device owning a management address
pub fn get_device_by_address(conn: &Connection, address: &str) -> Result<Option<DeviceRecord>> {
    conn.query_row(
        &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE management_ip = ?1"),
        params![address],
        map_device_row,
    )
    .optional()
    .context("Failed to load device by address")
}

/// Get the preferred device carrying a hostname (addressed devices first)
pub fn get_device_by_hostname(conn: &Connection, hostname: &str) -> Result<Option<DeviceRecord>> {
    match first_device_id_by_hostname(conn, hostname)? {
        Some(id) => get_device(conn, id),
        None => Ok(None),
    }
}

/// Get all devices
pub fn get_all_devices(conn: &Connection) -> Result<Vec<DeviceRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id"))?;
    let devices = stmt
        .query_map([], map_device_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(devices)
}

/// Every management address currently known, oldest device first
pub fn get_known_management_addresses(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT management_ip FROM devices WHERE management_ip IS NOT NULL ORDER BY id",
    )?;
    let addresses = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(addresses)
}

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Insert or update the interface `(device_id, name)`
pub fn upsert_interface(
    conn: &Connection,
    device_id: i64,
    name: &str,
    patch: &InterfacePatch,
) -> Result<InterfaceRecord> {
    conn.query_row(
        &format!(
            r#"
            INSERT INTO interfaces (device_id, name, mac_address, ip_address, status, last_scanned)
            VALUES (?1, ?2, COALESCE(?3, ''), ?4, COALESCE(?5, ''), ?6)
            ON CONFLICT(device_id, name) DO UPDATE SET
                mac_address = COALESCE(?3, interfaces.mac_address),
                ip_address = COALESCE(?4, interfaces.ip_address),
                status = COALESCE(?5, interfaces.status),
                last_scanned = ?6
            RETURNING {INTERFACE_COLUMNS}
            "#
        ),
        params![
            device_id,
            name,
            &patch.mac_address,
            &patch.ip_address,
            &patch.status,
            now_timestamp(),
        ],
        map_interface_row,
    )
    .with_context(|| format!("Failed to upsert interface {} on device {}", name, device_id))
}

/// Get every interface of a device
pub fn get_interfaces_for_device(conn: &Connection, device_id: i64) -> Result<Vec<InterfaceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INTERFACE_COLUMNS} FROM interfaces WHERE device_id = ?1 ORDER BY id"
    ))?;
    let interfaces = stmt
        .query_map(params![device_id], map_interface_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(interfaces)
}

/// Get an interface by id
pub fn get_interface(conn: &Connection, id: i64) -> Result<Option<InterfaceRecord>> {
    conn.query_row(
        &format!("SELECT {INTERFACE_COLUMNS} FROM interfaces WHERE id = ?1"),
        params![id],
        map_interface_row,
    )
    .optional()
    .context("Failed to load interface")
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// Record a link between two interfaces. Returns the stored row and whether
/// it was newly created; `(b, a)` is the same link as `(a, b)`.
pub fn upsert_connection(conn: &Connection, a: i64, b: i64) -> Result<(ConnectionRecord, bool)> {
    if a == b {
        bail!("Refusing to link interface {} to itself", a);
    }
    let (low, high) = ordered_pair(a, b);

    in_transaction(conn, "upsert_connection", |conn| {
        let inserted = conn
            .execute(
                r#"
                INSERT INTO connections (interface_low, interface_high)
                VALUES (?1, ?2)
                ON CONFLICT(interface_low, interface_high) DO NOTHING
                "#,
                params![low, high],
            )
            .context("Failed to insert connection")?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {CONNECTION_COLUMNS} FROM connections WHERE interface_low = ?1 AND interface_high = ?2"
                ),
                params![low, high],
                map_connection_row,
            )
            .context("Failed to load connection")?;

        Ok((record, inserted == 1))
    })
}

/// Get all connections
pub fn get_all_connections(conn: &Connection) -> Result<Vec<ConnectionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONNECTION_COLUMNS} FROM connections ORDER BY id"
    ))?;
    let links = stmt
        .query_map([], map_connection_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(links)
}

/// Get every connection touching an interface of the given device
pub fn get_connections_for_device(conn: &Connection, device_id: i64) -> Result<Vec<ConnectionRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.id, c.interface_low, c.interface_high, c.description
        FROM connections c
        WHERE c.interface_low IN (SELECT id FROM interfaces WHERE device_id = ?1)
           OR c.interface_high IN (SELECT id FROM interfaces WHERE device_id = ?1)
        ORDER BY c.id
        "#,
    )?;
    let links = stmt
        .query_map(params![device_id], map_connection_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(links)
}

// ---------------------------------------------------------------------------
// Hosts
// ---------------------------------------------------------------------------

/// Insert or update the host identified by `mac`. The last observation wins;
/// fields absent from `patch` keep their previous value.
pub fn upsert_host(conn: &Connection, mac: &str, patch: &HostPatch) -> Result<HostRecord> {
    let mac = mac.trim().to_ascii_lowercase();
    if mac.is_empty() {
        bail!("Cannot upsert a host without a MAC address");
    }

    conn.query_row(
        &format!(
            r#"
            INSERT INTO hosts (mac_address, ip_address, interface_id, last_seen)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(mac_address) DO UPDATE SET
                ip_address = COALESCE(?2, hosts.ip_address),
                interface_id = COALESCE(?3, hosts.interface_id),
                last_seen = ?4
            RETURNING {HOST_COLUMNS}
            "#
        ),
        params![mac, &patch.ip_address, patch.interface_id, now_timestamp()],
        map_host_row,
    )
    .with_context(|| format!("Failed to upsert host {}", mac))
}

/// Get a host by MAC address
pub fn get_host_by_mac(conn: &Connection, mac: &str) -> Result<Option<HostRecord>> {
    conn.query_row(
        &format!("SELECT {HOST_COLUMNS} FROM hosts WHERE mac_address = ?1"),
        params![mac.trim().to_ascii_lowercase()],
        map_host_row,
    )
    .optional()
    .context("Failed to load host")
}

/// Get all hosts
pub fn get_all_hosts(conn: &Connection) -> Result<Vec<HostRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {HOST_COLUMNS} FROM hosts ORDER BY id"))?;
    let hosts = stmt
        .query_map([], map_host_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(hosts)
}

/// Distinct IPs of hosts last seen behind any interface of the device
pub fn get_host_ips_for_device(conn: &Connection, device_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT h.ip_address
        FROM hosts h
        JOIN interfaces i ON h.interface_id = i.id
        WHERE i.device_id = ?1 AND h.ip_address IS NOT NULL AND h.ip_address != ''
        ORDER BY h.id
        "#,
    )?;
    let ips = stmt
        .query_map(params![device_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ips)
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Row counts across the inventory
pub fn get_inventory_counts(conn: &Connection) -> Result<InventoryCounts> {
    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to run count query: {}", sql))
    };

    Ok(InventoryCounts {
        devices: count("SELECT COUNT(*) FROM devices")?,
        stub_devices: count("SELECT COUNT(*) FROM devices WHERE management_ip IS NULL")?,
        online_devices: count("SELECT COUNT(*) FROM devices WHERE is_online = 1")?,
        interfaces: count("SELECT COUNT(*) FROM interfaces")?,
        connections: count("SELECT COUNT(*) FROM connections")?,
        hosts: count("SELECT COUNT(*) FROM hosts")?,
    })
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn map_device_row(row: &Row<'_>) -> rusqlite::Result<DeviceRecord> {
    Ok(DeviceRecord {
        id: row.get(0)?,
        hostname: row.get(1)?,
        management_ip: row.get(2)?,
        vendor: row.get(3)?,
        model: row.get(4)?,
        os_version: row.get(5)?,
        snmp_community: row.get(6)?,
        ssh_username: row.get(7)?,
        ssh_password: row.get(8)?,
        discovered_snmp_community: row.get(9)?,
        discovered_ssh_username: row.get(10)?,
        discovered_ssh_password: row.get(11)?,
        roadblocks: row.get(12)?,
        is_online: row.get(13)?,
        last_seen: parse_optional_datetime_column(row.get(14)?, 14)?,
        last_scanned: parse_optional_datetime_column(row.get(15)?, 15)?,
    })
}

fn map_interface_row(row: &Row<'_>) -> rusqlite::Result<InterfaceRecord> {
    Ok(InterfaceRecord {
        id: row.get(0)?,
        device_id: row.get(1)?,
        name: row.get(2)?,
        mac_address: row.get(3)?,
        ip_address: row.get(4)?,
        status: row.get(5)?,
        last_scanned: parse_optional_datetime_column(row.get(6)?, 6)?,
    })
}

fn map_connection_row(row: &Row<'_>) -> rusqlite::Result<ConnectionRecord> {
    Ok(ConnectionRecord {
        id: row.get(0)?,
        interface_a: row.get(1)?,
        interface_b: row.get(2)?,
        description: row.get(3)?,
    })
}

fn map_host_row(row: &Row<'_>) -> rusqlite::Result<HostRecord> {
    Ok(HostRecord {
        id: row.get(0)?,
        mac_address: row.get(1)?,
        ip_address: row.get(2)?,
        interface_id: row.get(3)?,
        last_seen: parse_optional_datetime_column(row.get(4)?, 4)?,
    })
}

fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_str(&format!("{} +0000", s), "%Y-%m-%d %H:%M:%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_optional_datetime_column(
    s: Option<String>,
    column: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime_column(s, column)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    fn seen(hostname: &str) -> DevicePatch {
        DevicePatch {
            hostname: Some(hostname.to_string()),
            is_online: Some(true),
            touch_last_seen: true,
            touch_last_scanned: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_device_upsert_by_address_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let first = upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();
        let second = upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.hostname, "sw1");
        assert!(second.is_online);
        assert!(second.last_seen.is_some());
        assert_eq!(get_all_devices(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_patch_none_keeps_existing_values() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let mut patch = seen("sw1");
        patch.vendor = Some("Cisco".to_string());
        upsert_device_by_address(&conn, "10.0.0.1", &patch).unwrap();

        let device = upsert_device_by_address(&conn, "10.0.0.1", &DevicePatch::default()).unwrap();
        assert_eq!(device.vendor, "Cisco");
        assert_eq!(device.hostname, "sw1");
    }

    #[test]
    fn test_unnamed_device_is_named_after_its_address() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let device = upsert_device_by_address(&conn, "10.0.0.3", &seen("")).unwrap();
        assert_eq!(device.hostname, "10.0.0.3");

        let named = upsert_device_by_address(&conn, "10.0.0.3", &seen("sw3")).unwrap();
        let again = upsert_device_by_address(&conn, "10.0.0.3", &seen("")).unwrap();
        assert_eq!(named.hostname, "sw3");
        assert_eq!(again.hostname, "sw3");
        assert_eq!(again.id, device.id);
    }

    #[test]
    fn test_stub_is_upgraded_when_address_is_discovered() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let stub = upsert_stub_device(&conn, "sw2").unwrap();
        assert!(stub.is_stub());

        let real = upsert_device_by_address(&conn, "10.0.0.2", &seen("sw2")).unwrap();
        assert_eq!(real.id, stub.id);
        assert_eq!(real.management_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(get_all_devices(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_stub_is_merged_into_existing_owner() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        // Real device probed first under an unrelated name.
        let real = upsert_device_by_address(&conn, "10.0.0.2", &seen("old-name")).unwrap();
        let real_port = upsert_interface(&conn, real.id, "Eth0/1", &InterfacePatch::default()).unwrap();

        // A neighbor reports it by its new name, creating a stub with the same port.
        let local = upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();
        let local_port = upsert_interface(&conn, local.id, "Gig0/1", &InterfacePatch::default()).unwrap();
        let stub = upsert_stub_device(&conn, "sw2").unwrap();
        let stub_port = upsert_interface(&conn, stub.id, "Eth0/1", &InterfacePatch::default()).unwrap();
        let stub_only = upsert_interface(&conn, stub.id, "Eth0/9", &InterfacePatch::default()).unwrap();
        upsert_connection(&conn, local_port.id, stub_port.id).unwrap();

        // Re-probe: the real device now reports sysName sw2.
        let merged = upsert_device_by_address(&conn, "10.0.0.2", &seen("sw2")).unwrap();
        assert_eq!(merged.id, real.id);
        assert!(get_device(&conn, stub.id).unwrap().is_none());

        let links = get_all_connections(&conn).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].other_end(local_port.id), Some(real_port.id));

        let moved = get_interface(&conn, stub_only.id).unwrap().unwrap();
        assert_eq!(moved.device_id, real.id);
    }

    #[test]
    fn test_stub_lookup_prefers_addressed_device() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let real = upsert_device_by_address(&conn, "10.0.0.2", &seen("sw2")).unwrap();
        let stub = upsert_stub_device(&conn, "sw2").unwrap();
        assert_eq!(stub.id, real.id);
    }

    #[test]
    fn test_interface_upsert_keeps_unreported_fields() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let device = upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();

        let patch = InterfacePatch {
            mac_address: Some("aa:aa:aa:aa:aa:aa".to_string()),
            status: Some("1".to_string()),
            ..Default::default()
        };
        let first = upsert_interface(&conn, device.id, "Gig0/1", &patch).unwrap();
        let second =
            upsert_interface(&conn, device.id, "Gig0/1", &InterfacePatch::default()).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.mac_address, "aa:aa:aa:aa:aa:aa");
        assert_eq!(second.status, "1");
    }

    #[test]
    fn test_connection_is_stored_once_per_unordered_pair() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let device = upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();
        let a = upsert_interface(&conn, device.id, "a", &InterfacePatch::default()).unwrap();
        let b = upsert_interface(&conn, device.id, "b", &InterfacePatch::default()).unwrap();

        let (forward, created) = upsert_connection(&conn, b.id, a.id).unwrap();
        assert!(created);
        let (reverse, created_again) = upsert_connection(&conn, a.id, b.id).unwrap();
        assert!(!created_again);
        assert_eq!(forward.id, reverse.id);
        assert_eq!(get_all_connections(&conn).unwrap().len(), 1);

        assert!(upsert_connection(&conn, a.id, a.id).is_err());
    }

    #[test]
    fn test_host_last_observation_wins_but_keeps_interface() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let device = upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();
        let port = upsert_interface(&conn, device.id, "Gig0/1", &InterfacePatch::default()).unwrap();

        upsert_host(
            &conn,
            "00:11:22:33:44:55",
            &HostPatch {
                interface_id: Some(port.id),
                ..Default::default()
            },
        )
        .unwrap();
        let host = upsert_host(
            &conn,
            "00:11:22:33:44:55",
            &HostPatch {
                ip_address: Some("10.0.0.100".to_string()),
                interface_id: None,
            },
        )
        .unwrap();

        assert_eq!(host.interface_id, Some(port.id));
        assert_eq!(host.ip_address.as_deref(), Some("10.0.0.100"));
        assert_eq!(get_all_hosts(&conn).unwrap().len(), 1);
        assert_eq!(
            get_host_ips_for_device(&conn, device.id).unwrap(),
            vec!["10.0.0.100".to_string()]
        );
    }

    #[test]
    fn test_host_mac_is_case_insensitive() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        upsert_host(&conn, "AA:BB:CC:DD:EE:FF", &HostPatch::default()).unwrap();
        upsert_host(&conn, "aa:bb:cc:dd:ee:ff", &HostPatch::default()).unwrap();
        assert_eq!(get_all_hosts(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_self_device_keeps_identity_when_address_moves() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let first =
            upsert_device_by_hostname(&conn, "nms01", Some("10.0.0.50"), &DevicePatch::default())
                .unwrap();
        let moved =
            upsert_device_by_hostname(&conn, "nms01", Some("10.0.0.51"), &DevicePatch::default())
                .unwrap();

        assert_eq!(first.id, moved.id);
        assert_eq!(moved.management_ip.as_deref(), Some("10.0.0.51"));
        assert_eq!(
            get_known_management_addresses(&conn).unwrap(),
            vec!["10.0.0.51".to_string()]
        );
    }

    #[test]
    fn test_upsert_is_atomic_on_failure() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TRIGGER fail_device_update
            AFTER UPDATE OF vendor ON devices
            BEGIN
                SELECT RAISE(FAIL, 'forced device update failure');
            END;
            "#,
        )
        .unwrap();

        let mut patch = seen("sw1");
        patch.vendor = Some("Cisco".to_string());
        assert!(upsert_device_by_address(&conn, "10.0.0.1", &patch).is_err());
        assert!(get_all_devices(&conn).unwrap().is_empty());
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_inventory_counts() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        upsert_device_by_address(&conn, "10.0.0.1", &seen("sw1")).unwrap();
        upsert_stub_device(&conn, "sw9").unwrap();

        let counts = get_inventory_counts(&conn).unwrap();
        assert_eq!(counts.devices, 2);
        assert_eq!(counts.stub_devices, 1);
        assert_eq!(counts.online_devices, 1);
    }
}
