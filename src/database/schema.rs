//! Database schema definitions
//!
//! Creates and manages the SQLite tables. Every natural key the crawler
//! upserts on is backed by a unique constraint so concurrent crawls cannot
//! create duplicate rows.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Devices: managed assets; stubs have no management_ip
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hostname TEXT NOT NULL DEFAULT '',
            management_ip TEXT UNIQUE,
            vendor TEXT NOT NULL DEFAULT '',
            model TEXT NOT NULL DEFAULT '',
            os_version TEXT NOT NULL DEFAULT '',
            snmp_community TEXT NOT NULL DEFAULT '',
            ssh_username TEXT NOT NULL DEFAULT '',
            ssh_password TEXT NOT NULL DEFAULT '',
            discovered_snmp_community TEXT NOT NULL DEFAULT '',
            discovered_ssh_username TEXT NOT NULL DEFAULT '',
            discovered_ssh_password TEXT NOT NULL DEFAULT '',
            roadblocks TEXT NOT NULL DEFAULT '',
            is_online INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT,
            last_scanned TEXT
        );

        -- Interfaces: owned by a device
        CREATE TABLE IF NOT EXISTS interfaces (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            mac_address TEXT NOT NULL DEFAULT '',
            ip_address TEXT,
            status TEXT NOT NULL DEFAULT '',
            last_scanned TEXT,
            UNIQUE(device_id, name),
            FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE
        );

        -- Connections: one row per unordered interface pair
        CREATE TABLE IF NOT EXISTS connections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            interface_low INTEGER NOT NULL,
            interface_high INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            CHECK (interface_low < interface_high),
            UNIQUE(interface_low, interface_high),
            FOREIGN KEY (interface_low) REFERENCES interfaces(id) ON DELETE CASCADE,
            FOREIGN KEY (interface_high) REFERENCES interfaces(id) ON DELETE CASCADE
        );

        -- Hosts: end stations seen in ARP/forwarding tables, one row per MAC
        CREATE TABLE IF NOT EXISTS hosts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mac_address TEXT NOT NULL UNIQUE,
            ip_address TEXT,
            interface_id INTEGER,
            last_seen TEXT,
            FOREIGN KEY (interface_id) REFERENCES interfaces(id) ON DELETE SET NULL
        );

        -- At most one stub per hostname
        CREATE UNIQUE INDEX IF NOT EXISTS idx_devices_stub_hostname
            ON devices(hostname) WHERE management_ip IS NULL;

        CREATE INDEX IF NOT EXISTS idx_devices_hostname ON devices(hostname);
        CREATE INDEX IF NOT EXISTS idx_interfaces_device ON interfaces(device_id);
        CREATE INDEX IF NOT EXISTS idx_connections_high ON connections(interface_high);
        CREATE INDEX IF NOT EXISTS idx_hosts_interface ON hosts(interface_id);
        "#,
    )
    .context("Failed to create database tables")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('devices', 'interfaces', 'connections', 'hosts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn reversed_connection_pair_violates_check() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO devices (hostname, management_ip) VALUES ('sw1', '10.0.0.1');
            INSERT INTO interfaces (device_id, name) VALUES (1, 'a'), (1, 'b');
            "#,
        )
        .unwrap();

        let reversed = conn.execute(
            "INSERT INTO connections (interface_low, interface_high) VALUES (2, 1)",
            [],
        );
        assert!(reversed.is_err());
    }

    #[test]
    fn two_stubs_with_same_hostname_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute("INSERT INTO devices (hostname) VALUES ('sw2')", [])
            .unwrap();
        let dup = conn.execute("INSERT INTO devices (hostname) VALUES ('sw2')", []);
        assert!(dup.is_err());

        // A real device may share the hostname of a stub.
        conn.execute(
            "INSERT INTO devices (hostname, management_ip) VALUES ('sw2', '10.0.0.2')",
            [],
        )
        .unwrap();
    }
}
