//! Database module for the network inventory
//!
//! Provides SQLite storage for:
//! - Devices (including name-only stubs)
//! - Interfaces and the links between them
//! - End hosts seen in ARP and forwarding tables

pub mod connection;
pub mod models;
pub mod queries;
pub mod repository;
pub mod schema;

pub use connection::Database;
pub use models::*;
pub use queries::*;
pub use repository::InventoryStore;
