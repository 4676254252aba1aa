//! Network module - local interfaces, kernel tables, DNS and the crawl address filter

mod dns;
mod interface;
mod subnet;
mod tables;

pub use dns::{forward_lookup, resolve_hostname};
pub use interface::{
    LocalInterface, best_interface, interface_score, list_local_interfaces, normalize_mac,
};
pub use subnet::{is_crawl_eligible, is_private_ipv4};
pub use tables::{
    DefaultRoute, NeighborEntry, parse_ip_neigh, parse_ip_route, parse_proc_arp, parse_proc_route,
};
