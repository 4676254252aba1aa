//! Discovery engine
//!
//! Device prober, neighbor resolver, host correlator, local endpoint probe
//! and the crawler that drives them.

pub mod crawler;
pub mod hosts;
pub mod local;
pub mod neighbors;
pub mod prober;

#[cfg(test)]
pub(crate) mod testing;

pub use crawler::TopologyCrawler;
pub use hosts::{HostCorrelation, collect_hosts, ipv4_from_index, mac_from_index};
pub use local::{IpCommandSystem, LocalSystem, LocalSystemChain, ProcFsSystem, probe_self};
pub use neighbors::{address_from_value, resolve_neighbors};
pub use prober::{ProbedDevice, interface_index_map, probe, vendor_from_descr};
