//! Scanner module - SNMP agent and SSH prober

pub mod snmp;
pub mod ssh;

pub use snmp::{
    AgentChain, Snmp2Agent, SnmpAgent, SnmpValue, SnmpVersion, WalkRow, format_mac, oids,
    oid_to_string,
};
pub use ssh::{
    BriefInterface, OpenSshTransport, SshTransport, parse_interface_brief,
    parse_version_hostname, ssh_probe,
};
