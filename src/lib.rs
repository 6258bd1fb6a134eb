//! lanscout - LAN device discovery and inspection engine
//!
//! Continuously enumerates IPv4 devices on the attached subnet by fusing
//! several concurrent scanners (ARP sweep, mDNS, SSDP, ICMP) into one
//! deduplicated device stream, and probes selected hosts on demand:
//! - TCP port scanning with a bounded worker pool
//! - Banner grabbing and HTTP fingerprinting
//! - NetBIOS node status queries and reverse DNS
//! - Device type and OS classification
//! - Wake-on-LAN

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod network;
pub mod probe;
pub mod scanner;
pub mod store;
pub mod watch;

pub use cli::CliCommand;
pub use config::{EngineConfig, PortScannerConfig};
pub use errors::ScanError;
pub use models::{
    Device, InterfaceEntry, InterfaceInfo, ProbeResult, ScanEvent, WatchEvent,
};
pub use network::{
    broadcast_addr, lan_suitable, list_all_interfaces, lookup_vendor, select_interface,
};
pub use probe::{
    build_magic_packet, classify_ttl, detect_os, fingerprint, parse_mac, parse_nbstat_response,
    sanitize_banner, send_wol, DeviceType, OsFamily, Prober,
};
pub use scanner::{DiscoveryEngine, PortScanner, ScanContext, Scanner};
pub use store::DeviceStore;
pub use watch::{EventCallback, NetworkWatcher};

// Re-export logging macros for use across the crate.
pub use crate::logging::macros;
