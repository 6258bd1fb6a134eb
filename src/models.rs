//! Data models for the LAN discovery engine.

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use pnet::datalink::NetworkInterface;
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Network interface information used to wire the scanners.
///
/// Immutable once built; switching interfaces rebuilds the engine with a
/// fresh value instead of mutating this one.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    /// Attached subnet (network address + prefix).
    pub network: Ipv4Network,
    /// Subnet-directed broadcast address, derived from ip and mask.
    pub broadcast: Ipv4Addr,
    /// Handle for raw datalink access (ARP sweep).
    pub pnet_interface: NetworkInterface,
}

/// One row of the interface listing shown to consumers.
///
/// Interfaces that are up but unsuitable for LAN discovery (VPN tunnels,
/// point-to-point links) are still listed and flagged so a UI can surface
/// them distinctly.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceEntry {
    pub name: String,
    pub ipv4: String,
    pub subnet: String,
    pub mac: String,
    pub flags: String,
    pub is_vpn: bool,
}

/// A discovered network device, keyed by IPv4 address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub ip: Ipv4Addr,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Scanner tags that have observed this device (arp, mdns, ssdp,
    /// icmp, local). Grows across re-scans, never shrinks.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub sources: BTreeSet<String>,
    /// Free-form discovery metadata such as `mdns.service` or
    /// `ssdp.server`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reverse_dns: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Sanitized service banners keyed by port.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub banners: BTreeMap<u16, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub netbios_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe: Option<DateTime<Utc>>,
    /// Open ports per protocol name. A completed port scan cycle fully
    /// replaces the list for its protocol.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub open_ports: BTreeMap<String, Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_port_scan: Option<DateTime<Utc>>,
}

impl Device {
    /// Canonical minimal constructor to avoid field drift across call-sites.
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            mac: String::new(),
            manufacturer: String::new(),
            display_name: String::new(),
            sources: BTreeSet::new(),
            extra_data: BTreeMap::new(),
            reverse_dns: String::new(),
            latency_ms: None,
            banners: BTreeMap::new(),
            http_title: String::new(),
            http_server: String::new(),
            netbios_name: String::new(),
            device_type: String::new(),
            os: String::new(),
            last_probe: None,
            open_ports: BTreeMap::new(),
            last_port_scan: None,
        }
    }

    /// Merges another observation of the same device into this record.
    ///
    /// Rules: a non-empty incoming scalar overwrites, an empty one never
    /// does; `display_name` is only filled while empty; sets and maps are
    /// unioned; timestamps are replaced when present; per-protocol port
    /// lists present on the incoming record replace the stored list
    /// wholesale (they come from a completed port scan cycle).
    ///
    /// Returns true when any field changed, so callers can decide whether
    /// to notify their sinks.
    pub fn merge_from(&mut self, other: &Device) -> bool {
        debug_assert_eq!(self.ip, other.ip);
        let mut changed = false;

        changed |= merge_scalar(&mut self.mac, &other.mac);
        changed |= merge_scalar(&mut self.manufacturer, &other.manufacturer);
        changed |= merge_scalar(&mut self.reverse_dns, &other.reverse_dns);
        changed |= merge_scalar(&mut self.http_title, &other.http_title);
        changed |= merge_scalar(&mut self.http_server, &other.http_server);
        changed |= merge_scalar(&mut self.netbios_name, &other.netbios_name);
        changed |= merge_scalar(&mut self.device_type, &other.device_type);
        changed |= merge_scalar(&mut self.os, &other.os);

        if self.display_name.is_empty() && !other.display_name.is_empty() {
            self.display_name = other.display_name.clone();
            changed = true;
        }

        for source in &other.sources {
            changed |= self.sources.insert(source.clone());
        }
        for (key, value) in &other.extra_data {
            if value.is_empty() {
                continue;
            }
            match self.extra_data.get(key) {
                Some(existing) if existing == value => {}
                _ => {
                    self.extra_data.insert(key.clone(), value.clone());
                    changed = true;
                }
            }
        }
        for (port, banner) in &other.banners {
            if banner.is_empty() {
                continue;
            }
            match self.banners.get(port) {
                Some(existing) if existing == banner => {}
                _ => {
                    self.banners.insert(*port, banner.clone());
                    changed = true;
                }
            }
        }

        if other.latency_ms.is_some() && self.latency_ms != other.latency_ms {
            self.latency_ms = other.latency_ms;
            changed = true;
        }
        if other.last_probe.is_some() && self.last_probe != other.last_probe {
            self.last_probe = other.last_probe;
            changed = true;
        }
        if other.last_port_scan.is_some() && self.last_port_scan != other.last_port_scan {
            self.last_port_scan = other.last_port_scan;
            changed = true;
        }

        // Key presence marks a completed scan cycle for that protocol, so
        // the incoming list wins even when empty.
        for (proto, ports) in &other.open_ports {
            if self.open_ports.get(proto) != Some(ports) {
                self.open_ports.insert(proto.clone(), ports.clone());
                changed = true;
            }
        }

        changed
    }
}

fn merge_scalar(current: &mut String, incoming: &str) -> bool {
    if !incoming.is_empty() && current != incoming {
        *current = incoming.to_string();
        return true;
    }
    false
}

/// One raw observation emitted by a scanner.
#[derive(Debug, Clone)]
pub struct ScanEvent {
    pub device: Device,
    pub source_tag: String,
}

/// Aggregated results of a full probe run against one device.
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    pub latency: Option<Duration>,
    pub reverse_dns: String,
    pub banners: BTreeMap<u16, String>,
    pub http_title: String,
    pub http_server: String,
    pub netbios_name: String,
    pub device_type: String,
    pub os: String,
}

/// Events pushed to watcher consumers (one-way, unbounded).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    ScanStarted,
    ScanStopped { devices: usize },
    DeviceUpserted { device: Box<Device> },
    ProbeStarted { ip: Ipv4Addr },
    ProbeStopped { ip: Ipv4Addr },
    PortScanStarted { ip: Ipv4Addr },
    PortScanStopped { ip: Ipv4Addr },
    Warn { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_fills_empty_scalars_only_forward() {
        let mut a = Device::new(Ipv4Addr::new(192, 168, 1, 10));
        let mut b = Device::new(a.ip);
        b.mac = "aa:bb:cc:dd:ee:ff".to_string();
        assert!(a.merge_from(&b));
        assert_eq!(a.mac, "aa:bb:cc:dd:ee:ff");

        // An empty incoming value never clears an existing one.
        let empty = Device::new(a.ip);
        assert!(!a.merge_from(&empty));
        assert_eq!(a.mac, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn merge_display_name_fills_once() {
        let mut a = Device::new(Ipv4Addr::new(10, 0, 0, 1));
        let mut b = Device::new(a.ip);
        b.display_name = "printer".to_string();
        a.merge_from(&b);
        assert_eq!(a.display_name, "printer");

        b.display_name = "other".to_string();
        a.merge_from(&b);
        assert_eq!(a.display_name, "printer");
    }

    #[test]
    fn merge_unions_sources_and_extra_data() {
        let mut a = Device::new(Ipv4Addr::new(10, 0, 0, 2));
        a.sources.insert("arp".to_string());
        let mut b = Device::new(a.ip);
        b.sources.insert("mdns".to_string());
        b.extra_data
            .insert("mdns.service".to_string(), "_ipp._tcp.local.".to_string());
        assert!(a.merge_from(&b));
        assert!(a.sources.contains("arp") && a.sources.contains("mdns"));
        assert_eq!(
            a.extra_data.get("mdns.service").map(String::as_str),
            Some("_ipp._tcp.local.")
        );
    }

    #[test]
    fn merge_replaces_port_list_per_protocol() {
        let mut a = Device::new(Ipv4Addr::new(10, 0, 0, 3));
        a.open_ports.insert("tcp".to_string(), vec![22, 80, 443]);
        let mut b = Device::new(a.ip);
        b.open_ports.insert("tcp".to_string(), vec![80]);
        assert!(a.merge_from(&b));
        assert_eq!(a.open_ports.get("tcp"), Some(&vec![80]));

        // A cycle that found nothing still replaces the list.
        let mut c = Device::new(a.ip);
        c.open_ports.insert("tcp".to_string(), Vec::new());
        assert!(a.merge_from(&c));
        assert_eq!(a.open_ports.get("tcp"), Some(&Vec::new()));
    }

    #[test]
    fn merge_reports_unchanged() {
        let mut a = Device::new(Ipv4Addr::new(10, 0, 0, 4));
        a.mac = "aa:bb:cc:dd:ee:ff".to_string();
        a.sources.insert("arp".to_string());
        let same = a.clone();
        assert!(!a.merge_from(&same));
    }
}
