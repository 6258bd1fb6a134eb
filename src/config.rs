//! Configuration for the discovery engine and probe pipeline.

use std::time::Duration;

/// Default gap between discovery cycles.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound for a single discovery cycle.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(10);

/// Worker pool width for the on-demand port scanner.
pub const PORT_SCAN_WORKERS: usize = 100;

/// Per-port connect timeout for the port scanner.
pub const PORT_SCAN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-sub-probe timeout for the prober (DNS, banner, HTTP, NBSTAT).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for a full probe run against one device.
pub const PROBE_WINDOW: Duration = Duration::from_secs(30);

/// Maximum concurrent ICMP echo requests during a sweep.
pub const MAX_CONCURRENT_PINGS: usize = 200;

/// Timeout for each ICMP echo request.
pub const PING_TIMEOUT: Duration = Duration::from_millis(800);

/// Pacing gap between ARP request sends. Keeps a /24 sweep well inside
/// the scan window without bursting the NIC.
pub const ARP_SEND_GAP: Duration = Duration::from_millis(2);

/// Read timeout on the ARP datalink channel so the receiver can observe
/// the scan deadline between packets.
pub const ARP_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// MX value advertised in SSDP M-SEARCH datagrams (seconds a responder
/// may delay its reply).
pub const SSDP_MX_SECS: u8 = 2;

/// Grace period after the scan deadline before scanner tasks are aborted.
pub const SCANNER_JOIN_GRACE: Duration = Duration::from_secs(2);

/// Maximum hosts swept in one cycle. Subnets wider than this are scanned
/// in a window centered on the local address.
pub const MAX_SCAN_HOSTS: usize = 1024;

/// Default TCP ports for the on-demand port scanner.
pub const DEFAULT_TCP_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 515, 548, 554, 631, 993, 995, 1723,
    3306, 3389, 5000, 5432, 5900, 5985, 8080, 8443, 9090, 9100, 62078,
];

/// Port scanner settings. The UDP list is parsed and carried but not
/// acted on; only TCP connect scanning is implemented.
#[derive(Debug, Clone)]
pub struct PortScannerConfig {
    pub tcp: Vec<u16>,
    pub udp: Vec<u16>,
    pub timeout: Duration,
}

impl Default for PortScannerConfig {
    fn default() -> Self {
        Self {
            tcp: DEFAULT_TCP_PORTS.to_vec(),
            udp: Vec::new(),
            timeout: PORT_SCAN_TIMEOUT,
        }
    }
}

/// Engine settings consumed at build time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interface name, or empty for autodetection.
    pub network_interface: String,
    pub scan_interval: Duration,
    pub scan_duration: Duration,
    pub arp_enabled: bool,
    pub mdns_enabled: bool,
    pub ssdp_enabled: bool,
    pub icmp_enabled: bool,
    pub port_scanner: PortScannerConfig,
    pub probe_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network_interface: String::new(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            scan_duration: DEFAULT_SCAN_DURATION,
            arp_enabled: true,
            mdns_enabled: true,
            ssdp_enabled: true,
            icmp_enabled: true,
            port_scanner: PortScannerConfig::default(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}
