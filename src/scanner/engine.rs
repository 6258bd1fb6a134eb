//! Discovery engine - concurrent scanner fan-in with merge-by-IP

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{EngineConfig, SCANNER_JOIN_GRACE};
use crate::models::{Device, InterfaceInfo, ScanEvent};
use crate::network::lookup_vendor;
use crate::probe::{fingerprint, DeviceType};
use crate::scanner::{ArpScanner, IcmpScanner, MdnsScanner, ScanContext, Scanner, SsdpScanner};

/// Channel depth between the scanners and the merge loop.
const SINK_DEPTH: usize = 256;

/// Runs the configured scanners concurrently for one bounded window and
/// merges their observations into a single per-IP view.
pub struct DiscoveryEngine {
    iface: InterfaceInfo,
    scanners: Vec<Arc<dyn Scanner>>,
}

impl DiscoveryEngine {
    /// Builds the scanner set from the enable flags in the config.
    pub fn new(iface: InterfaceInfo, config: &EngineConfig) -> Self {
        let mut scanners: Vec<Arc<dyn Scanner>> = Vec::new();
        if config.arp_enabled {
            scanners.push(Arc::new(ArpScanner::new(iface.clone())));
        }
        if config.mdns_enabled {
            scanners.push(Arc::new(MdnsScanner));
        }
        if config.ssdp_enabled {
            scanners.push(Arc::new(SsdpScanner));
        }
        if config.icmp_enabled {
            scanners.push(Arc::new(IcmpScanner::new(iface.clone())));
        }
        Self { iface, scanners }
    }

    #[cfg(test)]
    fn with_scanners(iface: InterfaceInfo, scanners: Vec<Arc<dyn Scanner>>) -> Self {
        Self { iface, scanners }
    }

    pub fn interface(&self) -> &InterfaceInfo {
        &self.iface
    }

    pub fn scanner_names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|scanner| scanner.name()).collect()
    }

    /// Runs one discovery cycle.
    ///
    /// Observations are merged by IP as they arrive; `on_device` fires
    /// whenever a device is first seen or gains new information. After
    /// the window closes the scanners are joined best-effort and the
    /// local host is injected as a synthetic observation. Returns the
    /// merged device map for the cycle.
    pub async fn stream<F>(&self, ctx: &ScanContext, mut on_device: F) -> HashMap<Ipv4Addr, Device>
    where
        F: FnMut(&Device),
    {
        let (tx, mut rx) = mpsc::channel::<ScanEvent>(SINK_DEPTH);

        let mut tasks = Vec::with_capacity(self.scanners.len());
        for scanner in &self.scanners {
            let scanner = Arc::clone(scanner);
            let ctx = ctx.clone();
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                tracing::debug!("scanner {} started", scanner.name());
                scanner.scan(ctx, tx).await;
                tracing::debug!("scanner {} finished", scanner.name());
            }));
        }
        // The merge loop ends when every scanner has dropped its sender.
        drop(tx);

        let mut devices: HashMap<Ipv4Addr, Device> = HashMap::new();
        let close_at = ctx.deadline() + SCANNER_JOIN_GRACE;
        loop {
            match tokio::time::timeout_at(close_at, rx.recv()).await {
                Ok(Some(event)) => {
                    if let Some(device) = merge_observation(&mut devices, event) {
                        on_device(device);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!("scan window closed with scanners still running");
                    break;
                }
            }
        }

        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }

        let local = self.local_device();
        if let Some(device) = merge_observation(
            &mut devices,
            ScanEvent {
                device: local,
                source_tag: "local".to_string(),
            },
        ) {
            on_device(device);
        }

        devices
    }

    /// Synthetic observation for the host itself.
    fn local_device(&self) -> Device {
        let mut device = Device::new(self.iface.ip);
        device.mac = self.iface.mac.to_string();
        device.display_name = "(this device)".to_string();
        device
    }
}

/// Merges one raw observation into the per-cycle map, returning the
/// merged record when it changed.
fn merge_observation(
    devices: &mut HashMap<Ipv4Addr, Device>,
    event: ScanEvent,
) -> Option<&Device> {
    let ScanEvent { mut device, source_tag } = event;
    device.sources.insert(source_tag);

    let entry = devices
        .entry(device.ip)
        .or_insert_with(|| Device::new(device.ip));
    let mut changed = entry.merge_from(&device);

    // Resolve the manufacturer once a MAC is known.
    if entry.manufacturer.is_empty() && !entry.mac.is_empty() {
        let (vendor, found) = lookup_vendor(&entry.mac);
        if found {
            entry.manufacturer = vendor;
            changed = true;
        }
    }

    // Classify from discovery data alone; a later probe refines this
    // with banners and port evidence.
    let open_tcp = entry.open_ports.get("tcp").cloned().unwrap_or_default();
    let classified = fingerprint(
        &entry.manufacturer,
        &open_tcp,
        &entry.banners,
        &entry.http_server,
        &entry.extra_data,
    );
    if classified != DeviceType::Unknown && entry.device_type != classified.as_str() {
        entry.device_type = classified.as_str().to_string();
        changed = true;
    }

    changed.then_some(&*entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InterfaceInfo;
    use async_trait::async_trait;
    use ipnetwork::Ipv4Network;
    use pnet::datalink::NetworkInterface;
    use pnet::util::MacAddr;
    use std::time::Duration;

    fn test_iface() -> InterfaceInfo {
        let ip = Ipv4Addr::new(192, 168, 1, 50);
        InterfaceInfo {
            name: "test0".to_string(),
            ip,
            mac: MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
            network: Ipv4Network::new(ip, 24).unwrap(),
            broadcast: Ipv4Addr::new(192, 168, 1, 255),
            pnet_interface: NetworkInterface {
                name: "test0".to_string(),
                description: String::new(),
                index: 1,
                mac: Some(MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55)),
                ips: vec!["192.168.1.50/24".parse().unwrap()],
                flags: 0,
            },
        }
    }

    /// Emits a fixed list of canned observations.
    struct StubScanner {
        tag: &'static str,
        observations: Vec<Device>,
    }

    #[async_trait]
    impl Scanner for StubScanner {
        fn name(&self) -> &'static str {
            self.tag
        }

        async fn scan(&self, _ctx: ScanContext, sink: mpsc::Sender<ScanEvent>) {
            for device in &self.observations {
                let event = ScanEvent {
                    device: device.clone(),
                    source_tag: self.tag.to_string(),
                };
                if sink.send(event).await.is_err() {
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn fan_in_merges_sources_by_ip() {
        let printer_ip = Ipv4Addr::new(192, 168, 1, 10);
        let other_ip = Ipv4Addr::new(192, 168, 1, 20);

        let mut arp_printer = Device::new(printer_ip);
        arp_printer.mac = "aa:bb:cc:dd:ee:01".to_string();
        let mut arp_other = Device::new(other_ip);
        arp_other.mac = "aa:bb:cc:dd:ee:02".to_string();

        let mut mdns_printer = Device::new(printer_ip);
        mdns_printer
            .extra_data
            .insert("mdns.service".to_string(), "_ipp._tcp.local.".to_string());

        let engine = DiscoveryEngine::with_scanners(
            test_iface(),
            vec![
                Arc::new(StubScanner {
                    tag: "arp",
                    observations: vec![arp_printer, arp_other],
                }),
                Arc::new(StubScanner {
                    tag: "mdns",
                    observations: vec![mdns_printer],
                }),
            ],
        );

        let ctx = ScanContext::with_duration(Duration::from_millis(500));
        let mut upserts = 0;
        let devices = engine.stream(&ctx, |_device| upserts += 1).await;

        // Two observed hosts plus the injected local device.
        assert_eq!(devices.len(), 3);
        assert!(upserts >= 3);

        let printer = &devices[&printer_ip];
        assert!(printer.sources.contains("arp") && printer.sources.contains("mdns"));
        assert_eq!(printer.mac, "aa:bb:cc:dd:ee:01");
        assert_eq!(printer.device_type, "Printer");

        let other = &devices[&other_ip];
        assert_eq!(
            other.sources.iter().cloned().collect::<Vec<_>>(),
            vec!["arp".to_string()]
        );
    }

    #[tokio::test]
    async fn local_device_is_injected() {
        let iface = test_iface();
        let local_ip = iface.ip;
        let engine = DiscoveryEngine::with_scanners(iface, Vec::new());

        let ctx = ScanContext::with_duration(Duration::from_millis(100));
        let devices = engine.stream(&ctx, |_| {}).await;

        let local = &devices[&local_ip];
        assert!(local.sources.contains("local"));
        assert_eq!(local.display_name, "(this device)");
        assert_eq!(local.mac, "00:11:22:33:44:55");
    }

    #[tokio::test]
    async fn repeat_observations_do_not_refire_callback() {
        let ip = Ipv4Addr::new(192, 168, 1, 30);
        let mut seen = Device::new(ip);
        seen.mac = "aa:bb:cc:dd:ee:03".to_string();

        let engine = DiscoveryEngine::with_scanners(
            test_iface(),
            vec![Arc::new(StubScanner {
                tag: "arp",
                observations: vec![seen.clone(), seen.clone(), seen],
            })],
        );

        let ctx = ScanContext::with_duration(Duration::from_millis(500));
        let mut upserts = 0;
        engine.stream(&ctx, |_| upserts += 1).await;

        // One for the device, one for the injected local host.
        assert_eq!(upserts, 2);
    }
}
