//! mDNS/DNS-SD service discovery

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::HashSet;
use std::net::IpAddr;
use tokio::sync::mpsc;

use crate::models::{Device, ScanEvent};
use crate::scanner::{ScanContext, Scanner};

/// Meta-query that enumerates every advertised service type on the link.
const META_QUERY: &str = "_services._dns-sd._udp.local.";

/// Multicast DNS browser on 224.0.0.251:5353.
///
/// Browses the DNS-SD meta-service, then follows up on each advertised
/// service type so instances resolve to addresses. Devices are emitted
/// with `mdns.service`, `mdns.name`, and `mdns.hostname` metadata.
pub struct MdnsScanner;

#[async_trait]
impl Scanner for MdnsScanner {
    fn name(&self) -> &'static str {
        "mdns"
    }

    async fn scan(&self, ctx: ScanContext, sink: mpsc::Sender<ScanEvent>) {
        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            Err(e) => {
                tracing::warn!("mDNS scanner disabled (multicast join failed): {}", e);
                return;
            }
        };
        let meta = match daemon.browse(META_QUERY) {
            Ok(receiver) => receiver,
            Err(e) => {
                tracing::warn!("mDNS scanner disabled (browse failed): {}", e);
                daemon.shutdown().ok();
                return;
            }
        };

        // Sub-browses forward their events into one channel so a single
        // loop can drain everything.
        let (forward_tx, mut forward_rx) = mpsc::channel::<ServiceEvent>(64);
        let mut browsed: HashSet<String> = HashSet::from([META_QUERY.to_string()]);

        loop {
            if ctx.is_done() {
                break;
            }
            tokio::select! {
                event = meta.recv_async() => match event {
                    Ok(ServiceEvent::ServiceFound(_, service_type)) => {
                        if browsed.insert(service_type.clone()) {
                            match daemon.browse(&service_type) {
                                Ok(receiver) => {
                                    let forward = forward_tx.clone();
                                    tokio::spawn(async move {
                                        while let Ok(event) = receiver.recv_async().await {
                                            if forward.send(event).await.is_err() {
                                                break;
                                            }
                                        }
                                    });
                                }
                                Err(e) => {
                                    tracing::debug!("mDNS browse {} failed: {}", service_type, e);
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
                forwarded = forward_rx.recv() => {
                    if let Some(ServiceEvent::ServiceResolved(info)) = forwarded {
                        if let Some(device) = device_from_service(&info) {
                            let event = ScanEvent {
                                device,
                                source_tag: "mdns".to_string(),
                            };
                            if sink.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                _ = tokio::time::sleep(ctx.remaining()) => break,
            }
        }

        daemon.shutdown().ok();
    }
}

/// Converts a resolved DNS-SD service into a device observation.
fn device_from_service(info: &ServiceInfo) -> Option<Device> {
    let ip = info.get_addresses().iter().find_map(|addr| match addr {
        IpAddr::V4(ipv4) => Some(*ipv4),
        IpAddr::V6(_) => None,
    })?;

    let mut device = Device::new(ip);
    let service_type = info.get_type().to_string();
    let instance = info
        .get_fullname()
        .trim_end_matches(info.get_type())
        .trim_end_matches('.')
        .to_string();
    let hostname = info.get_hostname().trim_end_matches('.').to_string();

    device
        .extra_data
        .insert("mdns.service".to_string(), service_type);
    if !instance.is_empty() {
        device
            .extra_data
            .insert("mdns.name".to_string(), instance.clone());
        device.display_name = instance;
    }
    if !hostname.is_empty() {
        device
            .extra_data
            .insert("mdns.hostname".to_string(), hostname);
    }

    Some(device)
}
