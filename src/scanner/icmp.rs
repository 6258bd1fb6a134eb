//! ICMP echo sweep for fallback liveness

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::sync::{mpsc, Semaphore};

use crate::config::{MAX_CONCURRENT_PINGS, PING_TIMEOUT};
use crate::models::{Device, InterfaceInfo, ScanEvent};
use crate::network::host_addresses;
use crate::scanner::{ScanContext, Scanner};

/// Echo sweep of the subnet host range.
///
/// Catches hosts that ignore ARP replies being seen by us (switched
/// segments, unusual stacks) and records a first latency figure. Needs
/// an ICMP socket; when that is unavailable the scanner disables itself
/// and discovery continues with the remaining sources.
pub struct IcmpScanner {
    iface: InterfaceInfo,
}

impl IcmpScanner {
    pub fn new(iface: InterfaceInfo) -> Self {
        Self { iface }
    }
}

/// Generates a ping identifier from the clock; uniqueness per sweep is
/// all that matters here.
fn ping_id() -> u16 {
    use std::time::SystemTime;
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    ((duration.as_nanos() % 0xFFFF) as u16).wrapping_add(1)
}

#[async_trait]
impl Scanner for IcmpScanner {
    fn name(&self) -> &'static str {
        "icmp"
    }

    async fn scan(&self, ctx: ScanContext, sink: mpsc::Sender<ScanEvent>) {
        let client = match Client::new(&Config::default()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!("ICMP scanner disabled (echo socket unavailable): {}", e);
                return;
            }
        };

        let targets = host_addresses(&self.iface.network, self.iface.ip);
        tracing::debug!("ICMP sweeping {} hosts", targets.len());

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PINGS));
        let mut handles = Vec::new();

        for ip in targets {
            if ctx.is_done() {
                break;
            }
            let client = Arc::clone(&client);
            let semaphore = Arc::clone(&semaphore);
            let sink = sink.clone();
            let ctx = ctx.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if ctx.is_done() {
                    return;
                }

                let payload = [0u8; 56];
                let result = client
                    .pinger(IpAddr::V4(ip), PingIdentifier(ping_id()))
                    .await
                    .timeout(PING_TIMEOUT)
                    .ping(PingSequence(0), &payload)
                    .await;

                if let Ok((_packet, rtt)) = result {
                    let mut device = Device::new(ip);
                    device.latency_ms = Some(rtt.as_millis() as u64);
                    let event = ScanEvent {
                        device,
                        source_tag: "icmp".to_string(),
                    };
                    let _ = sink.send(event).await;
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::debug!("ICMP sweep task failed: {}", e);
            }
        }
    }
}
