//! Scanner module - discovery sources, engine fan-in, and port scanning

mod arp;
mod context;
mod engine;
mod icmp;
mod mdns;
mod ports;
mod ssdp;

pub use arp::ArpScanner;
pub use context::ScanContext;
pub use engine::DiscoveryEngine;
pub use icmp::IcmpScanner;
pub use mdns::MdnsScanner;
pub use ports::PortScanner;
pub use ssdp::SsdpScanner;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::ScanEvent;

/// A discovery source emitting partial device observations.
///
/// Implementations own their sockets for the duration of one scan, absorb
/// per-packet failures (logged, never surfaced to the sink), and return
/// once the context expires or the sink closes.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Source tag recorded in `Device::sources`.
    fn name(&self) -> &'static str;

    /// Runs one sweep, sending observations to the sink until done.
    async fn scan(&self, ctx: ScanContext, sink: mpsc::Sender<ScanEvent>);
}
