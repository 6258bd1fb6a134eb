//! ARP sweep over the attached subnet

use async_trait::async_trait;
use pnet::datalink::{self, Channel};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use tokio::sync::mpsc;

use crate::config::{ARP_READ_TIMEOUT, ARP_SEND_GAP};
use crate::models::{Device, InterfaceInfo, ScanEvent};
use crate::network::{host_addresses, is_special_address};
use crate::scanner::{ScanContext, Scanner};

/// Broadcast MAC address for ARP requests
const BROADCAST_MAC: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

/// Layer 2 probe of every host address in the subnet.
///
/// Requires raw packet access. When the datalink channel cannot be
/// opened (typically missing privileges) the scanner disables itself
/// with a warning and the engine continues with the remaining sources.
pub struct ArpScanner {
    iface: InterfaceInfo,
}

impl ArpScanner {
    pub fn new(iface: InterfaceInfo) -> Self {
        Self { iface }
    }
}

#[async_trait]
impl Scanner for ArpScanner {
    fn name(&self) -> &'static str {
        "arp"
    }

    async fn scan(&self, ctx: ScanContext, sink: mpsc::Sender<ScanEvent>) {
        let iface = self.iface.clone();
        let sweep = tokio::task::spawn_blocking(move || run_sweep(&iface, &ctx, &sink));
        if let Err(e) = sweep.await {
            tracing::warn!("ARP sweep task failed: {}", e);
        }
    }
}

/// Builds one 42-byte ARP request frame (14-byte Ethernet header plus a
/// 28-byte ARP payload).
fn create_arp_request(
    source_mac: MacAddr,
    source_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; 42];

    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer[..14])?;
        ethernet.set_destination(BROADCAST_MAC);
        ethernet.set_source(source_mac);
        ethernet.set_ethertype(EtherTypes::Arp);
    }

    {
        let mut arp = MutableArpPacket::new(&mut buffer[14..42])?;
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Request);
        arp.set_sender_hw_addr(source_mac);
        arp.set_sender_proto_addr(source_ip);
        arp.set_target_hw_addr(MacAddr::zero());
        arp.set_target_proto_addr(target_ip);
    }

    Some(buffer)
}

fn run_sweep(iface: &InterfaceInfo, ctx: &ScanContext, sink: &mpsc::Sender<ScanEvent>) {
    let channel_config = datalink::Config {
        read_timeout: Some(ARP_READ_TIMEOUT),
        ..Default::default()
    };

    let (mut tx, rx) = match datalink::channel(&iface.pnet_interface, channel_config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => {
            tracing::warn!("ARP scanner disabled: unsupported datalink channel type");
            return;
        }
        Err(e) => {
            // Raw sockets need CAP_NET_RAW or equivalent; degrade instead
            // of failing the whole engine.
            tracing::warn!(
                "ARP scanner disabled on {} (raw socket unavailable): {}",
                iface.name,
                e
            );
            return;
        }
    };

    let targets = host_addresses(&iface.network, iface.ip);
    tracing::debug!("ARP sweeping {} hosts on {}", targets.len(), iface.name);

    // Replies are collected on a separate thread until the window closes,
    // so late answers to early requests are still accepted.
    let receiver = {
        let ctx = ctx.clone();
        let sink = sink.clone();
        let subnet = iface.network;
        let mut rx = rx;
        std::thread::spawn(move || {
            while !ctx.is_done() {
                match rx.next() {
                    Ok(frame) => {
                        let Some((ip, mac)) = parse_arp_reply(frame) else {
                            continue;
                        };
                        if !subnet.contains(ip) || is_special_address(ip, &subnet) {
                            continue;
                        }
                        let mut device = Device::new(ip);
                        device.mac = mac.to_string();
                        let event = ScanEvent {
                            device,
                            source_tag: "arp".to_string(),
                        };
                        if sink.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    // Read timeouts surface as errors; they only mean the
                    // deadline check should run again.
                    Err(_) => continue,
                }
            }
        })
    };

    for target in &targets {
        if ctx.is_done() {
            break;
        }
        match create_arp_request(iface.mac, iface.ip, *target) {
            Some(frame) => {
                if let Some(Err(e)) = tx.send_to(&frame, None) {
                    tracing::debug!("ARP send to {} failed: {}", target, e);
                }
            }
            None => tracing::debug!("failed to build ARP request for {}", target),
        }
        std::thread::sleep(ARP_SEND_GAP);
    }

    if receiver.join().is_err() {
        tracing::warn!("ARP receiver thread panicked");
    }
}

/// Extracts sender IP and MAC from an ARP reply frame, or None for
/// anything that is not a well-formed reply.
fn parse_arp_reply(frame: &[u8]) -> Option<(Ipv4Addr, MacAddr)> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }
    Some((arp.get_sender_proto_addr(), arp.get_sender_hw_addr()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_layout() {
        let frame = create_arp_request(
            MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(192, 168, 1, 20),
        )
        .unwrap();

        assert_eq!(frame.len(), 42);
        // Destination is the broadcast MAC.
        assert_eq!(&frame[..6], &[0xff; 6]);
        // EtherType ARP.
        assert_eq!(&frame[12..14], &[0x08, 0x06]);

        let arp = ArpPacket::new(&frame[14..]).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_sender_proto_addr(), Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(arp.get_target_proto_addr(), Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn reply_parser_ignores_requests() {
        let frame = create_arp_request(
            MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(192, 168, 1, 20),
        )
        .unwrap();
        assert!(parse_arp_reply(&frame).is_none());
    }
}
