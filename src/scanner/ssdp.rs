//! SSDP discovery via HTTP-over-UDP M-SEARCH

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::SSDP_MX_SECS;
use crate::models::{Device, ScanEvent};
use crate::scanner::{ScanContext, Scanner};

const SSDP_MULTICAST: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;

/// How often the listener wakes up to re-check the scan deadline.
const RECV_POLL: Duration = Duration::from_millis(500);

/// Sends an M-SEARCH for `ssdp:all` and parses the unicast responses.
///
/// Emits `ssdp.server`, `ssdp.location`, and `ssdp.st` metadata per
/// responding device. Datagrams that are not M-SEARCH responses are
/// skipped silently.
pub struct SsdpScanner;

#[async_trait]
impl Scanner for SsdpScanner {
    fn name(&self) -> &'static str {
        "ssdp"
    }

    async fn scan(&self, ctx: ScanContext, sink: mpsc::Sender<ScanEvent>) {
        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!("SSDP scanner disabled (socket bind failed): {}", e);
                return;
            }
        };

        let msearch = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST}:{SSDP_PORT}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {SSDP_MX_SECS}\r\n\
             ST: ssdp:all\r\n\r\n"
        );
        let target = SocketAddr::from((SSDP_MULTICAST, SSDP_PORT));

        // Resend once; responders may delay up to MX seconds and UDP is
        // lossy on busy links.
        for _ in 0..2 {
            if ctx.is_done() {
                return;
            }
            if let Err(e) = socket.send_to(msearch.as_bytes(), target).await {
                tracing::warn!("SSDP M-SEARCH send failed: {}", e);
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut buf = [0u8; 2048];
        while !ctx.is_done() {
            let wait = RECV_POLL.min(ctx.remaining());
            match tokio::time::timeout(wait, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    let Some(device) = parse_response(&buf[..len], addr) else {
                        continue;
                    };
                    let event = ScanEvent {
                        device,
                        source_tag: "ssdp".to_string(),
                    };
                    if sink.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!("SSDP receive failed: {}", e);
                    break;
                }
                // Poll timeout, re-check the deadline.
                Err(_) => {}
            }
        }
    }
}

/// Parses one unicast M-SEARCH response into a device observation.
fn parse_response(payload: &[u8], addr: SocketAddr) -> Option<Device> {
    let SocketAddr::V4(addr) = addr else {
        return None;
    };
    let text = String::from_utf8_lossy(payload);
    let mut lines = text.lines();

    // Responses open with an HTTP status line.
    let status = lines.next()?;
    if !status.starts_with("HTTP/1.1 200") {
        return None;
    }

    let mut device = Device::new(*addr.ip());
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_ascii_lowercase().as_str() {
            "server" => {
                device
                    .extra_data
                    .insert("ssdp.server".to_string(), value.to_string());
            }
            "location" => {
                device
                    .extra_data
                    .insert("ssdp.location".to_string(), value.to_string());
            }
            "st" => {
                device
                    .extra_data
                    .insert("ssdp.st".to_string(), value.to_string());
            }
            _ => {}
        }
    }

    Some(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from(addr: &str) -> SocketAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn parses_msearch_response_headers() {
        let payload = b"HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=1800\r\n\
            LOCATION: http://192.168.1.30:80/desc.xml\r\n\
            SERVER: Linux/5.10 UPnP/1.0 Sonos/70.3\r\n\
            ST: upnp:rootdevice\r\n\r\n";
        let device = parse_response(payload, from("192.168.1.30:1900")).unwrap();
        assert_eq!(device.ip, Ipv4Addr::new(192, 168, 1, 30));
        assert_eq!(
            device.extra_data.get("ssdp.server").map(String::as_str),
            Some("Linux/5.10 UPnP/1.0 Sonos/70.3")
        );
        assert_eq!(
            device.extra_data.get("ssdp.location").map(String::as_str),
            Some("http://192.168.1.30:80/desc.xml")
        );
        assert_eq!(
            device.extra_data.get("ssdp.st").map(String::as_str),
            Some("upnp:rootdevice")
        );
    }

    #[test]
    fn rejects_non_responses() {
        // NOTIFY announcements and random datagrams are not M-SEARCH
        // responses and must be skipped.
        let notify = b"NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\n\r\n";
        assert!(parse_response(notify, from("192.168.1.30:1900")).is_none());
        assert!(parse_response(b"\x00\x01\x02", from("192.168.1.30:1900")).is_none());
    }
}
