//! Wake-on-LAN magic packets

use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

use crate::errors::ScanError;

/// Discard port; NICs inspect the payload, not the port, but 9 is the
/// conventional destination.
const WOL_PORT: u16 = 9;

/// Parses a MAC address in colon or dash notation into its 6 bytes.
pub fn parse_mac(mac: &str) -> Result<[u8; 6], ScanError> {
    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(ScanError::InvalidMac(mac.to_string()));
    }
    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        if part.len() != 2 {
            return Err(ScanError::InvalidMac(mac.to_string()));
        }
        bytes[i] =
            u8::from_str_radix(part, 16).map_err(|_| ScanError::InvalidMac(mac.to_string()))?;
    }
    Ok(bytes)
}

/// Builds the 102-byte magic packet: six 0xff bytes followed by sixteen
/// repetitions of the target MAC.
pub fn build_magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0u8; 102];
    packet[..6].fill(0xff);
    for i in 0..16 {
        packet[6 + i * 6..12 + i * 6].copy_from_slice(&mac);
    }
    packet
}

/// Sends a Wake-on-LAN magic packet for the given MAC to the subnet
/// broadcast address on UDP port 9.
pub async fn send_wol(mac: &str, broadcast: Ipv4Addr) -> Result<(), ScanError> {
    let mac = parse_mac(mac)?;
    let packet = build_magic_packet(mac);

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| ScanError::Network(format!("bind WoL socket: {e}")))?;
    socket
        .set_broadcast(true)
        .map_err(|e| ScanError::Network(format!("enable broadcast: {e}")))?;
    socket
        .send_to(&packet, SocketAddr::from((broadcast, WOL_PORT)))
        .await
        .map_err(|e| ScanError::Network(format!("send WoL packet to {broadcast}: {e}")))?;

    tracing::info!("WoL packet sent to {} via {}", format_mac(mac), broadcast);
    Ok(())
}

fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_and_dash_notation() {
        let expected = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        assert_eq!(parse_mac("aa:bb:cc:dd:ee:ff").unwrap(), expected);
        assert_eq!(parse_mac("AA-BB-CC-DD-EE-FF").unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_macs() {
        assert!(parse_mac("").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee").is_err());
        assert!(parse_mac("aa:bb:cc:dd:ee:ff:00").is_err());
        assert!(parse_mac("zz:bb:cc:dd:ee:ff").is_err());
        assert!(parse_mac("aabb:cc:dd:ee:ff:0").is_err());
    }

    #[test]
    fn magic_packet_layout() {
        let mac = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let packet = build_magic_packet(mac);

        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..6], &[0xff; 6]);
        for i in 0..16 {
            assert_eq!(&packet[6 + i * 6..12 + i * 6], &mac, "repetition {i}");
        }
        // Spot checks on the first and last repetitions.
        assert_eq!(&packet[6..12], &mac);
        assert_eq!(&packet[96..102], &mac);
    }

    #[tokio::test]
    async fn send_rejects_invalid_mac_without_touching_network() {
        let result = send_wol("not-a-mac", Ipv4Addr::new(192, 168, 1, 255)).await;
        assert!(matches!(result, Err(ScanError::InvalidMac(_))));
    }
}
