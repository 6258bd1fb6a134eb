//! NetBIOS Node Status (NBSTAT) queries

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::scanner::ScanContext;

const NBSTAT_PORT: u16 = 137;

/// Smallest response that can hold a header, the echoed question, an
/// answer header, and one name entry.
const MIN_RESPONSE_LEN: usize = 57;

/// Queries the NetBIOS name of a host via a Node Status request on UDP
/// port 137. Returns the first registered unique workstation name, or an
/// empty string on any failure.
pub async fn query_netbios(ctx: &ScanContext, ip: Ipv4Addr, timeout: Duration) -> String {
    if ctx.is_done() {
        return String::new();
    }
    let Ok(socket) = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await else {
        return String::new();
    };
    let addr = SocketAddr::from((ip, NBSTAT_PORT));

    let query = build_nbstat_query();
    if socket.send_to(&query, addr).await.is_err() {
        return String::new();
    }

    let mut buf = [0u8; 1024];
    match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => parse_nbstat_response(&buf[..len]),
        _ => String::new(),
    }
}

/// Builds the 50-byte Node Status request for the wildcard name `*`,
/// which asks the target for all of its registered names.
///
/// NetBIOS first-level encoding splits each byte of the 16-byte padded
/// name into two nibbles and adds each to 'A': `*` (0x2a) becomes "CK"
/// and the 15 space pads (0x20) become "CA".
pub fn build_nbstat_query() -> [u8; 50] {
    let mut packet = [0u8; 50];

    // Transaction id 0x0001, flags 0x0000, one question, no records.
    packet[1] = 0x01;
    packet[5] = 0x01;

    // Encoded name: one label of length 32.
    packet[12] = 0x20;
    packet[13] = b'C';
    packet[14] = b'K';
    for i in 0..15 {
        packet[15 + i * 2] = b'C';
        packet[16 + i * 2] = b'A';
    }
    // packet[45] is the 0x00 name terminator.

    // Type NBSTAT (0x0021), class IN (0x0001).
    packet[47] = 0x21;
    packet[49] = 0x01;

    packet
}

/// Extracts the first unique workstation name from an NBSTAT response.
///
/// Walks the echoed question name, skips over the answer name (compressed
/// pointer or label sequence) and its fixed-size record header, then
/// scans the name table for the first non-group entry with suffix 0x00.
/// Any structural problem yields an empty string.
pub fn parse_nbstat_response(data: &[u8]) -> String {
    if data.len() < MIN_RESPONSE_LEN {
        return String::new();
    }

    // Skip the 12-byte header, then the question name labels.
    let mut pos = 12;
    while pos < data.len() && data[pos] != 0x00 {
        pos += data[pos] as usize + 1;
    }
    pos += 1; // name terminator
    pos += 4; // question type + class
    if pos >= data.len() {
        return String::new();
    }

    // Answer name: either a 2-byte compressed pointer or more labels.
    if data[pos] & 0xc0 == 0xc0 {
        pos += 2;
    } else {
        while pos < data.len() && data[pos] != 0x00 {
            pos += data[pos] as usize + 1;
        }
        pos += 1;
    }

    // Type (2) + class (2) + TTL (4) + data length (2).
    pos += 10;
    if pos >= data.len() {
        return String::new();
    }

    let num_names = data[pos] as usize;
    pos += 1;
    if num_names == 0 || pos + 18 > data.len() {
        return String::new();
    }

    // Entries are 15-byte name + 1-byte suffix + 2-byte flags.
    for _ in 0..num_names {
        if pos + 18 > data.len() {
            break;
        }
        let name = String::from_utf8_lossy(&data[pos..pos + 15])
            .trim_end_matches([' ', '\0'])
            .to_string();
        let suffix = data[pos + 15];
        let flags = u16::from_be_bytes([data[pos + 16], data[pos + 17]]);
        pos += 18;

        let is_group = flags & 0x8000 != 0;
        if suffix == 0x00 && !is_group && !name.is_empty() {
            return name;
        }
    }

    String::new()
}
