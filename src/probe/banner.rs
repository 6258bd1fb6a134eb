//! Service banner grabbing

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::scanner::ScanContext;

/// Longest banner kept after sanitization.
const MAX_BANNER_LEN: usize = 120;

/// Connects to a TCP port and reads the initial service greeting (SSH,
/// FTP, SMTP and friends announce themselves on connect).
///
/// Returns the sanitized banner, or an empty string on any failure.
pub async fn grab_banner(ctx: &ScanContext, ip: Ipv4Addr, port: u16, timeout: Duration) -> String {
    if ctx.is_done() {
        return String::new();
    }
    let addr = SocketAddr::from((ip, port));
    let Ok(Ok(mut stream)) = tokio::time::timeout(timeout, TcpStream::connect(addr)).await else {
        return String::new();
    };

    let mut buf = [0u8; 1024];
    let read = match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        _ => 0,
    };
    if read == 0 {
        return String::new();
    }
    sanitize_banner(&buf[..read])
}

/// Cleans a raw banner: keeps the first line only, drops everything
/// outside printable ASCII, trims, and caps the length.
pub fn sanitize_banner(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(raw.len());
    let clean: String = raw[..end]
        .iter()
        .filter(|&&b| (0x20..=0x7e).contains(&b))
        .map(|&b| b as char)
        .collect();
    let trimmed = clean.trim();
    if trimmed.len() > MAX_BANNER_LEN {
        format!("{}...", &trimmed[..MAX_BANNER_LEN - 3])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_line_only() {
        let banner = sanitize_banner(b"SSH-2.0-OpenSSH_9.0\r\nsecond line");
        assert_eq!(banner, "SSH-2.0-OpenSSH_9.0");
    }

    #[test]
    fn strips_control_characters() {
        let banner = sanitize_banner(b"\x01\x02hello\x7fworld\x1b");
        assert_eq!(banner, "helloworld");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize_banner(b"  220 ready  "), "220 ready");
    }

    #[test]
    fn truncates_with_ellipsis() {
        let long = vec![b'a'; 200];
        let banner = sanitize_banner(&long);
        assert_eq!(banner.len(), 120);
        assert!(banner.ends_with("..."));
        assert!(banner[..117].bytes().all(|b| b == b'a'));
    }

    #[test]
    fn output_is_printable_ascii_without_crlf() {
        let mut raw = Vec::new();
        for byte in 0u8..=255 {
            raw.push(byte);
        }
        // Move the line break out of the way so the whole range is seen.
        let raw: Vec<u8> = raw.into_iter().filter(|&b| b != b'\r' && b != b'\n').collect();
        let banner = sanitize_banner(&raw);
        assert!(banner.bytes().all(|b| (0x20..=0x7e).contains(&b)));
        assert!(banner.len() <= 120);
    }

    #[test]
    fn exact_limit_is_not_truncated() {
        let exact = vec![b'x'; 120];
        let banner = sanitize_banner(&exact);
        assert_eq!(banner.len(), 120);
        assert!(!banner.ends_with("..."));
    }
}
