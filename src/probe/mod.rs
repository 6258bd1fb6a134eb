//! Probe module - on-demand deep inspection of a single device

mod banner;
mod fingerprint;
mod http;
mod netbios;
mod os;
mod wol;

pub use banner::{grab_banner, sanitize_banner};
pub use fingerprint::{fingerprint, DeviceType};
pub use http::fetch_http_info;
pub use netbios::{build_nbstat_query, parse_nbstat_response, query_netbios};
pub use os::{classify_ttl, detect_os, OsFamily};
pub use wol::{build_magic_packet, parse_mac, send_wol};

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::config::PROBE_TIMEOUT;
use crate::models::ProbeResult;
use crate::scanner::ScanContext;

/// Ports treated as web servers and probed over HTTP instead of a raw
/// banner read.
pub const HTTP_PORTS: &[u16] = &[80, 443, 8080, 8443, 9090];

fn is_http_port(port: u16) -> bool {
    HTTP_PORTS.contains(&port)
}

/// Orchestrates the individual probes against one device.
///
/// Every sub-probe has its own timeout and failures collapse to empty
/// output, so a dead service never aborts the rest of the run.
pub struct Prober {
    timeout: Duration,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

impl Prober {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs reverse DNS, TCP ping, NBSTAT, banner grabs, HTTP metadata
    /// extraction, and both classifiers for the given host.
    pub async fn run_all(
        &self,
        ctx: &ScanContext,
        ip: Ipv4Addr,
        mac: &str,
        manufacturer: &str,
        open_ports: &[u16],
        extra_data: &BTreeMap<String, String>,
    ) -> ProbeResult {
        tracing::debug!("probing {} (mac: {})", ip, mac);
        let mut result = ProbeResult::default();

        result.reverse_dns = crate::network::reverse_dns(ip, self.timeout).await;
        result.latency = tcp_ping(ctx, ip, open_ports, self.timeout).await;
        result.netbios_name = query_netbios(ctx, ip, self.timeout).await;

        // Generic greetings first (SSH, FTP, SMTP and the like).
        for &port in open_ports {
            if ctx.is_done() {
                break;
            }
            if is_http_port(port) {
                continue;
            }
            let banner = grab_banner(ctx, ip, port, self.timeout).await;
            if !banner.is_empty() {
                result.banners.insert(port, banner);
            }
        }

        // Web ports in ascending order; first non-empty title and server
        // values win.
        let mut http_ports: Vec<u16> = open_ports
            .iter()
            .copied()
            .filter(|&port| is_http_port(port))
            .collect();
        http_ports.sort_unstable();
        http_ports.dedup();
        for port in http_ports {
            if ctx.is_done() {
                break;
            }
            let (title, server) = fetch_http_info(ctx, ip, port, self.timeout).await;
            if !title.is_empty() && result.http_title.is_empty() {
                result.http_title = title.clone();
            }
            if !server.is_empty() && result.http_server.is_empty() {
                result.http_server = server.clone();
            }
            // Keep a composite banner for the port as well.
            let mut parts = Vec::new();
            if !server.is_empty() {
                parts.push(server);
            }
            if !title.is_empty() {
                parts.push(format!("\"{title}\""));
            }
            if !parts.is_empty() {
                result.banners.insert(port, parts.join(" | "));
            }
        }

        result.device_type = fingerprint(
            manufacturer,
            open_ports,
            &result.banners,
            &result.http_server,
            extra_data,
        )
        .as_str()
        .to_string();

        result.os = detect_os(
            ctx,
            ip,
            open_ports,
            &result.banners,
            &result.http_server,
            &result.netbios_name,
            extra_data,
            self.timeout,
        )
        .await
        .map(|os| os.as_str().to_string())
        .unwrap_or_default();

        result
    }
}

/// Measures latency as the wall-clock time of the first completed TCP
/// handshake. Known open ports are tried first, then common fallbacks.
pub async fn tcp_ping(
    ctx: &ScanContext,
    ip: Ipv4Addr,
    known_ports: &[u16],
    timeout: Duration,
) -> Option<Duration> {
    let mut ports = known_ports.to_vec();
    for fallback in [80, 443, 22, 135] {
        if !ports.contains(&fallback) {
            ports.push(fallback);
        }
    }

    for port in ports {
        if ctx.is_done() {
            return None;
        }
        let addr = SocketAddr::from((ip, port));
        let start = Instant::now();
        if let Ok(Ok(stream)) = tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            let elapsed = start.elapsed();
            drop(stream);
            return Some(elapsed);
        }
    }
    None
}
