//! Operating system detection
//!
//! Layered heuristics, strongest first: SSH banners carry distro names,
//! HTTP Server headers and other banners leak platform strings, mDNS and
//! SSDP metadata identify ecosystems, a NetBIOS name is a strong Windows
//! signal, and the TCP TTL separates Windows (128) from Unix-likes (64).
//! Open ports are the last resort.

use serde::Serialize;
use socket2::SockRef;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::probe::fingerprint::flatten_map;
use crate::scanner::ScanContext;

/// Operating system families this detector can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
    FreeBsd,
    Android,
    Ios,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "Windows",
            OsFamily::Linux => "Linux",
            OsFamily::MacOs => "macOS",
            OsFamily::FreeBsd => "FreeBSD",
            OsFamily::Android => "Android",
            OsFamily::Ios => "iOS",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LINUX_DISTRO_HINTS: &[&str] = &[
    "ubuntu", "debian", "fedora", "centos", "rhel", "arch", "gentoo", "opensuse", "suse",
    "alpine", "kali", "mint", "manjaro", "raspbian", "raspberry", "armbian",
];

/// Runs the full detection ladder. The TTL stage opens one TCP
/// connection; everything else works on already-gathered inputs.
#[allow(clippy::too_many_arguments)]
pub async fn detect_os(
    ctx: &ScanContext,
    ip: Ipv4Addr,
    open_ports: &[u16],
    banners: &BTreeMap<u16, String>,
    http_server: &str,
    netbios_name: &str,
    extra_data: &BTreeMap<String, String>,
    timeout: Duration,
) -> Option<OsFamily> {
    if let Some(os) = os_from_ssh_banner(banners) {
        return Some(os);
    }
    if let Some(os) = os_from_http_server(http_server) {
        return Some(os);
    }
    if let Some(os) = os_from_banners(banners) {
        return Some(os);
    }
    if let Some(os) = os_from_extra_data(extra_data) {
        return Some(os);
    }
    if !netbios_name.is_empty() {
        return Some(OsFamily::Windows);
    }
    if let Some(os) = os_from_ttl(ctx, ip, open_ports, timeout).await {
        return Some(os);
    }
    os_from_ports(open_ports)
}

/// Inspects the port 22 banner for OS hints.
pub fn os_from_ssh_banner(banners: &BTreeMap<u16, String>) -> Option<OsFamily> {
    let banner = banners.get(&22)?;
    if banner.is_empty() {
        return None;
    }
    let banner = banner.to_lowercase();

    if LINUX_DISTRO_HINTS.iter().any(|hint| banner.contains(hint)) {
        return Some(OsFamily::Linux);
    }
    if banner.contains("freebsd") {
        return Some(OsFamily::FreeBsd);
    }
    if banner.contains("microsoft") || banner.contains("windows") {
        return Some(OsFamily::Windows);
    }
    // OpenSSH with no further hint is almost always a Unix-like.
    if banner.contains("openssh") {
        return Some(OsFamily::Linux);
    }
    None
}

/// Inspects the HTTP Server header.
pub fn os_from_http_server(server: &str) -> Option<OsFamily> {
    if server.is_empty() {
        return None;
    }
    let server = server.to_lowercase();

    if server.contains("microsoft") || server.contains("iis") {
        return Some(OsFamily::Windows);
    }
    if ["ubuntu", "debian", "centos", "fedora", "red hat"]
        .iter()
        .any(|hint| server.contains(hint))
    {
        return Some(OsFamily::Linux);
    }
    if server.contains("darwin") || server.contains("macos") {
        return Some(OsFamily::MacOs);
    }
    if server.contains("freebsd") {
        return Some(OsFamily::FreeBsd);
    }
    None
}

/// Scans the remaining banners (port 22 is handled separately).
pub fn os_from_banners(banners: &BTreeMap<u16, String>) -> Option<OsFamily> {
    for (port, banner) in banners {
        if *port == 22 {
            continue;
        }
        let banner = banner.to_lowercase();

        if ["windows", "microsoft", "win32", "win64"]
            .iter()
            .any(|hint| banner.contains(hint))
        {
            return Some(OsFamily::Windows);
        }
        if ["ubuntu", "debian", "centos", "fedora", "linux"]
            .iter()
            .any(|hint| banner.contains(hint))
        {
            return Some(OsFamily::Linux);
        }
        if ["darwin", "macos", "mac os"]
            .iter()
            .any(|hint| banner.contains(hint))
        {
            return Some(OsFamily::MacOs);
        }
        if banner.contains("freebsd") {
            return Some(OsFamily::FreeBsd);
        }
    }
    None
}

/// Inspects mDNS/SSDP metadata. Handheld Apple devices are checked
/// before the general Apple ecosystem match.
pub fn os_from_extra_data(extra: &BTreeMap<String, String>) -> Option<OsFamily> {
    if extra.is_empty() {
        return None;
    }
    let combined = flatten_map(extra).to_lowercase();

    if ["iphone", "ipad", "ipod"]
        .iter()
        .any(|hint| combined.contains(hint))
    {
        return Some(OsFamily::Ios);
    }
    if ["apple", "airplay", "_companion-link", "macos", "mac os"]
        .iter()
        .any(|hint| combined.contains(hint))
    {
        return Some(OsFamily::MacOs);
    }
    if combined.contains("android") {
        return Some(OsFamily::Android);
    }
    if combined.contains("windows") || combined.contains("microsoft") {
        return Some(OsFamily::Windows);
    }
    if ["linux", "ubuntu", "debian", "fedora"]
        .iter()
        .any(|hint| combined.contains(hint))
    {
        return Some(OsFamily::Linux);
    }
    None
}

/// Samples the TTL over a TCP connection to the first reachable port and
/// classifies it.
pub async fn os_from_ttl(
    ctx: &ScanContext,
    ip: Ipv4Addr,
    known_ports: &[u16],
    timeout: Duration,
) -> Option<OsFamily> {
    let mut ports = known_ports.to_vec();
    for fallback in [80, 443, 22] {
        if !ports.contains(&fallback) {
            ports.push(fallback);
        }
    }

    for port in ports {
        if ctx.is_done() {
            return None;
        }
        if let Some(ttl) = sample_ttl(ip, port, timeout).await {
            return classify_ttl(ttl);
        }
    }
    None
}

/// Reads the IP_TTL socket option from a connected TCP socket. Not every
/// platform exposes it there; failures yield None and the caller falls
/// through to the next heuristic.
async fn sample_ttl(ip: Ipv4Addr, port: u16, timeout: Duration) -> Option<u8> {
    let addr = SocketAddr::from((ip, port));
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .ok()?
        .ok()?;
    let ttl = SockRef::from(&stream).ttl().ok()?;
    u8::try_from(ttl).ok()
}

/// Maps a TTL value to an OS family. Initial values decay per hop, so
/// ranges are used: 64 starters are Unix-likes, 128 starters are
/// Windows, and the rare high values are legacy Unix stacks.
pub fn classify_ttl(ttl: u8) -> Option<OsFamily> {
    match ttl {
        0 => None,
        1..=64 => Some(OsFamily::Linux),
        65..=128 => Some(OsFamily::Windows),
        129..=255 => Some(OsFamily::Linux),
    }
}

/// Last-resort port patterns.
pub fn os_from_ports(ports: &[u16]) -> Option<OsFamily> {
    let has = |port: u16| ports.contains(&port);

    // RDP, or SMB together with WinRM.
    if has(3389) || (has(445) && has(5985)) {
        return Some(OsFamily::Windows);
    }
    // AFP.
    if has(548) {
        return Some(OsFamily::MacOs);
    }
    None
}
