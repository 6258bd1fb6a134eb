//! Network interface enumeration and selection

use ipnetwork::Ipv4Network;
use pnet::datalink::{self, NetworkInterface};
use pnet::util::MacAddr;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::errors::ScanError;
use crate::models::{InterfaceEntry, InterfaceInfo};
use crate::network::subnet::broadcast_addr;

/// Widest prefix still considered a usable LAN subnet. /31 and /32
/// assignments leave no host range to sweep.
const MAX_LAN_PREFIX: u8 = 30;

/// Returns the first usable IPv4 assignment of an interface.
fn first_ipv4(iface: &NetworkInterface) -> Option<(Ipv4Addr, u8)> {
    iface.ips.iter().find_map(|ip_network| match ip_network.ip() {
        IpAddr::V4(ipv4) => {
            if ipv4.is_unspecified() || ip_network.prefix() == 0 {
                return None;
            }
            // Skip link-local (169.254.x.x) placeholder assignments.
            if ipv4.octets()[0] == 169 && ipv4.octets()[1] == 254 {
                return None;
            }
            Some((ipv4, ip_network.prefix()))
        }
        IpAddr::V6(_) => None,
    })
}

/// LAN-suitability: up, not loopback, not point-to-point, broadcast
/// capable, and holding an IPv4 subnet wide enough to sweep.
pub fn lan_suitable(iface: &NetworkInterface) -> bool {
    if !iface.is_up() || iface.is_loopback() || iface.is_point_to_point() {
        return false;
    }
    if !iface.is_broadcast() {
        return false;
    }
    match first_ipv4(iface) {
        Some((_, prefix)) => prefix <= MAX_LAN_PREFIX,
        None => false,
    }
}

/// Lists all up, non-loopback interfaces with an IPv4 address.
///
/// Entries that fail the LAN-suitability check (VPN tunnels and other
/// point-to-point links) are included and flagged `is_vpn`.
pub fn list_all_interfaces() -> Vec<InterfaceEntry> {
    let mut entries = Vec::new();
    for iface in datalink::interfaces() {
        if !iface.is_up() || iface.is_loopback() {
            continue;
        }
        let Some((ipv4, prefix)) = first_ipv4(&iface) else {
            continue;
        };
        let is_vpn = iface.is_point_to_point() || !iface.is_broadcast();

        let mut flags = Vec::new();
        if iface.is_broadcast() {
            flags.push("broadcast");
        }
        if iface.is_point_to_point() {
            flags.push("point-to-point");
        }
        if iface.is_multicast() {
            flags.push("multicast");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!("[{}]", flags.join(", "))
        };

        entries.push(InterfaceEntry {
            name: iface.name.clone(),
            ipv4: ipv4.to_string(),
            subnet: format!("{}/{}", ipv4, prefix),
            mac: iface.mac.map(|m| m.to_string()).unwrap_or_default(),
            flags,
            is_vpn,
        });
    }
    entries
}

/// Selects the interface to scan on.
///
/// An empty name triggers autodetection; otherwise the name must match
/// exactly. Passing the name of a VPN interface is allowed, which lets a
/// caller force scanning over a tunnel knowing most scanners will be of
/// limited use there.
pub fn select_interface(name: &str) -> Result<InterfaceInfo, ScanError> {
    let interfaces = datalink::interfaces();

    if !name.is_empty() {
        let iface = interfaces
            .iter()
            .find(|candidate| candidate.name == name)
            .ok_or_else(|| ScanError::NameNotFound(name.to_string()))?;
        tracing::info!("using specified network interface {}", name);
        return build_info(iface);
    }

    default_interface(&interfaces)
}

/// Autodetects the default interface.
///
/// Order: the interface carrying the default route (found by opening a
/// dummy UDP socket towards a public resolver), then the first
/// LAN-suitable interface, then any up non-loopback interface with an
/// IPv4 address as a degraded last resort.
fn default_interface(interfaces: &[NetworkInterface]) -> Result<InterfaceInfo, ScanError> {
    if let Some(local_ip) = default_route_ip() {
        let matched = interfaces.iter().find(|iface| {
            iface
                .ips
                .iter()
                .any(|ip_network| ip_network.ip() == IpAddr::V4(local_ip))
        });
        if let Some(iface) = matched {
            if lan_suitable(iface) {
                tracing::info!("using default-route interface {}", iface.name);
                return build_info(iface);
            }
            tracing::warn!(
                "default-route interface {} is not LAN-suitable (likely VPN), falling back",
                iface.name
            );
        }
    }

    if let Some(iface) = interfaces.iter().find(|iface| lan_suitable(iface)) {
        tracing::info!("selected LAN-suitable interface {}", iface.name);
        return build_info(iface);
    }

    if let Some(iface) = interfaces
        .iter()
        .find(|iface| iface.is_up() && !iface.is_loopback() && first_ipv4(iface).is_some())
    {
        tracing::warn!(
            "no LAN-suitable interface found, using {} in degraded mode",
            iface.name
        );
        return build_info(iface);
    }

    Err(ScanError::NoInterfaceFound)
}

/// Determines the local IP the OS would use for outbound traffic by
/// opening a dummy UDP "connection" to a public resolver. No packet is
/// actually sent.
fn default_route_ip() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:53").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ipv4) => Some(ipv4),
        IpAddr::V6(_) => None,
    }
}

fn build_info(iface: &NetworkInterface) -> Result<InterfaceInfo, ScanError> {
    let (ip, prefix) = first_ipv4(iface)
        .ok_or_else(|| ScanError::InterfaceHasNoIpv4(iface.name.clone()))?;

    let network = Ipv4Network::new(ip, prefix)
        .map_err(|e| ScanError::Interface(format!("invalid subnet for {}: {}", iface.name, e)))?;

    Ok(InterfaceInfo {
        name: iface.name.clone(),
        ip,
        mac: iface.mac.unwrap_or_else(MacAddr::zero),
        broadcast: broadcast_addr(ip, network.mask()),
        network,
        pnet_interface: iface.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnetwork::IpNetwork;

    fn fake_interface(flags: u32, ips: Vec<IpNetwork>) -> NetworkInterface {
        NetworkInterface {
            name: "test0".to_string(),
            description: String::new(),
            index: 1,
            mac: Some(pnet::util::MacAddr::new(0, 0x11, 0x22, 0x33, 0x44, 0x55)),
            ips,
            flags,
        }
    }

    // Flag bits follow the classic SIOCGIFFLAGS layout used by pnet on
    // unix targets.
    const IFF_UP: u32 = 0x1;
    const IFF_BROADCAST: u32 = 0x2;
    const IFF_LOOPBACK: u32 = 0x8;
    const IFF_POINTOPOINT: u32 = 0x10;

    #[cfg(unix)]
    #[test]
    fn lan_suitable_requires_broadcast() {
        let ips = vec!["192.168.1.5/24".parse().unwrap()];
        let good = fake_interface(IFF_UP | IFF_BROADCAST, ips.clone());
        assert!(lan_suitable(&good));

        let tunnel = fake_interface(IFF_UP | IFF_POINTOPOINT, ips.clone());
        assert!(!lan_suitable(&tunnel));

        let loopback = fake_interface(IFF_UP | IFF_BROADCAST | IFF_LOOPBACK, ips);
        assert!(!lan_suitable(&loopback));
    }

    #[cfg(unix)]
    #[test]
    fn lan_suitable_rejects_host_only_prefix() {
        let ips = vec!["192.168.1.5/32".parse().unwrap()];
        let iface = fake_interface(IFF_UP | IFF_BROADCAST, ips);
        assert!(!lan_suitable(&iface));
    }

    #[cfg(unix)]
    #[test]
    fn build_info_derives_broadcast() {
        let ips = vec!["192.168.1.37/24".parse().unwrap()];
        let iface = fake_interface(IFF_UP | IFF_BROADCAST, ips);
        let info = build_info(&iface).unwrap();
        assert_eq!(info.ip, Ipv4Addr::new(192, 168, 1, 37));
        assert_eq!(info.broadcast, Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(info.network.prefix(), 24);
    }

    #[test]
    fn build_info_requires_ipv4() {
        let iface = fake_interface(IFF_UP | IFF_BROADCAST, Vec::new());
        assert!(matches!(
            build_info(&iface),
            Err(ScanError::InterfaceHasNoIpv4(_))
        ));
    }
}
