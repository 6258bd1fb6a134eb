//! Subnet calculation and utilities

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::config::MAX_SCAN_HOSTS;

/// Checks if an IP address is the network or broadcast address of a subnet.
pub fn is_special_address(ip: Ipv4Addr, subnet: &Ipv4Network) -> bool {
    ip == subnet.network() || ip == subnet.broadcast()
}

/// Derives the subnet-directed broadcast address: each broadcast byte is
/// the host byte OR-ed with the inverted mask byte.
pub fn broadcast_addr(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    let ip = ip.octets();
    let mask = mask.octets();
    Ipv4Addr::new(
        ip[0] | !mask[0],
        ip[1] | !mask[1],
        ip[2] | !mask[2],
        ip[3] | !mask[3],
    )
}

/// Generates the sweep target list for a subnet, excluding the network
/// and broadcast addresses.
///
/// Very wide subnets are limited to a window of `MAX_SCAN_HOSTS` hosts
/// centered on the local address so one cycle stays bounded.
pub fn host_addresses(subnet: &Ipv4Network, local_ip: Ipv4Addr) -> Vec<Ipv4Addr> {
    let all_ips: Vec<Ipv4Addr> = subnet
        .iter()
        .filter(|ip| !is_special_address(*ip, subnet))
        .collect();

    if all_ips.len() <= MAX_SCAN_HOSTS {
        return all_ips;
    }

    tracing::warn!(
        "subnet {} has {} hosts, limiting sweep to {}",
        subnet,
        all_ips.len(),
        MAX_SCAN_HOSTS
    );

    let center_index = all_ips
        .iter()
        .position(|ip| *ip == local_ip)
        .unwrap_or(all_ips.len() / 2);
    let half_window = MAX_SCAN_HOSTS / 2;

    let mut start = center_index.saturating_sub(half_window);
    if start + MAX_SCAN_HOSTS > all_ips.len() {
        start = all_ips.len().saturating_sub(MAX_SCAN_HOSTS);
    }

    all_ips
        .into_iter()
        .skip(start)
        .take(MAX_SCAN_HOSTS)
        .collect()
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod subnet_tests;
