use super::*;

fn net(addr: &str, prefix: u8) -> Ipv4Network {
    Ipv4Network::new(addr.parse().unwrap(), prefix).unwrap()
}

#[test]
fn broadcast_for_slash24() {
    let got = broadcast_addr(
        Ipv4Addr::new(192, 168, 1, 37),
        Ipv4Addr::new(255, 255, 255, 0),
    );
    assert_eq!(got, Ipv4Addr::new(192, 168, 1, 255));
}

#[test]
fn broadcast_for_slash16() {
    let got = broadcast_addr(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 0, 0));
    assert_eq!(got, Ipv4Addr::new(10, 1, 255, 255));
}

#[test]
fn broadcast_or_mask_is_all_ones() {
    // For every valid ip/mask pair, broadcast | mask must cover all bits.
    let samples = [
        ("192.168.1.37", 24),
        ("10.0.0.1", 8),
        ("172.16.5.9", 20),
        ("192.168.100.14", 30),
    ];
    for (ip, prefix) in samples {
        let network = net(ip, prefix);
        let bcast = broadcast_addr(ip.parse().unwrap(), network.mask());
        let combined: [u8; 4] = std::array::from_fn(|i| {
            bcast.octets()[i] | network.mask().octets()[i]
        });
        assert_eq!(combined, [0xff; 4], "ip={ip} prefix={prefix}");
    }
}

#[test]
fn broadcast_matches_ipnetwork() {
    let network = net("192.168.1.0", 24);
    let derived = broadcast_addr(Ipv4Addr::new(192, 168, 1, 37), network.mask());
    assert_eq!(derived, network.broadcast());
}

#[test]
fn special_addresses_detected() {
    let network = net("192.168.1.0", 24);
    assert!(is_special_address(Ipv4Addr::new(192, 168, 1, 0), &network));
    assert!(is_special_address(Ipv4Addr::new(192, 168, 1, 255), &network));
    assert!(!is_special_address(Ipv4Addr::new(192, 168, 1, 1), &network));
}

#[test]
fn host_addresses_exclude_network_and_broadcast() {
    let network = net("192.168.1.0", 24);
    let hosts = host_addresses(&network, Ipv4Addr::new(192, 168, 1, 37));
    assert_eq!(hosts.len(), 254);
    assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 0)));
    assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 255)));
    assert!(hosts.contains(&Ipv4Addr::new(192, 168, 1, 1)));
}

#[test]
fn host_addresses_cap_wide_subnets() {
    let network = net("10.0.0.0", 16);
    let local = Ipv4Addr::new(10, 0, 128, 1);
    let hosts = host_addresses(&network, local);
    assert_eq!(hosts.len(), crate::config::MAX_SCAN_HOSTS);
    assert!(hosts.contains(&local));
}
