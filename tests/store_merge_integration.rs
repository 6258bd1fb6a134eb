//! Device store merge semantics exercised through the public API.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use lanscout::{Device, DeviceStore};

fn device_with_source(ip: Ipv4Addr, source: &str) -> Device {
    let mut device = Device::new(ip);
    device.sources.insert(source.to_string());
    device
}

#[test]
fn sources_never_shrink_across_upserts() {
    let store = DeviceStore::new();
    let ip = Ipv4Addr::new(192, 168, 1, 40);

    let mut seen: BTreeSet<String> = BTreeSet::new();
    for source in ["arp", "mdns", "icmp", "arp", "ssdp"] {
        let merged = store.upsert(device_with_source(ip, source));
        seen.insert(source.to_string());
        // Every source tag ever observed is still present.
        assert!(merged.sources.is_superset(&seen));
    }
}

#[test]
fn non_empty_scalars_never_revert_to_empty() {
    let store = DeviceStore::new();
    let ip = Ipv4Addr::new(192, 168, 1, 41);

    let mut first = Device::new(ip);
    first.mac = "aa:bb:cc:dd:ee:ff".to_string();
    first.netbios_name = "WORKSTATION".to_string();
    store.upsert(first);

    // A later observation that knows nothing about those fields.
    let merged = store.upsert(device_with_source(ip, "icmp"));
    assert_eq!(merged.mac, "aa:bb:cc:dd:ee:ff");
    assert_eq!(merged.netbios_name, "WORKSTATION");
}

#[test]
fn store_keys_are_unique_per_ip() {
    let store = DeviceStore::new();
    for _ in 0..5 {
        store.upsert(device_with_source(Ipv4Addr::new(10, 0, 0, 1), "arp"));
        store.upsert(device_with_source(Ipv4Addr::new(10, 0, 0, 2), "arp"));
    }
    assert_eq!(store.len(), 2);

    store.clear();
    assert_eq!(store.len(), 0);
}

#[test]
fn display_name_is_kept_once_set() {
    let store = DeviceStore::new();
    let ip = Ipv4Addr::new(192, 168, 1, 42);

    let mut named = Device::new(ip);
    named.display_name = "office-printer".to_string();
    store.upsert(named);

    let mut renamed = Device::new(ip);
    renamed.display_name = "something-else".to_string();
    let merged = store.upsert(renamed);
    assert_eq!(merged.display_name, "office-printer");
}

#[test]
fn completed_port_scan_replaces_previous_list() {
    let store = DeviceStore::new();
    let ip = Ipv4Addr::new(192, 168, 1, 43);

    let mut first = Device::new(ip);
    first.open_ports.insert("tcp".to_string(), vec![22, 80, 443]);
    store.upsert(first);

    let mut second = Device::new(ip);
    second.open_ports.insert("tcp".to_string(), vec![22]);
    let merged = store.upsert(second);
    assert_eq!(merged.open_ports.get("tcp"), Some(&vec![22]));
}

#[test]
fn selection_follows_devices() {
    let store = DeviceStore::new();
    let ip = Ipv4Addr::new(192, 168, 1, 44);
    store.upsert(device_with_source(ip, "arp"));

    store.set_selected(Some(ip));
    assert_eq!(store.selected().map(|d| d.ip), Some(ip));

    store.set_selected(None);
    assert!(store.selected().is_none());
}

#[test]
fn snapshot_is_a_consistent_frame() {
    let store = DeviceStore::new();
    let ip = Ipv4Addr::new(192, 168, 1, 45);
    store.upsert(device_with_source(ip, "arp"));

    let frame = store.snapshot();
    store.upsert(device_with_source(ip, "mdns"));
    store.upsert(device_with_source(Ipv4Addr::new(192, 168, 1, 46), "arp"));

    assert_eq!(frame.len(), 1);
    assert_eq!(
        frame[0].sources.iter().cloned().collect::<Vec<_>>(),
        vec!["arp".to_string()]
    );
}
