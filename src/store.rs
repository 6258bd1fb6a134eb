//! In-memory device store shared between the engine and its consumers.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock};

use crate::models::Device;

/// Mapping of IP to [`Device`] with merge-on-upsert semantics.
///
/// A single writer lock serializes mutations; readers get consistent
/// frames through [`DeviceStore::snapshot`] so rendering never observes a
/// half-merged record. Devices persist until [`DeviceStore::clear`] or
/// process exit.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: RwLock<HashMap<Ipv4Addr, Device>>,
    selected: RwLock<Option<Ipv4Addr>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges an observation into the store and returns the merged record.
    pub fn upsert(&self, incoming: Device) -> Device {
        let mut devices = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = devices
            .entry(incoming.ip)
            .or_insert_with(|| Device::new(incoming.ip));
        entry.merge_from(&incoming);
        entry.clone()
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<Device> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ip)
            .cloned()
    }

    /// Returns the currently selected device, if any.
    pub fn selected(&self) -> Option<Device> {
        let ip = (*self
            .selected
            .read()
            .unwrap_or_else(PoisonError::into_inner))?;
        self.get(ip)
    }

    pub fn set_selected(&self, ip: Option<Ipv4Addr>) {
        *self
            .selected
            .write()
            .unwrap_or_else(PoisonError::into_inner) = ip;
    }

    /// Returns a stable copy of all devices, ordered by IP.
    pub fn snapshot(&self) -> Vec<Device> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Device> = devices.values().cloned().collect();
        all.sort_by_key(|device| device.ip);
        all
    }

    pub fn len(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all devices and the selection. Used when the engine is
    /// rebuilt on a different interface.
    pub fn clear(&self) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .selected
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keys_by_ip() {
        let store = DeviceStore::new();
        let ip = Ipv4Addr::new(192, 168, 1, 2);

        let mut first = Device::new(ip);
        first.sources.insert("arp".to_string());
        store.upsert(first);

        let mut second = Device::new(ip);
        second.sources.insert("mdns".to_string());
        let merged = store.upsert(second);

        assert_eq!(store.len(), 1);
        assert!(merged.sources.contains("arp") && merged.sources.contains("mdns"));
    }

    #[test]
    fn snapshot_is_sorted_and_stable() {
        let store = DeviceStore::new();
        for last in [9u8, 3, 7] {
            store.upsert(Device::new(Ipv4Addr::new(10, 0, 0, last)));
        }
        let snapshot = store.snapshot();
        let ips: Vec<u8> = snapshot.iter().map(|d| d.ip.octets()[3]).collect();
        assert_eq!(ips, vec![3, 7, 9]);

        // Mutating the store after the snapshot does not affect it.
        store.upsert(Device::new(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn clear_drops_devices_and_selection() {
        let store = DeviceStore::new();
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        store.upsert(Device::new(ip));
        store.set_selected(Some(ip));
        store.clear();
        assert!(store.is_empty());
        assert!(store.selected().is_none());
    }
}
