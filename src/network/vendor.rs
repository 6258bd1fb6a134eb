//! MAC address manufacturer lookup against the bundled OUI database.

use mac_oui::Oui;
use std::sync::OnceLock;

/// Global OUI database instance (loaded once, on first lookup).
static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB.get_or_init(|| Oui::default().ok()).as_ref()
}

/// Check if a MAC address is locally administered (randomized/virtual).
///
/// Bit 0x02 of the first octet: 0 means universally administered (real
/// hardware), 1 means locally administered.
pub fn is_locally_administered(mac: &str) -> bool {
    let first_byte: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(2)
        .collect();
    if first_byte.len() < 2 {
        return false;
    }
    match u8::from_str_radix(&first_byte, 16) {
        Ok(byte) => (byte & 0x02) != 0,
        Err(_) => false,
    }
}

/// Looks up the manufacturer for a MAC address.
///
/// Returns the manufacturer name and whether the prefix was found.
/// Randomized MACs resolve to a fixed placeholder name so consumers can
/// still label the device.
pub fn lookup_vendor(mac: &str) -> (String, bool) {
    if mac.is_empty() {
        return (String::new(), false);
    }

    if is_locally_administered(mac) {
        return ("Private Device (Randomized MAC)".to_string(), true);
    }

    if let Some(db) = oui_db() {
        if let Ok(Some(entry)) = db.lookup_by_mac(mac) {
            return (entry.company_name.clone(), true);
        }
    }

    (String::new(), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locally_administered_bit() {
        assert!(is_locally_administered("5a:05:d7:51:07:81"));
        assert!(is_locally_administered("d2:81:c8:45:6b:71"));
        assert!(!is_locally_administered("34:4a:c3:22:6f:90"));
        assert!(!is_locally_administered("00:1c:b3:00:00:00"));
    }

    #[test]
    fn empty_mac_not_found() {
        let (vendor, found) = lookup_vendor("");
        assert!(vendor.is_empty());
        assert!(!found);
    }

    #[test]
    fn randomized_mac_gets_placeholder() {
        let (vendor, found) = lookup_vendor("5a:05:d7:51:07:81");
        assert!(found);
        assert!(vendor.contains("Randomized"));
    }
}
