//! Device type classification
//!
//! Three-stage precedence: the OUI manufacturer is the strongest signal,
//! then advertised mDNS/SSDP services, then open ports and banners.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Classification buckets for discovered devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    Router,
    Printer,
    Nas,
    Camera,
    SmartTv,
    Phone,
    Desktop,
    Server,
    SmartHome,
    GameConsole,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Router => "Router/Gateway",
            DeviceType::Printer => "Printer",
            DeviceType::Nas => "NAS/Storage",
            DeviceType::Camera => "IP Camera",
            DeviceType::SmartTv => "Smart TV",
            DeviceType::Phone => "Phone/Tablet",
            DeviceType::Desktop => "Desktop/Laptop",
            DeviceType::Server => "Server",
            DeviceType::SmartHome => "Smart Home",
            DeviceType::GameConsole => "Game Console",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a device from everything known about it. Pure function;
/// identical inputs always yield the identical type.
pub fn fingerprint(
    manufacturer: &str,
    open_ports: &[u16],
    banners: &BTreeMap<u16, String>,
    http_server: &str,
    extra_data: &BTreeMap<String, String>,
) -> DeviceType {
    let mfr = manufacturer.to_lowercase();
    let server = http_server.to_lowercase();
    let extra = flatten_map(extra_data).to_lowercase();

    if let Some(device_type) = by_manufacturer(&mfr) {
        return device_type;
    }
    if let Some(device_type) = by_services(&extra) {
        return device_type;
    }
    if let Some(device_type) = by_ports(open_ports, banners, &server) {
        return device_type;
    }
    DeviceType::Unknown
}

/// Manufacturer keyword table, checked first.
pub fn by_manufacturer(mfr: &str) -> Option<DeviceType> {
    if mfr.is_empty() {
        return None;
    }

    const RULES: &[(&[&str], DeviceType)] = &[
        (
            &[
                "apple", "samsung", "huawei", "xiaomi", "oppo", "vivo", "oneplus", "motorola",
                "nokia", "sony mobile", "google", "pixel",
            ],
            DeviceType::Phone,
        ),
        (
            &[
                "canon", "epson", "brother", "lexmark", "xerox", "ricoh", "kyocera", "konica",
            ],
            DeviceType::Printer,
        ),
        (
            &[
                "cisco", "juniper", "arista", "ubiquiti", "mikrotik", "netgear", "tp-link",
                "d-link", "linksys", "zyxel", "zte",
            ],
            DeviceType::Router,
        ),
        (
            &["synology", "qnap", "western digital", "buffalo", "seagate"],
            DeviceType::Nas,
        ),
        (
            &["lg electronics", "tcl", "hisense", "vizio", "roku"],
            DeviceType::SmartTv,
        ),
        (&["nintendo", "valve"], DeviceType::GameConsole),
        (
            &[
                "espressif", "tuya", "shelly", "sonoff", "wemo", "ring", "nest", "amazon", "echo",
            ],
            DeviceType::SmartHome,
        ),
        (
            &[
                "dell", "lenovo", "hewlett", "hp inc", "acer", "intel", "realtek", "gigabyte",
                "msi", "asustek",
            ],
            DeviceType::Desktop,
        ),
        (
            &["hikvision", "dahua", "axis", "reolink", "amcrest", "wyze"],
            DeviceType::Camera,
        ),
    ];

    RULES
        .iter()
        .find(|(keywords, _)| contains_any(mfr, keywords))
        .map(|(_, device_type)| *device_type)
}

/// mDNS/SSDP metadata keyword table, checked against the flattened
/// key/value text.
pub fn by_services(extra: &str) -> Option<DeviceType> {
    if extra.is_empty() {
        return None;
    }

    const RULES: &[(&[&str], DeviceType)] = &[
        (&["printer", "_ipp.", "_pdl-"], DeviceType::Printer),
        (
            &[
                "chromecast", "googlecast", "smarttv", "roku", "airplay", "_raop.",
            ],
            DeviceType::SmartTv,
        ),
        (&["camera", "ipcam"], DeviceType::Camera),
        (&["_smb.", "_afp.", "timemachine"], DeviceType::Nas),
        (&["homekit", "_hap."], DeviceType::SmartHome),
        (
            &["playstation", "xbox", "nintendo"],
            DeviceType::GameConsole,
        ),
    ];

    RULES
        .iter()
        .find(|(keywords, _)| contains_any(extra, keywords))
        .map(|(_, device_type)| *device_type)
}

/// Port and banner heuristics, the weakest stage.
pub fn by_ports(
    ports: &[u16],
    banners: &BTreeMap<u16, String>,
    http_server: &str,
) -> Option<DeviceType> {
    let has = |port: u16| ports.contains(&port);

    // Raw printing or IPP.
    if has(9100) || has(631) {
        return Some(DeviceType::Printer);
    }
    // RTSP.
    if has(554) {
        return Some(DeviceType::Camera);
    }
    // DNS or DHCP service.
    if has(53) || has(67) || has(68) {
        return Some(DeviceType::Router);
    }
    // SMB shares plus a web UI.
    if has(139) && has(445) && (has(80) || has(443)) {
        return Some(DeviceType::Nas);
    }
    // SSH plus web plus a database listener.
    if has(22)
        && (has(80) || has(443))
        && [3306, 5432, 27017, 9200, 6379].iter().any(|&p| has(p))
    {
        return Some(DeviceType::Server);
    }

    if !http_server.is_empty()
        && (http_server.contains("printer") || http_server.contains("cups"))
    {
        return Some(DeviceType::Printer);
    }

    let all_banners = banners
        .values()
        .map(|banner| banner.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if all_banners.contains("ssh") {
        return Some(DeviceType::Desktop);
    }

    None
}

/// Flattens a metadata map into one searchable string.
pub fn flatten_map(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(key, value)| format!("{key} {value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
