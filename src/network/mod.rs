//! Network module - interface selection, subnet utilities, DNS resolution, OUI lookup

mod dns;
mod interface;
mod subnet;
mod vendor;

pub use dns::{reverse_dns, reverse_lookup};
pub use interface::{lan_suitable, list_all_interfaces, select_interface};
pub use subnet::{broadcast_addr, host_addresses, is_special_address};
pub use vendor::{is_locally_administered, lookup_vendor};
