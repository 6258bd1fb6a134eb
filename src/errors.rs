use thiserror::Error;

/// Error kinds surfaced by the discovery engine and probe pipeline.
///
/// Per-host and per-packet failures are absorbed inside the scanners and
/// never reach this type; only failures the caller can act on (bad
/// configuration, unusable interface, refused sockets) are reported.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no usable network interface found")]
    NoInterfaceFound,

    #[error("interface {0} has no IPv4 address")]
    InterfaceHasNoIpv4(String),

    #[error("interface {0} not found")]
    NameNotFound(String),

    #[error("interface error: {0}")]
    Interface(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("insufficient privileges: {0}")]
    Permission(String),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
