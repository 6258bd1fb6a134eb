//! Structured logging setup
//!
//! Console output stays compact; a JSON file layer with daily rotation
//! keeps a machine-readable trail. Scanner noise (per-packet parse
//! failures, refused dials) is logged at debug level and never shown to
//! consumers of the event stream.

pub mod macros;

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system.
///
/// Logs go to stderr and to daily rotating files under the platform
/// config directory. `RUST_LOG` controls the level, defaulting to
/// `info`.
pub fn init_logging() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "lanscout.log");

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .json();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        // Tests and embedding applications may have installed a global
        // subscriber already; that is not an error worth failing over.
        if e.to_string().contains("already been set") {
            return Ok(log_dir);
        }
        return Err(Box::new(e));
    }

    tracing::debug!("logging initialized, log directory {}", log_dir.display());
    Ok(log_dir)
}

/// Platform log directory: `%APPDATA%/lanscout/logs` on Windows,
/// `~/.config/lanscout/logs` elsewhere.
fn log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir().ok_or("could not find local data directory")?
    } else {
        dirs::config_dir().ok_or("could not find config directory")?
    };
    Ok(base_dir.join("lanscout").join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_is_namespaced() {
        let dir = log_directory().expect("should resolve a log directory");
        assert!(dir.to_string_lossy().contains("lanscout"));
        assert!(dir.to_string_lossy().ends_with("logs"));
    }
}
