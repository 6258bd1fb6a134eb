//! lanscout - LAN device discovery CLI
//!
//! Thin front end over the library: one-shot scans, a continuous watch
//! mode, per-host probing and port scans, and Wake-on-LAN.

#[tokio::main]
async fn main() {
    if let Err(e) = lanscout::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    if let Err(e) = lanscout::app::run(std::env::args()).await {
        lanscout::log_error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
