//! Command dispatch for the CLI front end.
//!
//! Output goes through a hook on the context so embedding code and tests
//! can capture it instead of scraping stdout.

use anyhow::{Context as _, Result};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cli::{parse_cli_args, usage_text, version_text, CliCommand};
use crate::config::EngineConfig;
use crate::models::{Device, WatchEvent};
use crate::network::{list_all_interfaces, select_interface};
use crate::probe::{send_wol, Prober};
use crate::scanner::{DiscoveryEngine, PortScanner, ScanContext};
use crate::store::DeviceStore;
use crate::watch::NetworkWatcher;

pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct AppContext {
    config: EngineConfig,
    output_hook: OutputHook,
}

impl Default for AppContext {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            output_hook: Arc::new(|line| println!("{}", line)),
        }
    }
}

impl AppContext {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_output_hook(mut self, output_hook: OutputHook) -> Self {
        self.output_hook = output_hook;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn emit_line(&self, line: &str) {
        (self.output_hook)(line);
    }
}

/// Parses CLI-style args and dispatches the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let context = AppContext::default();
    run_with_context(args, &context).await
}

/// Same as [`run`] but with an explicit context (config and output hook).
pub async fn run_with_context<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command_with_context(command, context).await
}

/// Executes a pre-parsed command. Reusable from non-CLI entrypoints.
pub async fn execute_command_with_context(
    command: CliCommand,
    context: &AppContext,
) -> Result<()> {
    match command {
        CliCommand::Help => {
            context.emit_line(&usage_text());
            Ok(())
        }
        CliCommand::Version => {
            context.emit_line(&version_text());
            Ok(())
        }
        CliCommand::Interfaces => handle_interfaces(context),
        CliCommand::Scan { interface, json } => handle_scan(interface, json, context).await,
        CliCommand::Watch {
            interface,
            interval_secs,
        } => handle_watch(interface, interval_secs, context).await,
        CliCommand::Probe { ip } => handle_probe(ip, context).await,
        CliCommand::Ports { ip } => handle_ports(ip, context).await,
        CliCommand::Wake { mac } => handle_wake(mac, context).await,
    }
}

fn handle_interfaces(context: &AppContext) -> Result<()> {
    let entries = list_all_interfaces();
    if entries.is_empty() {
        context.emit_line("No usable network interfaces found.");
        return Ok(());
    }
    context.emit_line(&format!(
        "{:<16} {:<16} {:<20} {:<18} {}",
        "NAME", "IPV4", "SUBNET", "MAC", "FLAGS"
    ));
    for entry in entries {
        let vpn_marker = if entry.is_vpn { " (vpn)" } else { "" };
        context.emit_line(&format!(
            "{:<16} {:<16} {:<20} {:<18} {}{}",
            entry.name, entry.ipv4, entry.subnet, entry.mac, entry.flags, vpn_marker
        ));
    }
    Ok(())
}

async fn handle_scan(interface: Option<String>, json: bool, context: &AppContext) -> Result<()> {
    let mut config = context.config.clone();
    if let Some(name) = interface {
        config.network_interface = name;
    }

    let iface = select_interface(&config.network_interface)
        .context("failed to select a network interface")?;
    context.emit_line(&format!(
        "Scanning {} on {} (cycle {:?})...",
        iface.network, iface.name, config.scan_duration
    ));

    let engine = DiscoveryEngine::new(iface, &config);
    let store = DeviceStore::new();
    let ctx = ScanContext::with_duration(config.scan_duration);
    engine
        .stream(&ctx, |device| {
            store.upsert(device.clone());
        })
        .await;

    let devices = store.snapshot();
    if json {
        let rendered = serde_json::to_string_pretty(&devices)
            .context("failed to serialize scan results")?;
        context.emit_line(&rendered);
    } else {
        context.emit_line(&format!(
            "{:<16} {:<24} {:<18} {:<28} {}",
            "IP", "NAME", "MAC", "MANUFACTURER", "SOURCES"
        ));
        for device in &devices {
            context.emit_line(&format_device_row(device));
        }
        context.emit_line(&format!("{} devices found", devices.len()));
    }
    Ok(())
}

fn format_device_row(device: &Device) -> String {
    let sources = device
        .sources
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{:<16} {:<24} {:<18} {:<28} {}",
        device.ip.to_string(),
        truncate(&device.display_name, 24),
        device.mac,
        truncate(&device.manufacturer, 28),
        sources
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

async fn handle_watch(
    interface: Option<String>,
    interval_secs: Option<u64>,
    context: &AppContext,
) -> Result<()> {
    let mut config = context.config.clone();
    if let Some(name) = interface {
        config.network_interface = name;
    }
    if let Some(secs) = interval_secs {
        config.scan_interval = std::time::Duration::from_secs(secs);
    }

    let hook = Arc::clone(&context.output_hook);
    let watcher = NetworkWatcher::new(
        config,
        Arc::new(move |event| {
            if let Some(line) = format_watch_event(&event) {
                hook(&line);
            }
        }),
    )
    .context("failed to build the network watcher")?;

    watcher.start_scan();
    context.emit_line("Watching; press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    watcher.stop_scan().await;
    Ok(())
}

fn format_watch_event(event: &WatchEvent) -> Option<String> {
    match event {
        WatchEvent::ScanStarted => Some("scan cycle started".to_string()),
        WatchEvent::ScanStopped { devices } => {
            Some(format!("scan cycle complete, {} devices known", devices))
        }
        WatchEvent::DeviceUpserted { device } => Some(format_device_row(device)),
        WatchEvent::Warn { message } => Some(format!("warning: {}", message)),
        _ => None,
    }
}

async fn handle_probe(ip: Ipv4Addr, context: &AppContext) -> Result<()> {
    let config = &context.config;

    // A port scan first gives the prober banners to chew on.
    context.emit_line(&format!("Port scanning {}...", ip));
    let open_ports = scan_ports(ip, config).await;
    context.emit_line(&format!("Open TCP ports: {:?}", open_ports));

    context.emit_line(&format!("Probing {}...", ip));
    let prober = Prober::new(config.probe_timeout);
    let ctx = ScanContext::with_duration(crate::config::PROBE_WINDOW);
    let result = prober
        .run_all(&ctx, ip, "", "", &open_ports, &Default::default())
        .await;

    if !result.reverse_dns.is_empty() {
        context.emit_line(&format!("Reverse DNS:  {}", result.reverse_dns));
    }
    if let Some(latency) = result.latency {
        context.emit_line(&format!("Latency:      {:?}", latency));
    }
    if !result.netbios_name.is_empty() {
        context.emit_line(&format!("NetBIOS name: {}", result.netbios_name));
    }
    if !result.http_server.is_empty() {
        context.emit_line(&format!("HTTP server:  {}", result.http_server));
    }
    if !result.http_title.is_empty() {
        context.emit_line(&format!("HTTP title:   {}", result.http_title));
    }
    for (port, banner) in &result.banners {
        context.emit_line(&format!("Banner {:>5}: {}", port, banner));
    }
    context.emit_line(&format!("Device type:  {}", result.device_type));
    if !result.os.is_empty() {
        context.emit_line(&format!("OS guess:     {}", result.os));
    }
    Ok(())
}

async fn handle_ports(ip: Ipv4Addr, context: &AppContext) -> Result<()> {
    context.emit_line(&format!("Port scanning {}...", ip));
    let open_ports = scan_ports(ip, &context.config).await;
    if open_ports.is_empty() {
        context.emit_line("No open TCP ports found.");
    } else {
        for port in open_ports {
            context.emit_line(&format!("{}/tcp open", port));
        }
    }
    Ok(())
}

async fn scan_ports(ip: Ipv4Addr, config: &EngineConfig) -> Vec<u16> {
    let scanner = PortScanner::default();
    let ctx = ScanContext::with_duration(config.scan_duration);
    let found: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&found);
    scanner
        .scan(
            &ctx,
            ip,
            &config.port_scanner.tcp,
            config.port_scanner.timeout,
            move |port| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(port);
            },
        )
        .await;
    let mut ports = std::mem::take(&mut *found.lock().unwrap_or_else(PoisonError::into_inner));
    ports.sort_unstable();
    ports
}

async fn handle_wake(mac: String, context: &AppContext) -> Result<()> {
    let iface = select_interface(&context.config.network_interface)
        .context("failed to select a network interface")?;
    send_wol(&mac, iface.broadcast)
        .await
        .with_context(|| format!("failed to wake {}", mac))?;
    context.emit_line(&format!(
        "Magic packet sent to {} via {}",
        mac, iface.broadcast
    ));
    Ok(())
}
