//! Continuous discovery with an event stream and request API
//!
//! Wraps the engine, store, port scanner, and prober behind the surface
//! a UI consumes: periodic scan cycles pushing `DeviceUpserted` events,
//! plus on-demand probe, port scan, interface switch, and Wake-on-LAN
//! requests.

use chrono::Utc;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{EngineConfig, PROBE_WINDOW};
use crate::errors::ScanError;
use crate::models::{Device, InterfaceInfo, WatchEvent};
use crate::network::select_interface;
use crate::probe::{send_wol, Prober};
use crate::scanner::{DiscoveryEngine, PortScanner, ScanContext};
use crate::store::DeviceStore;

/// Callback invoked for every event the watcher emits.
pub type EventCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// Engine wiring that is rebuilt when the interface changes.
struct Wiring {
    iface: InterfaceInfo,
    engine: Arc<DiscoveryEngine>,
    scan_ctx: Option<ScanContext>,
}

struct WatcherState {
    /// Scan loop enable flag; clearing it stops the loop after the
    /// current cycle.
    scanning: AtomicBool,
    /// True while a cycle is in flight, so an interface switch can wait
    /// for the scanners to unwind.
    cycle_active: AtomicBool,
    wiring: Mutex<Wiring>,
    /// IPs with an outstanding probe; one probe per device at a time.
    probing: StdMutex<HashSet<Ipv4Addr>>,
}

/// Long-lived discovery controller.
pub struct NetworkWatcher {
    config: EngineConfig,
    store: Arc<DeviceStore>,
    state: Arc<WatcherState>,
    port_scanner: Arc<PortScanner>,
    prober: Arc<Prober>,
    callback: EventCallback,
}

impl NetworkWatcher {
    /// Builds the watcher on the configured interface (or the
    /// autodetected one when the name is empty).
    pub fn new(config: EngineConfig, callback: EventCallback) -> Result<Self, ScanError> {
        let iface = select_interface(&config.network_interface)?;
        tracing::info!(
            "watcher bound to {} ({} on {})",
            iface.name,
            iface.ip,
            iface.network
        );
        let engine = Arc::new(DiscoveryEngine::new(iface.clone(), &config));

        Ok(Self {
            store: Arc::new(DeviceStore::new()),
            state: Arc::new(WatcherState {
                scanning: AtomicBool::new(false),
                cycle_active: AtomicBool::new(false),
                wiring: Mutex::new(Wiring {
                    iface,
                    engine,
                    scan_ctx: None,
                }),
                probing: StdMutex::new(HashSet::new()),
            }),
            port_scanner: Arc::new(PortScanner::default()),
            prober: Arc::new(Prober::new(config.probe_timeout)),
            callback,
            config,
        })
    }

    pub fn store(&self) -> Arc<DeviceStore> {
        Arc::clone(&self.store)
    }

    pub async fn interface(&self) -> InterfaceInfo {
        self.state.wiring.lock().await.iface.clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.state.scanning.load(Ordering::SeqCst)
    }

    /// Starts the periodic scan loop. Idempotent; a second call while
    /// running is a no-op.
    pub fn start_scan(&self) {
        if self.state.scanning.swap(true, Ordering::SeqCst) {
            return;
        }

        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let callback = Arc::clone(&self.callback);
        let scan_duration = self.config.scan_duration;
        let scan_interval = self.config.scan_interval;

        tokio::spawn(async move {
            tracing::info!(
                "scan loop started (cycle {:?}, interval {:?})",
                scan_duration,
                scan_interval
            );

            while state.scanning.load(Ordering::SeqCst) {
                (*callback)(WatchEvent::ScanStarted);
                state.cycle_active.store(true, Ordering::SeqCst);

                let (engine, ctx) = {
                    let mut wiring = state.wiring.lock().await;
                    let ctx = ScanContext::with_duration(scan_duration);
                    wiring.scan_ctx = Some(ctx.clone());
                    (Arc::clone(&wiring.engine), ctx)
                };

                let store_ref = &store;
                let callback_ref = &callback;
                engine
                    .stream(&ctx, |device| {
                        let merged = store_ref.upsert(device.clone());
                        (*callback_ref)(WatchEvent::DeviceUpserted {
                            device: Box::new(merged),
                        });
                    })
                    .await;

                state.wiring.lock().await.scan_ctx = None;
                state.cycle_active.store(false, Ordering::SeqCst);
                (*callback)(WatchEvent::ScanStopped {
                    devices: store.len(),
                });

                // Sleep in one-second steps so stop requests take effect
                // quickly.
                let wait_secs = scan_interval.as_secs().max(1);
                for _ in 0..wait_secs {
                    if !state.scanning.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            tracing::info!("scan loop stopped");
        });
    }

    /// Stops the scan loop and cancels any in-flight cycle.
    pub async fn stop_scan(&self) {
        self.state.scanning.store(false, Ordering::SeqCst);
        if let Some(ctx) = self.state.wiring.lock().await.scan_ctx.take() {
            ctx.cancel();
        }
    }

    /// Rebuilds the engine on another interface.
    ///
    /// The new interface is validated first; on failure the existing
    /// wiring stays untouched. On success the in-flight scan is
    /// cancelled, the scanners unwind, the store is cleared, and the
    /// loop restarts if it was running.
    pub async fn switch_interface(&self, name: &str) -> Result<(), ScanError> {
        {
            let wiring = self.state.wiring.lock().await;
            if wiring.iface.name == name {
                tracing::debug!("interface unchanged, skipping switch");
                return Ok(());
            }
        }

        let new_iface = match select_interface(name) {
            Ok(iface) => iface,
            Err(e) => {
                // Report and keep the existing wiring intact.
                (*self.callback)(WatchEvent::Warn {
                    message: format!("interface switch to {name} failed: {e}"),
                });
                return Err(e);
            }
        };
        tracing::info!("switching interface to {}", new_iface.name);

        let was_scanning = self.state.scanning.swap(false, Ordering::SeqCst);
        {
            let mut wiring = self.state.wiring.lock().await;
            if let Some(ctx) = wiring.scan_ctx.take() {
                ctx.cancel();
            }
        }
        // Wait for the current cycle to unwind before rewiring.
        while self.state.cycle_active.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        {
            let mut wiring = self.state.wiring.lock().await;
            wiring.engine = Arc::new(DiscoveryEngine::new(new_iface.clone(), &self.config));
            wiring.iface = new_iface;
        }
        self.store.clear();

        if was_scanning {
            self.start_scan();
        }
        Ok(())
    }

    /// Runs the full probe pipeline against one device and merges the
    /// results. Only one probe per device runs at a time; a request for
    /// a device already being probed is dropped.
    pub async fn probe(&self, ip: Ipv4Addr) {
        {
            let mut probing = self
                .state
                .probing
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !probing.insert(ip) {
                tracing::debug!("probe for {} already in flight", ip);
                return;
            }
        }
        (*self.callback)(WatchEvent::ProbeStarted { ip });

        let device = self.store.get(ip).unwrap_or_else(|| Device::new(ip));
        let open_ports = device.open_ports.get("tcp").cloned().unwrap_or_default();

        let ctx = ScanContext::with_duration(PROBE_WINDOW);
        let result = self
            .prober
            .run_all(
                &ctx,
                ip,
                &device.mac,
                &device.manufacturer,
                &open_ports,
                &device.extra_data,
            )
            .await;

        let mut update = Device::new(ip);
        update.reverse_dns = result.reverse_dns.clone();
        update.latency_ms = result.latency.map(|latency| latency.as_millis() as u64);
        update.banners = result.banners;
        update.http_title = result.http_title;
        update.http_server = result.http_server;
        update.netbios_name = result.netbios_name.clone();
        update.device_type = result.device_type;
        update.os = result.os;
        update.last_probe = Some(Utc::now());
        if device.display_name.is_empty() {
            update.display_name = if !result.netbios_name.is_empty() {
                result.netbios_name
            } else {
                result.reverse_dns
            };
        }

        let merged = self.store.upsert(update);
        (*self.callback)(WatchEvent::DeviceUpserted {
            device: Box::new(merged),
        });

        self.state
            .probing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ip);
        (*self.callback)(WatchEvent::ProbeStopped { ip });
    }

    /// Scans the configured TCP port list against one device. The result
    /// replaces the previous list wholesale.
    pub async fn port_scan(&self, ip: Ipv4Addr) {
        (*self.callback)(WatchEvent::PortScanStarted { ip });

        let ctx = ScanContext::with_duration(self.config.scan_duration);
        let found: Arc<StdMutex<Vec<u16>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&found);

        self.port_scanner
            .scan(
                &ctx,
                ip,
                &self.config.port_scanner.tcp,
                self.config.port_scanner.timeout,
                move |port| {
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(port);
                },
            )
            .await;

        let mut ports = std::mem::take(
            &mut *found.lock().unwrap_or_else(PoisonError::into_inner),
        );
        ports.sort_unstable();

        let mut update = Device::new(ip);
        update.open_ports.insert("tcp".to_string(), ports);
        update.last_port_scan = Some(Utc::now());

        let merged = self.store.upsert(update);
        (*self.callback)(WatchEvent::DeviceUpserted {
            device: Box::new(merged),
        });
        (*self.callback)(WatchEvent::PortScanStopped { ip });
    }

    /// Sends a Wake-on-LAN magic packet to a stored device.
    pub async fn wake(&self, ip: Ipv4Addr) -> Result<(), ScanError> {
        let device = self
            .store
            .get(ip)
            .ok_or_else(|| ScanError::Config(format!("unknown device {ip}")))?;
        if device.mac.is_empty() {
            return Err(ScanError::InvalidMac(format!(
                "device {ip} has no resolved MAC address"
            )));
        }
        let broadcast = self.state.wiring.lock().await.iface.broadcast;
        send_wol(&device.mac, broadcast).await
    }
}
