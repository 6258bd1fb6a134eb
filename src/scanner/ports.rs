//! Bounded-concurrency TCP connect scanning

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

use crate::config::PORT_SCAN_WORKERS;
use crate::scanner::ScanContext;

/// TCP connect scanner with a fixed-width worker pool.
///
/// Each port gets one connect attempt bounded by the per-port timeout.
/// Refused, timed out, and unreachable ports are discarded silently; the
/// callback fires exactly once per open port, in no particular order.
pub struct PortScanner {
    workers: usize,
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new(PORT_SCAN_WORKERS)
    }
}

impl PortScanner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Scans the given ports, invoking `on_open` for each completed
    /// handshake. Cancellation is observed between dials; in-flight
    /// dials are bounded by `timeout`.
    pub async fn scan<F>(
        &self,
        ctx: &ScanContext,
        ip: Ipv4Addr,
        ports: &[u16],
        timeout: Duration,
        on_open: F,
    ) where
        F: Fn(u16) + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let on_open = Arc::new(on_open);
        let mut handles = Vec::with_capacity(ports.len());

        for &port in ports {
            if ctx.is_done() {
                break;
            }
            let semaphore = Arc::clone(&semaphore);
            let on_open = Arc::clone(&on_open);
            let ctx = ctx.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if ctx.is_done() {
                    return;
                }
                let addr = SocketAddr::from((ip, port));
                if let Ok(Ok(stream)) = tokio::time::timeout(timeout, TcpStream::connect(addr)).await
                {
                    drop(stream);
                    on_open(port);
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::debug!("port scan task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reports_open_port_exactly_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);

        let scanner = PortScanner::new(10);
        let ctx = ScanContext::with_duration(Duration::from_secs(5));
        scanner
            .scan(
                &ctx,
                Ipv4Addr::LOCALHOST,
                &[open_port],
                Duration::from_millis(500),
                move |port| sink.lock().unwrap().push(port),
            )
            .await;

        assert_eq!(*found.lock().unwrap(), vec![open_port]);
    }

    #[tokio::test]
    async fn closed_ports_are_discarded() {
        // Bind-then-drop guarantees the port is closed at scan time.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = listener.local_addr().unwrap().port();
        drop(listener);

        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);

        let scanner = PortScanner::default();
        let ctx = ScanContext::with_duration(Duration::from_secs(5));
        scanner
            .scan(
                &ctx,
                Ipv4Addr::LOCALHOST,
                &[closed_port],
                Duration::from_millis(200),
                move |port| sink.lock().unwrap().push(port),
            )
            .await;

        assert!(found.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_skips_remaining_ports() {
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);

        let scanner = PortScanner::new(2);
        let ctx = ScanContext::with_duration(Duration::from_secs(5));
        ctx.cancel();
        scanner
            .scan(
                &ctx,
                Ipv4Addr::LOCALHOST,
                &[1, 2, 3],
                Duration::from_millis(100),
                move |port| sink.lock().unwrap().push(port),
            )
            .await;

        assert!(found.lock().unwrap().is_empty());
    }
}
