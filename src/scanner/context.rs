//! Cooperative cancellation for scan cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline plus cancel flag threaded through every scanner and probe.
///
/// Scanners poll [`ScanContext::is_done`] between I/O operations and use
/// [`ScanContext::remaining`] to bound blocking reads, so cancellation
/// takes effect within one I/O timeout at worst.
#[derive(Debug, Clone)]
pub struct ScanContext {
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl ScanContext {
    /// Context that expires after the given duration.
    pub fn with_duration(window: Duration) -> Self {
        Self {
            deadline: Instant::now() + window,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Requests cancellation. Idempotent; shared across clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.remaining().is_zero()
    }
}
