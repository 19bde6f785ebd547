//! Cancellation tokens for network operations

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag checked by long-running operations
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a live token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation
    ///
    /// Returns false if the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.is_cancelled() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(remaining.min(Duration::from_millis(50)));
        }
        !self.is_cancelled()
    }
}

/// Holder of the current token for one kind of operation
///
/// Issuing a new token cancels the previous one, so a fresh user action
/// supersedes a scan or download still in flight.
#[derive(Debug, Default)]
pub struct CancellationSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl CancellationSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous token and return a fresh one
    pub fn issue(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the current token, if any
    pub fn cancel(&self) {
        if let Some(current) = self.current.lock().take() {
            current.cancel();
        }
    }
}
