//! Cross-thread stop request for the native loop.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Clonable stop request. Once requested it stays requested.
///
/// `is_requested` is a single atomic load and safe to call from a real-time
/// callback. `wait` and `wait_timeout` block and belong on the loop thread.
#[derive(Debug, Clone)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Requests the stop and wakes a waiter. Never blocks.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.wake();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Blocks until a stop is requested.
    pub fn wait(&self) {
        while !self.is_requested() {
            if self.wake_rx.recv().is_err() {
                return;
            }
        }
        // Hand the wake-up on to the next waiter.
        self.wake();
    }

    /// Blocks until a stop is requested or `timeout` elapses.
    /// Returns true if the stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_requested() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.wake_rx.recv_timeout(remaining) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => return self.is_requested(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.wake();
        self.is_requested()
    }

    fn wake(&self) {
        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
