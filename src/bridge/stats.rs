//! Counters updated from the real-time callbacks.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared between the callbacks and the control thread.
#[derive(Debug, Default)]
pub struct BridgeStats {
    captured_blocks: AtomicU64,
    played_blocks: AtomicU64,
    underruns: AtomicU64,
    truncations: AtomicU64,
    truncated_samples: AtomicU64,
    overruns: AtomicU64,
    replaced_blocks: AtomicU64,
    transform_failures: AtomicU64,
    dropped_failure_reports: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStatsSnapshot {
    pub captured_blocks: u64,
    pub played_blocks: u64,
    pub underruns: u64,
    pub truncations: u64,
    pub truncated_samples: u64,
    /// Blocks dropped because playback was reading the slot.
    pub overruns: u64,
    /// Blocks overwritten before playback got to them.
    pub replaced_blocks: u64,
    pub transform_failures: u64,
    pub dropped_failure_reports: u64,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_capture(&self) {
        self.captured_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_played(&self) {
        self.played_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncation(&self, samples: usize) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
        self.truncated_samples
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replaced(&self) {
        self.replaced_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transform_failure(&self) {
        self.transform_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_failure_report(&self) {
        self.dropped_failure_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            captured_blocks: self.captured_blocks.load(Ordering::Relaxed),
            played_blocks: self.played_blocks.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            truncations: self.truncations.load(Ordering::Relaxed),
            truncated_samples: self.truncated_samples.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            replaced_blocks: self.replaced_blocks.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            dropped_failure_reports: self.dropped_failure_reports.load(Ordering::Relaxed),
        }
    }
}
