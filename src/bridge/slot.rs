//! Single-slot handoff between the capture and playback callbacks.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;
const READING: u8 = 3;

/// Result of [`HandoffSlot::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The block is in the slot. `truncated` samples did not fit; `replaced` is
    /// set when an unplayed block was overwritten.
    Stored {
        stored: usize,
        truncated: usize,
        replaced: bool,
    },
    /// Playback was reading the slot; the block was dropped.
    Dropped,
}

/// Result of [`HandoffSlot::consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// `copied` real samples were written; the rest of the buffer is zeros.
    Filled { copied: usize },
    /// No block was ready; the whole buffer is zeros.
    Underrun,
}

/// Lock-free single-producer single-consumer swap cell holding one block.
///
/// The state byte is the have-data flag: it is `READY` exactly when the slot
/// holds samples playback has not consumed. Producer and consumer each claim the
/// slot with a compare-and-swap, so a write and a read are never in progress at
/// the same time and neither side ever waits for the other.
pub struct HandoffSlot {
    state: AtomicU8,
    len: AtomicUsize,
    samples: Box<[AtomicU32]>,
}

impl HandoffSlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            len: AtomicUsize::new(0),
            samples: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// True while a published block waits for playback.
    pub fn has_data(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Stores up to `capacity` samples of `block` and marks the slot ready.
    pub fn publish(&self, block: &[f32]) -> PublishOutcome {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current != EMPTY && current != READY {
                return PublishOutcome::Dropped;
            }
            match self.state.compare_exchange_weak(
                current,
                WRITING,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let stored = block.len().min(self.samples.len());
        for (cell, sample) in self.samples[..stored].iter().zip(block) {
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }
        self.len.store(stored, Ordering::Relaxed);
        self.state.store(READY, Ordering::Release);

        PublishOutcome::Stored {
            stored,
            truncated: block.len() - stored,
            replaced: current == READY,
        }
    }

    /// Moves the pending block into `out`, zero-filling whatever it does not cover.
    pub fn consume(&self, out: &mut [f32]) -> ConsumeOutcome {
        if self
            .state
            .compare_exchange(READY, READING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            out.fill(0.0);
            return ConsumeOutcome::Underrun;
        }

        let copied = out.len().min(self.len.load(Ordering::Relaxed));
        for (sample, cell) in out[..copied].iter_mut().zip(self.samples.iter()) {
            *sample = f32::from_bits(cell.load(Ordering::Relaxed));
        }
        out[copied..].fill(0.0);
        self.state.store(EMPTY, Ordering::Release);

        ConsumeOutcome::Filled { copied }
    }
}
