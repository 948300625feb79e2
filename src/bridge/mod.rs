//! Bridge surface: a duplex native audio loop with the transform in its capture path.
//!
//! ```text
//!  native loop thread(s)
//! ┌──────────────────────────────────────────────────────────┐
//! │ capture cb ──▶ transform ──▶ HandoffSlot ──▶ playback cb │
//! │      │                          (1 block)                │
//! │      └── failures (try_send) ─────────────┐              │
//! └───────────────────────────────────────────┼──────────────┘
//!                                             ▼
//!                     control thread: start / stop / status / drain_failures
//! ```
//!
//! The callbacks never lock, log or block. Everything the control thread needs
//! from them travels through atomics or a bounded channel.

pub mod driver;
pub mod mock;
pub mod native;
pub mod reblock;
pub mod signal;
pub mod slot;
pub mod stats;

#[cfg(feature = "cpal-audio")]
pub mod cpal_loop;

pub use driver::{CaptureCallback, NativeLoop, PlaybackCallback};
pub use mock::{LoopEvent, MockLoop, PlaybackLog};
pub use native::{BridgeState, BridgeStatus, FatalFault, NativeLoopBridge};
pub use signal::StopSignal;
pub use slot::{ConsumeOutcome, HandoffSlot, PublishOutcome};
pub use stats::{BridgeStats, BridgeStatsSnapshot};

#[cfg(feature = "cpal-audio")]
pub use cpal_loop::CpalDuplexLoop;

use crate::defaults;

/// Configuration for the native loop bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub sample_rate: u32,
    /// Samples per capture/playback callback, fixed by the native loop.
    pub native_block_size: usize,
    /// Slot capacity as a multiple of the native block size.
    pub slot_factor: usize,
    /// Capacity of the failure report channel.
    pub failure_queue: usize,
}

impl BridgeConfig {
    /// Samples the handoff slot can hold. Always at least two native blocks.
    pub fn slot_capacity(&self) -> usize {
        self.native_block_size * self.slot_factor.max(defaults::SLOT_FACTOR)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            native_block_size: defaults::block_samples(defaults::CHUNK_SIZE),
            slot_factor: defaults::SLOT_FACTOR,
            failure_queue: defaults::FAILURE_QUEUE,
        }
    }
}
