//! Default configuration constants for voxbridge.
//!
//! Shared between the config file layer and the plain component configs so the
//! two never drift apart.

/// Default audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48000;

/// Number of samples in one chunk unit.
///
/// The logical block size is always a whole number of these units.
pub const CHUNK_UNIT_SAMPLES: usize = 128;

/// Default chunk count per logical block (22 × 128 = 2816 samples, ~58.7 ms at 48 kHz).
pub const CHUNK_SIZE: u32 = 22;

/// Smallest accepted chunk count.
pub const MIN_CHUNK_SIZE: u32 = 8;

/// Largest accepted chunk count.
pub const MAX_CHUNK_SIZE: u32 = 256;

/// Width of one PCM sample on the wire (little-endian f32).
pub const SAMPLE_BYTES: usize = 4;

/// Number of entries in a transform timing record.
pub const TIMING_SLOTS: usize = 3;

/// Handoff slot capacity as a multiple of the native block size.
///
/// Two blocks absorb a one-block length change from the transform.
pub const SLOT_FACTOR: usize = 2;

/// Capacity of the queue that carries transform failures off the audio thread.
pub const FAILURE_QUEUE: usize = 64;

/// Input level (dBFS) below which the transform is skipped and silence emitted.
///
/// -90 effectively disables gating.
pub const SILENT_THRESHOLD_DB: i32 = -90;

/// Accepted range for the silence gate.
pub const MIN_SILENT_THRESHOLD_DB: i32 = -90;
pub const MAX_SILENT_THRESHOLD_DB: i32 = -60;

/// Seconds of audio history handed to the voice changer alongside each block.
pub const EXTRA_CONVERT_SIZE: f32 = 3.0;

/// Sample count of the logical block for a given chunk count.
pub fn block_samples(chunk_size: u32) -> usize {
    chunk_size as usize * CHUNK_UNIT_SAMPLES
}

/// Block duration in milliseconds at the given sample rate.
pub fn block_duration_ms(block_samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    block_samples as f64 * 1000.0 / sample_rate as f64
}
