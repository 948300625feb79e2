//! Stream surface: fixed-block processing of an arbitrarily chunked sample stream.
//!
//! ```text
//! ┌────────────┐ bytes  ┌──────────────────┐ block  ┌───────────┐
//! │ ByteSource │───────▶│ StreamBlockAdapter│───────▶│ Transform │
//! └────────────┘        │  residual buffer  │◀───────│           │
//!                       │  pending output   │ output └───────────┘
//!                       └──────────────────┘
//!                                │ bytes (≤ requested)
//!                                ▼
//!                            consumer
//! ```
//!
//! Everything here is synchronous and single-threaded. Callers that share an
//! adapter between threads must serialize access themselves.

pub mod adapter;
pub mod filter;
pub mod source;
pub mod wav;

pub use adapter::{AdapterStats, StreamBlockAdapter};
pub use filter::{PumpSummary, StreamFilter};
pub use source::{ByteSource, ChannelSource, MockByteSource, ReaderSource};

use crate::defaults;

/// Configuration for the stream adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub sample_rate: u32,
    /// Samples per transform call.
    pub block_size: usize,
}

impl StreamConfig {
    /// Size of one block on the wire.
    pub fn block_bytes(&self) -> usize {
        self.block_size * defaults::SAMPLE_BYTES
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            block_size: defaults::block_samples(defaults::CHUNK_SIZE),
        }
    }
}

/// Encode samples as little-endian f32 PCM.
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * defaults::SAMPLE_BYTES);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 PCM. A trailing partial sample is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(defaults::SAMPLE_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
