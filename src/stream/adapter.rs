//! Residual-carrying block adapter between a sample stream and a transform.

use crate::defaults::SAMPLE_BYTES;
use crate::stream::{StreamConfig, samples_to_bytes};
use crate::transform::{FailureReporter, LogReporter, VoiceTransform};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Counters kept by the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    pub samples_in: u64,
    pub samples_out: u64,
    pub blocks_processed: u64,
    pub transform_failures: u64,
}

/// Reassembles an arbitrarily chunked stream into fixed blocks for a transform.
///
/// Input goes into a FIFO residual buffer. Each `read` pulls whole blocks off the
/// front, runs the transform on them, and returns the concatenated output. Partial
/// blocks are never handed to the transform; they wait for more input.
///
/// Output that does not fit the caller's budget is queued and handed out first on
/// the next `read`, so no transformed sample is ever dropped.
pub struct StreamBlockAdapter<T: VoiceTransform> {
    transform: T,
    config: StreamConfig,
    residual: VecDeque<f32>,
    /// Leading bytes of a sample split across `write_bytes` calls.
    partial: [u8; SAMPLE_BYTES],
    partial_len: usize,
    pending: VecDeque<f32>,
    scratch: Vec<f32>,
    last_output_len: Option<usize>,
    reporter: Arc<dyn FailureReporter>,
    stats: AdapterStats,
}

impl<T: VoiceTransform> StreamBlockAdapter<T> {
    /// Creates an adapter that logs transform failures.
    pub fn new(transform: T, mut config: StreamConfig) -> Self {
        config.block_size = config.block_size.max(1);
        Self {
            transform,
            scratch: Vec::with_capacity(config.block_size),
            config,
            residual: VecDeque::new(),
            partial: [0; SAMPLE_BYTES],
            partial_len: 0,
            pending: VecDeque::new(),
            last_output_len: None,
            reporter: Arc::new(LogReporter),
            stats: AdapterStats::default(),
        }
    }

    /// Sets a custom failure reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn stats(&self) -> &AdapterStats {
        &self.stats
    }

    /// Appends samples to the residual buffer.
    pub fn write_samples(&mut self, samples: &[f32]) {
        self.residual.extend(samples.iter().copied());
        self.stats.samples_in += samples.len() as u64;
    }

    /// Appends little-endian f32 PCM. A sample split across calls is completed by
    /// the next call.
    pub fn write_bytes(&mut self, mut bytes: &[u8]) {
        if self.partial_len > 0 {
            let need = SAMPLE_BYTES - self.partial_len;
            let take = need.min(bytes.len());
            self.partial[self.partial_len..self.partial_len + take].copy_from_slice(&bytes[..take]);
            self.partial_len += take;
            bytes = &bytes[take..];
            if self.partial_len < SAMPLE_BYTES {
                return;
            }
            self.residual.push_back(f32::from_le_bytes(self.partial));
            self.stats.samples_in += 1;
            self.partial_len = 0;
        }

        let chunks = bytes.chunks_exact(SAMPLE_BYTES);
        let tail = chunks.remainder();
        for b in chunks {
            self.residual.push_back(f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
            self.stats.samples_in += 1;
        }
        self.partial[..tail.len()].copy_from_slice(tail);
        self.partial_len = tail.len();
    }

    /// Bytes of input that form complete blocks, i.e. what a `read` can turn into
    /// output without waiting for more data. Always a multiple of the block width.
    ///
    /// No transform work happens here; it is deferred to `read`.
    pub fn available_output_count(&self) -> usize {
        self.ready_blocks() * self.config.block_bytes()
    }

    /// Number of complete blocks waiting in the residual buffer.
    pub fn ready_blocks(&self) -> usize {
        self.residual.len() / self.config.block_size
    }

    /// Samples waiting in the residual buffer.
    pub fn residual_len(&self) -> usize {
        self.residual.len()
    }

    /// Bytes of input held back, including an incomplete trailing sample.
    pub fn residual_bytes(&self) -> usize {
        self.residual.len() * SAMPLE_BYTES + self.partial_len
    }

    /// Transformed samples queued from an earlier over-budget read.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Reads up to `max_bytes` of transformed PCM.
    ///
    /// Returns fewer bytes (possibly none) when not enough input is queued; that is
    /// backpressure, not an error. Only whole samples are returned.
    pub fn read(&mut self, max_bytes: usize) -> Vec<u8> {
        let samples = self.read_samples(max_bytes / SAMPLE_BYTES);
        samples_to_bytes(&samples)
    }

    /// Reads up to `max_samples` transformed samples.
    pub fn read_samples(&mut self, max_samples: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(max_samples.min(self.pending.len() + self.residual.len()));

        let queued = self.pending.len().min(max_samples);
        out.extend(self.pending.drain(..queued));

        while out.len() < max_samples && self.residual.len() >= self.config.block_size {
            let produced = self.process_next_block();
            let room = max_samples - out.len();
            if produced.len() <= room {
                out.extend_from_slice(&produced);
            } else {
                out.extend_from_slice(&produced[..room]);
                self.pending.extend(produced[room..].iter().copied());
            }
        }

        self.stats.samples_out += out.len() as u64;
        out
    }

    /// Drops all buffered input and queued output.
    pub fn clear(&mut self) {
        self.residual.clear();
        self.pending.clear();
        self.partial_len = 0;
    }

    fn process_next_block(&mut self) -> Vec<f32> {
        self.scratch.clear();
        self.scratch.extend(self.residual.drain(..self.config.block_size));

        let output = self.transform.convert(&self.scratch, self.config.sample_rate);
        self.stats.blocks_processed += 1;

        match output.failure {
            Some(failure) => {
                self.stats.transform_failures += 1;
                self.reporter.report("stream", &failure);
                vec![0.0; self.last_output_len.unwrap_or(self.config.block_size)]
            }
            None => {
                self.last_output_len = Some(output.samples.len());
                output.samples
            }
        }
    }
}
