//! Pull-mode filter: an upstream byte source run through a block adapter.

use crate::defaults::SAMPLE_BYTES;
use crate::error::Result;
use crate::stream::{ByteSource, StreamBlockAdapter};
use crate::transform::VoiceTransform;
use std::io::Write;
use std::time::Duration;

/// Totals from a [`StreamFilter::pump`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Samples left in the residual buffer when the source ended. They never
    /// formed a complete block, so they were not transformed.
    pub leftover_samples: usize,
}

/// Downstream-facing stream that pulls from a [`ByteSource`] and hands out
/// transformed audio.
pub struct StreamFilter<S: ByteSource, T: VoiceTransform> {
    source: S,
    adapter: StreamBlockAdapter<T>,
}

impl<S: ByteSource, T: VoiceTransform> StreamFilter<S, T> {
    pub fn new(source: S, adapter: StreamBlockAdapter<T>) -> Self {
        Self { source, adapter }
    }

    pub fn adapter(&self) -> &StreamBlockAdapter<T> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut StreamBlockAdapter<T> {
        &mut self.adapter
    }

    pub fn into_parts(self) -> (S, StreamBlockAdapter<T>) {
        (self.source, self.adapter)
    }

    /// Bytes a consumer can expect from the next reads: queued output plus input
    /// (held back and upstream) rounded down to whole blocks.
    pub fn bytes_available(&mut self) -> Result<usize> {
        let queued = self.adapter.pending_len() * SAMPLE_BYTES;
        let input = self.adapter.residual_bytes() + self.source.bytes_available()?;
        let block_bytes = self.adapter.config().block_bytes();
        Ok(queued + input - input % block_bytes)
    }

    /// Pulls up to `max` bytes from the source and returns up to `max` bytes of
    /// transformed output.
    pub fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let data = self.source.read_bytes(max)?;
        self.adapter.write_bytes(&data);
        Ok(self.adapter.read(max))
    }

    /// True once the source has ended and no further output can be produced.
    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
            && self.adapter.pending_len() == 0
            && self.adapter.ready_blocks() == 0
    }

    /// Runs the filter to the end of the source, writing output to `out`.
    ///
    /// `chunk` bounds each read. When a read comes back empty on a live source
    /// the loop sleeps for `poll` before trying again.
    pub fn pump<W: Write>(
        &mut self,
        out: &mut W,
        chunk: usize,
        poll: Duration,
    ) -> Result<PumpSummary> {
        let chunk = chunk.max(SAMPLE_BYTES);
        let mut summary = PumpSummary::default();

        loop {
            let bytes = self.read(chunk)?;
            if !bytes.is_empty() {
                out.write_all(&bytes)?;
                summary.bytes_out += bytes.len() as u64;
                continue;
            }
            if self.is_finished() {
                break;
            }
            if !self.source.is_finished() {
                std::thread::sleep(poll);
            }
        }
        out.flush()?;

        summary.bytes_in = self.adapter.stats().samples_in * SAMPLE_BYTES as u64;
        summary.leftover_samples = self.adapter.residual_len();
        tracing::debug!(
            bytes_in = summary.bytes_in,
            bytes_out = summary.bytes_out,
            leftover = summary.leftover_samples,
            "Stream filter drained"
        );
        Ok(summary)
    }
}
