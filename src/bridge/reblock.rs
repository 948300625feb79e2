//! Re-blocking between device buffer sizes and the fixed native block size.
//!
//! Audio backends that pick their own buffer sizes (cpal) still have to honour
//! the one-block-per-callback contract of [`CaptureCallback`] and
//! [`PlaybackCallback`].

use crate::bridge::{CaptureCallback, PlaybackCallback};

/// Collects device input and hands out exact blocks to the capture callback.
pub struct CaptureReblocker {
    callback: CaptureCallback,
    pending: Vec<f32>,
    block_size: usize,
}

impl CaptureReblocker {
    pub fn new(callback: CaptureCallback, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            callback,
            pending: Vec::with_capacity(block_size * 2),
            block_size,
        }
    }

    pub fn push(&mut self, data: &[f32]) {
        self.pending.extend_from_slice(data);
        let mut start = 0;
        while self.pending.len() - start >= self.block_size {
            (self.callback)(&self.pending[start..start + self.block_size]);
            start += self.block_size;
        }
        self.pending.drain(..start);
    }

    /// Samples waiting for the rest of their block.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Fills device output buffers from whole blocks pulled off the playback callback.
pub struct PlaybackReblocker {
    callback: PlaybackCallback,
    block: Vec<f32>,
    position: usize,
}

impl PlaybackReblocker {
    pub fn new(callback: PlaybackCallback, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            callback,
            block: vec![0.0; block_size],
            position: block_size,
        }
    }

    pub fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            if self.position == self.block.len() {
                (self.callback)(&mut self.block);
                self.position = 0;
            }
            *sample = self.block[self.position];
            self.position += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_capture_reblocker_emits_exact_blocks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut reblocker = CaptureReblocker::new(
            Box::new(move |block: &[f32]| sink.lock().unwrap().push(block.to_vec())),
            4,
        );

        reblocker.push(&[1.0, 2.0, 3.0]);
        assert!(seen.lock().unwrap().is_empty());

        reblocker.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let blocks = seen.lock().unwrap().clone();
        assert_eq!(
            blocks,
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]
        );
        assert_eq!(reblocker.pending_len(), 1);
    }

    #[test]
    fn test_playback_reblocker_spans_device_buffers() {
        let mut counter = 0.0;
        let mut reblocker = PlaybackReblocker::new(
            Box::new(move |block: &mut [f32]| {
                counter += 1.0;
                block.fill(counter);
            }),
            3,
        );

        let mut first = vec![0.0; 4];
        reblocker.fill(&mut first);
        assert_eq!(first, vec![1.0, 1.0, 1.0, 2.0]);

        let mut second = vec![0.0; 2];
        reblocker.fill(&mut second);
        assert_eq!(second, vec![2.0, 2.0]);
    }
}
