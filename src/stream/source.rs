//! Upstream byte sources for the stream filter.

use crate::error::{Result, VoxError};
use crossbeam_channel::{Receiver, TryRecvError};
use std::collections::VecDeque;
use std::io::Read;

/// Trait for upstream PCM byte sources.
///
/// This trait allows swapping implementations (live channel, file, mock).
pub trait ByteSource: Send {
    /// Bytes that can be read right now without waiting.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `max` bytes. May return fewer, including none.
    fn read_bytes(&mut self, max: usize) -> Result<Vec<u8>>;

    /// True once the source has ended and everything has been read.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Source fed by another thread through a crossbeam channel.
///
/// Reads never block. The source finishes once every sender is dropped and the
/// buffered bytes have been read.
pub struct ChannelSource {
    rx: Receiver<Vec<u8>>,
    buffer: VecDeque<u8>,
    disconnected: bool,
}

impl ChannelSource {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            buffer: VecDeque::new(),
            disconnected: false,
        }
    }

    fn drain_channel(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.buffer.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
    }
}

impl ByteSource for ChannelSource {
    fn bytes_available(&mut self) -> Result<usize> {
        self.drain_channel();
        Ok(self.buffer.len())
    }

    fn read_bytes(&mut self, max: usize) -> Result<Vec<u8>> {
        self.drain_channel();
        let take = max.min(self.buffer.len());
        Ok(self.buffer.drain(..take).collect())
    }

    fn is_finished(&self) -> bool {
        self.disconnected && self.buffer.is_empty()
    }
}

/// Source wrapping any blocking reader (file, stdin, pipe).
pub struct ReaderSource<R: Read + Send> {
    reader: R,
    finished: bool,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            finished: false,
        }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    /// A reader cannot say how much is buffered upstream; report nothing until
    /// a read pulls it in.
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(0)
    }

    fn read_bytes(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.finished || max == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; max];
        let n = loop {
            match self.reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VoxError::StreamSource {
                        message: format!("read failed: {}", e),
                    });
                }
            }
        };
        if n == 0 {
            self.finished = true;
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Mock byte source for testing
#[derive(Debug, Clone, Default)]
pub struct MockByteSource {
    chunks: VecDeque<Vec<u8>>,
    should_fail_read: bool,
    error_message: String,
}

impl MockByteSource {
    /// Create an empty mock source
    pub fn new() -> Self {
        Self {
            error_message: "mock source error".to_string(),
            ..Self::default()
        }
    }

    /// Queue a chunk of bytes
    pub fn with_chunk(mut self, chunk: Vec<u8>) -> Self {
        self.chunks.push_back(chunk);
        self
    }

    /// Queue samples as little-endian f32 PCM
    pub fn with_samples(self, samples: &[f32]) -> Self {
        self.with_chunk(super::samples_to_bytes(samples))
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Push more bytes after construction
    pub fn push(&mut self, chunk: Vec<u8>) {
        self.chunks.push_back(chunk);
    }
}

impl ByteSource for MockByteSource {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.chunks.iter().map(Vec::len).sum())
    }

    fn read_bytes(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.should_fail_read {
            return Err(VoxError::StreamSource {
                message: self.error_message.clone(),
            });
        }

        let mut out = Vec::new();
        while out.len() < max {
            let Some(mut chunk) = self.chunks.pop_front() else {
                break;
            };
            let room = max - out.len();
            if chunk.len() > room {
                let rest = chunk.split_off(room);
                self.chunks.push_front(rest);
            }
            out.extend(chunk);
        }
        Ok(out)
    }

    fn is_finished(&self) -> bool {
        self.chunks.is_empty()
    }
}
