//! Contract between the bridge and a platform audio loop.

use crate::bridge::StopSignal;
use crate::error::Result;

/// Called with exactly one native block of captured samples.
pub type CaptureCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Called with a buffer of one native block to fill for playback.
pub type PlaybackCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Trait for native duplex audio loops.
///
/// This trait allows swapping implementations (real audio server vs mock).
/// Every method runs on the bridge's loop thread, in the order
/// `open`, `register_capture`, `register_playback`, `run`, `close`.
pub trait NativeLoop: Send {
    /// Connect to the audio server with a fixed sample rate and block size.
    fn open(&mut self, sample_rate: u32, block_size: usize) -> Result<()>;

    fn register_capture(&mut self, callback: CaptureCallback) -> Result<()>;

    fn register_playback(&mut self, callback: PlaybackCallback) -> Result<()>;

    /// Run the loop until `stop` is requested.
    ///
    /// # Errors
    /// Backend failures that end the loop early.
    fn run(&mut self, stop: &StopSignal) -> Result<()>;

    /// Release backend resources and drop the registered callbacks.
    fn close(&mut self);

    fn name(&self) -> &str {
        "native-loop"
    }
}
