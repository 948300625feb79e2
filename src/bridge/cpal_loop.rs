//! Native loop on a pair of cpal input/output streams.

use crate::bridge::reblock::{CaptureReblocker, PlaybackReblocker};
use crate::bridge::{CaptureCallback, NativeLoop, PlaybackCallback, StopSignal};
use crate::error::{Result, VoxError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// Suppresses the ALSA/JACK noise cpal triggers while probing backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore fd 2. Safe as long as no
/// other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Input,
    Output,
}

/// Find a device by exact name, or the host default.
fn find_device(
    host: &cpal::Host,
    name: Option<&str>,
    direction: Direction,
) -> Result<cpal::Device> {
    let Some(name) = name else {
        let device = match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        };
        return device.ok_or_else(|| VoxError::AudioDeviceNotFound {
            device: "default".to_string(),
        });
    };

    let devices = match direction {
        Direction::Input => host.input_devices(),
        Direction::Output => host.output_devices(),
    }
    .map_err(|e| VoxError::AudioBackend {
        message: format!("Failed to enumerate devices: {}", e),
    })?;

    for device in devices {
        if let Ok(device_name) = device.name()
            && device_name == name
        {
            return Ok(device);
        }
    }
    Err(VoxError::AudioDeviceNotFound {
        device: name.to_string(),
    })
}

/// Duplex loop over cpal, for hosts without a block-synchronous audio server API.
///
/// cpal chooses its own buffer sizes, so device buffers are re-blocked into exact
/// native blocks before the registered callbacks see them. Capture and playback
/// run on separate device threads; the bridge's handoff slot absorbs the skew.
/// Streams are opened as f32 mono at the configured rate; nothing is resampled.
pub struct CpalDuplexLoop {
    input_device: Option<String>,
    output_device: Option<String>,
    sample_rate: u32,
    block_size: usize,
    capture: Option<CaptureCallback>,
    playback: Option<PlaybackCallback>,
}

impl CpalDuplexLoop {
    /// `None` selects the host's default device.
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
            sample_rate: 0,
            block_size: 0,
            capture: None,
            playback: None,
        }
    }

    fn stream_config(&self) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

impl NativeLoop for CpalDuplexLoop {
    fn open(&mut self, sample_rate: u32, block_size: usize) -> Result<()> {
        if sample_rate == 0 || block_size == 0 {
            return Err(VoxError::NativeLoop {
                message: format!(
                    "invalid stream parameters: {} Hz, {} samples per block",
                    sample_rate, block_size
                ),
            });
        }
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        Ok(())
    }

    fn register_capture(&mut self, callback: CaptureCallback) -> Result<()> {
        self.capture = Some(callback);
        Ok(())
    }

    fn register_playback(&mut self, callback: PlaybackCallback) -> Result<()> {
        self.playback = Some(callback);
        Ok(())
    }

    fn run(&mut self, stop: &StopSignal) -> Result<()> {
        let not_registered = |which: &str| VoxError::NativeLoop {
            message: format!("{} callback not registered", which),
        };
        let capture = self.capture.take().ok_or_else(|| not_registered("capture"))?;
        let playback = self.playback.take().ok_or_else(|| not_registered("playback"))?;

        let (input, output) = with_suppressed_stderr(|| {
            let host = cpal::default_host();
            let input = find_device(&host, self.input_device.as_deref(), Direction::Input)?;
            let output = find_device(&host, self.output_device.as_deref(), Direction::Output)?;
            Ok::<_, VoxError>((input, output))
        })?;

        let config = self.stream_config();
        let mut capture = CaptureReblocker::new(capture, self.block_size);
        let mut playback = PlaybackReblocker::new(playback, self.block_size);

        let input_stream = input
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| capture.push(data),
                |err| tracing::warn!(error = %err, "Audio input stream error"),
                None,
            )
            .map_err(|e| VoxError::AudioBackend {
                message: format!("Failed to build input stream: {}", e),
            })?;

        let output_stream = output
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| playback.fill(data),
                |err| tracing::warn!(error = %err, "Audio output stream error"),
                None,
            )
            .map_err(|e| VoxError::AudioBackend {
                message: format!("Failed to build output stream: {}", e),
            })?;

        output_stream.play().map_err(|e| VoxError::AudioBackend {
            message: format!("Failed to start output stream: {}", e),
        })?;
        input_stream.play().map_err(|e| VoxError::AudioBackend {
            message: format!("Failed to start input stream: {}", e),
        })?;

        tracing::info!(
            sample_rate = self.sample_rate,
            block_size = self.block_size,
            "cpal duplex loop running"
        );
        stop.wait();

        drop(input_stream);
        drop(output_stream);
        Ok(())
    }

    fn close(&mut self) {
        self.capture = None;
        self.playback = None;
    }

    fn name(&self) -> &str {
        "cpal"
    }
}
