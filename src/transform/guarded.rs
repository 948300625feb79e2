//! Adapter from a fallible voice changer model to the infallible transform contract.
//!
//! The model side reports problems as `Err` (or even panics); [`GuardedTransform`]
//! turns every one of them into a failure descriptor with a silent output so the
//! audio path never sees an error.

use crate::defaults;
use crate::error::{Result, VoxError};
use crate::transform::{
    FailureKind, PassThrough, Timings, TransformFailure, TransformOutput, VoiceTransform,
    db_to_amplitude, rms,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Output of one successful voice changer request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangerOutput {
    pub samples: Vec<f32>,
    pub activity: f32,
    pub timings: Timings,
}

/// Settings handed to the voice changer and the guard around it.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    pub pass_through: bool,
    /// Input level in dBFS below which the changer is skipped.
    pub silent_threshold_db: i32,
    /// Seconds of history the changer should convert alongside each block.
    pub extra_convert_size: f32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            pass_through: false,
            silent_threshold_db: defaults::SILENT_THRESHOLD_DB,
            extra_convert_size: defaults::EXTRA_CONVERT_SIZE,
        }
    }
}

/// Trait for the model-side voice changer.
///
/// This trait allows swapping implementations (real inference vs mock).
pub trait VoiceChanger: Send {
    /// Convert one block of input samples.
    ///
    /// # Errors
    /// `VoxError::ChangerNotSelected` / `VoxError::PipelineNotInitialized` when the
    /// model is not ready; anything else for inference failures.
    fn on_request(&mut self, input: &[f32]) -> Result<ChangerOutput>;

    /// Receive processing settings. Called once when the guard is built.
    fn apply_settings(&mut self, _settings: &GuardConfig) {}

    /// Name of the loaded model
    fn name(&self) -> &str {
        "voice-changer"
    }
}

/// Wraps a [`VoiceChanger`] so it satisfies [`VoiceTransform`].
///
/// Access to the changer is serialized through a mutex; it is only ever taken by
/// the thread running the transform.
pub struct GuardedTransform<C: VoiceChanger> {
    changer: Mutex<C>,
    name: String,
    pass_through: AtomicBool,
    gate: f32,
}

impl<C: VoiceChanger> GuardedTransform<C> {
    pub fn new(mut changer: C, config: GuardConfig) -> Self {
        changer.apply_settings(&config);
        let gate = if config.silent_threshold_db <= defaults::MIN_SILENT_THRESHOLD_DB {
            0.0
        } else {
            db_to_amplitude(config.silent_threshold_db as f32)
        };
        Self {
            name: changer.name().to_string(),
            changer: Mutex::new(changer),
            pass_through: AtomicBool::new(config.pass_through),
            gate,
        }
    }

    /// Toggle pass-through at runtime.
    pub fn set_pass_through(&self, enabled: bool) {
        self.pass_through.store(enabled, Ordering::Relaxed);
    }

    pub fn is_pass_through(&self) -> bool {
        self.pass_through.load(Ordering::Relaxed)
    }

    fn request(&self, input: &[f32]) -> std::result::Result<ChangerOutput, TransformFailure> {
        let Ok(mut changer) = self.changer.lock() else {
            return Err(TransformFailure::new(
                FailureKind::Generic,
                "voice changer state poisoned by an earlier panic",
            ));
        };

        match catch_unwind(AssertUnwindSafe(|| changer.on_request(input))) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(TransformFailure::from(&e)),
            Err(panic_info) => {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic");
                Err(TransformFailure::from(&VoxError::Transform {
                    message: format!("voice changer panicked: {msg}"),
                }))
            }
        }
    }
}

impl<C: VoiceChanger> VoiceTransform for GuardedTransform<C> {
    fn convert(&self, input: &[f32], sample_rate: u32) -> TransformOutput {
        if self.is_pass_through() {
            return PassThrough.convert(input, sample_rate);
        }

        let level = rms(input);
        if level < self.gate {
            return TransformOutput::ok(
                vec![0.0; input.len()],
                level,
                [0; defaults::TIMING_SLOTS],
            );
        }

        match self.request(input) {
            Ok(out) => TransformOutput::ok(out.samples, out.activity, out.timings),
            Err(failure) => TransformOutput::failed(failure.kind, failure.detail),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
