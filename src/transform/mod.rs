//! The block transform contract shared by the stream adapter and the native loop bridge.
//!
//! A transform maps one fixed-size block of mono f32 samples to an output block of
//! any length, plus an activity level, a small timing record and an optional
//! failure descriptor. Transforms report failures in-band instead of returning
//! `Err`, so callers on audio threads can always keep going.

pub mod guarded;
pub mod mock;
pub mod passthrough;
pub mod report;

pub use guarded::{ChangerOutput, GuardConfig, GuardedTransform, VoiceChanger};
pub use mock::MockTransform;
pub use passthrough::PassThrough;
pub use report::{CollectingReporter, FailureReporter, LogReporter};

use crate::defaults::TIMING_SLOTS;
use crate::error::VoxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Per-block performance timings reported by the transform (milliseconds).
pub type Timings = [u32; TIMING_SLOTS];

/// Category of a per-block transform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// No voice changer model has been selected.
    ChangerNotSelected,
    /// The model is selected but its pipeline has not been built yet.
    PipelineNotInitialized,
    /// Anything else, including panics inside the transform.
    Generic,
}

impl FailureKind {
    /// Stable wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ChangerNotSelected => "changer-not-selected",
            FailureKind::PipelineNotInitialized => "pipeline-not-initialized",
            FailureKind::Generic => "generic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&VoxError> for FailureKind {
    fn from(error: &VoxError) -> Self {
        match error {
            VoxError::ChangerNotSelected => FailureKind::ChangerNotSelected,
            VoxError::PipelineNotInitialized => FailureKind::PipelineNotInitialized,
            _ => FailureKind::Generic,
        }
    }
}

/// Failure descriptor forwarded out-of-band to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl TransformFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TransformFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl From<&VoxError> for TransformFailure {
    fn from(error: &VoxError) -> Self {
        Self::new(FailureKind::from(error), error.to_string())
    }
}

/// Result of one transform invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub samples: Vec<f32>,
    /// Volume/activity metric of the block.
    pub activity: f32,
    pub timings: Timings,
    pub failure: Option<TransformFailure>,
}

impl TransformOutput {
    /// Successful output.
    pub fn ok(samples: Vec<f32>, activity: f32, timings: Timings) -> Self {
        Self {
            samples,
            activity,
            timings,
            failure: None,
        }
    }

    /// Failed output carrying a single silent sample.
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            samples: vec![0.0],
            activity: 0.0,
            timings: [0; TIMING_SLOTS],
            failure: Some(TransformFailure::new(kind, detail)),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Block-based voice transform.
///
/// Implementations must tolerate being called from a real-time audio thread: they
/// may be slow, but must not panic out or block on the caller's control thread.
pub trait VoiceTransform: Send + Sync {
    /// Convert one input block recorded at `sample_rate`.
    fn convert(&self, input: &[f32], sample_rate: u32) -> TransformOutput;

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "transform"
    }
}

/// Implement VoiceTransform for Arc<T> so one transform can feed several surfaces.
impl<T: VoiceTransform + ?Sized> VoiceTransform for Arc<T> {
    fn convert(&self, input: &[f32], sample_rate: u32) -> TransformOutput {
        (**self).convert(input, sample_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapts a plain closure to [`VoiceTransform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&[f32], u32) -> TransformOutput + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> VoiceTransform for FnTransform<F>
where
    F: Fn(&[f32], u32) -> TransformOutput + Send + Sync,
{
    fn convert(&self, input: &[f32], sample_rate: u32) -> TransformOutput {
        (self.f)(input, sample_rate)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Root mean square of a block. Empty blocks are silent.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Convert a dBFS level to linear amplitude.
pub fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
