//! Identity transform used when voice conversion is bypassed.

use crate::defaults::TIMING_SLOTS;
use crate::transform::{TransformOutput, VoiceTransform, rms};

/// Returns the input block unchanged, with its RMS as the activity level.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl VoiceTransform for PassThrough {
    fn convert(&self, input: &[f32], _sample_rate: u32) -> TransformOutput {
        TransformOutput::ok(input.to_vec(), rms(input), [0; TIMING_SLOTS])
    }

    fn name(&self) -> &str {
        "pass-through"
    }
}
