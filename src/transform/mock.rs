//! Scriptable transform for tests and benchmarks.

use crate::defaults::TIMING_SLOTS;
use crate::transform::{FailureKind, TransformOutput, VoiceTransform, rms};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock transform: scales the input by a gain, optionally resizes the output,
/// and fails on chosen calls.
#[derive(Debug)]
pub struct MockTransform {
    gain: f32,
    output_len: Option<usize>,
    failure: Option<FailureKind>,
    fail_on_calls: HashSet<usize>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockTransform {
    /// Identity transform: output equals input.
    pub fn new() -> Self {
        Self {
            gain: 1.0,
            output_len: None,
            failure: None,
            fail_on_calls: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Multiply every sample by `gain`
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Truncate or zero-pad every output to `len` samples
    pub fn with_output_len(mut self, len: usize) -> Self {
        self.output_len = Some(len);
        self
    }

    /// Fail every call with `kind`
    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    /// Fail only the given calls (0-based) with `kind`
    pub fn with_failure_on_calls(mut self, kind: FailureKind, calls: &[usize]) -> Self {
        self.failure = Some(kind);
        self.fail_on_calls = calls.iter().copied().collect();
        self
    }

    /// Sleep for `delay` on every call, simulating an overloaded model
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `convert` has been called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn should_fail(&self, call: usize) -> Option<FailureKind> {
        let kind = self.failure?;
        if self.fail_on_calls.is_empty() || self.fail_on_calls.contains(&call) {
            Some(kind)
        } else {
            None
        }
    }
}

impl Default for MockTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceTransform for MockTransform {
    fn convert(&self, input: &[f32], _sample_rate: u32) -> TransformOutput {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if let Some(kind) = self.should_fail(call) {
            return TransformOutput::failed(kind, format!("mock failure on call {call}"));
        }

        let mut samples: Vec<f32> = input.iter().map(|s| s * self.gain).collect();
        if let Some(len) = self.output_len {
            samples.resize(len, 0.0);
        }
        let activity = rms(&samples);
        TransformOutput::ok(samples, activity, [call as u32; TIMING_SLOTS])
    }

    fn name(&self) -> &str {
        "mock"
    }
}
