//! Out-of-band forwarding of transform failures.

use crate::transform::TransformFailure;
use std::sync::Mutex;

/// Trait for reporting transform failures.
pub trait FailureReporter: Send + Sync {
    /// Reports a failure observed by `source` (e.g. "stream", "bridge").
    fn report(&self, source: &str, failure: &TransformFailure);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, source: &str, failure: &TransformFailure) {
        tracing::warn!(
            source,
            kind = %failure.kind,
            detail = %failure.detail,
            "transform failed, substituting silence"
        );
    }
}

/// Reporter that keeps every failure for later inspection.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    failures: Mutex<Vec<(String, TransformFailure)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all collected failures, oldest first.
    pub fn take(&self) -> Vec<(String, TransformFailure)> {
        match self.failures.lock() {
            Ok(mut failures) => std::mem::take(&mut *failures),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        match self.failures.lock() {
            Ok(failures) => failures.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureReporter for CollectingReporter {
    fn report(&self, source: &str, failure: &TransformFailure) {
        let entry = (source.to_string(), failure.clone());
        match self.failures.lock() {
            Ok(mut failures) => failures.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
