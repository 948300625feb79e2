//! Lifecycle and callbacks of the native loop bridge.

use crate::bridge::{
    BridgeConfig, BridgeStats, BridgeStatsSnapshot, CaptureCallback, ConsumeOutcome,
    HandoffSlot, NativeLoop, PlaybackCallback, PublishOutcome, StopSignal,
};
use crate::error::{Result, VoxError};
use crate::transform::{FailureKind, TransformFailure, TransformOutput, VoiceTransform};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};

/// Lifecycle state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Idle,
    Running,
    Stopping,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgeState::Idle => "idle",
            BridgeState::Running => "running",
            BridgeState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Condition detected inside a callback that ended the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FatalFault {
    BlockSizeMismatch { expected: usize, actual: usize },
}

impl From<FatalFault> for VoxError {
    fn from(fault: FatalFault) -> Self {
        match fault {
            FatalFault::BlockSizeMismatch { expected, actual } => {
                VoxError::BlockSizeMismatch { expected, actual }
            }
        }
    }
}

/// Snapshot returned by [`NativeLoopBridge::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub state: BridgeState,
    /// False when the loop thread has exited on its own while still Running.
    pub loop_alive: bool,
    pub pending_block: bool,
    pub stats: BridgeStatsSnapshot,
    pub fatal: Option<FatalFault>,
}

struct ActiveRun<L> {
    stop: StopSignal,
    handle: JoinHandle<(L, Result<()>)>,
    slot: Arc<HandoffSlot>,
    fault: Arc<OnceLock<FatalFault>>,
}

/// Everything the capture callback owns.
struct CaptureContext<T> {
    transform: Arc<T>,
    slot: Arc<HandoffSlot>,
    stats: Arc<BridgeStats>,
    failures: Sender<TransformFailure>,
    fault: Arc<OnceLock<FatalFault>>,
    stop: StopSignal,
    sample_rate: u32,
    block_size: usize,
}

/// Runs a native duplex loop on a background thread with the transform wired
/// between capture and playback.
///
/// `Idle → Running → Stopping → Idle`. The loop driver is moved onto the loop
/// thread by `start` and handed back by `stop`, so a bridge can be restarted.
/// A fresh handoff slot is allocated for every run and released only after the
/// loop thread has been joined.
///
/// The single slot holds one pending block. Cadence is only correct when the
/// native scheduler calls capture and playback at the same rate; a slow
/// transform shows up as playback underruns.
pub struct NativeLoopBridge<L: NativeLoop + 'static, T: VoiceTransform + 'static> {
    config: BridgeConfig,
    transform: Arc<T>,
    driver: Option<L>,
    run: Option<ActiveRun<L>>,
    state: BridgeState,
    stats: Arc<BridgeStats>,
    last_fault: Option<FatalFault>,
    failures_tx: Sender<TransformFailure>,
    failures_rx: Receiver<TransformFailure>,
}

impl<L: NativeLoop + 'static, T: VoiceTransform + 'static> NativeLoopBridge<L, T> {
    pub fn new(driver: L, transform: T, config: BridgeConfig) -> Self {
        let (failures_tx, failures_rx) = crossbeam_channel::bounded(config.failure_queue.max(1));
        Self {
            config,
            transform: Arc::new(transform),
            driver: Some(driver),
            run: None,
            state: BridgeState::Idle,
            stats: Arc::new(BridgeStats::new()),
            last_fault: None,
            failures_tx,
            failures_rx,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == BridgeState::Running
    }

    /// The loop driver while Idle. `None` while Running or after a loop panic.
    pub fn driver(&self) -> Option<&L> {
        self.driver.as_ref()
    }

    /// Weak handle to the current handoff slot.
    pub fn slot(&self) -> Option<Weak<HandoffSlot>> {
        self.run.as_ref().map(|run| Arc::downgrade(&run.slot))
    }

    /// Starts the loop. No-op when already running.
    ///
    /// # Errors
    /// The loop thread could not be spawned, or the driver was lost to an
    /// earlier panic. Backend failures inside the loop surface through `stop`.
    pub fn start(&mut self) -> Result<()> {
        if self.run.is_some() {
            tracing::debug!("Native loop bridge already running");
            return Ok(());
        }

        let mut driver = self.driver.take().ok_or_else(|| VoxError::NativeLoop {
            message: "loop driver was lost when the loop thread panicked".to_string(),
        })?;

        let slot = Arc::new(HandoffSlot::new(self.config.slot_capacity()));
        let stop = StopSignal::new();
        let fault = Arc::new(OnceLock::new());
        self.stats = Arc::new(BridgeStats::new());
        self.last_fault = None;

        let stale = self.failures_rx.len();
        if stale > 0 {
            tracing::debug!(stale, "Discarding undrained failures from the previous run");
        }
        let (failures_tx, failures_rx) =
            crossbeam_channel::bounded(self.config.failure_queue.max(1));
        self.failures_tx = failures_tx;
        self.failures_rx = failures_rx;

        let capture = capture_callback(CaptureContext {
            transform: Arc::clone(&self.transform),
            slot: Arc::clone(&slot),
            stats: Arc::clone(&self.stats),
            failures: self.failures_tx.clone(),
            fault: Arc::clone(&fault),
            stop: stop.clone(),
            sample_rate: self.config.sample_rate,
            block_size: self.config.native_block_size,
        });
        let playback = playback_callback(Arc::clone(&slot), Arc::clone(&self.stats));

        let sample_rate = self.config.sample_rate;
        let block_size = self.config.native_block_size;
        let loop_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("voxbridge-loop".to_string())
            .spawn(move || {
                let result =
                    run_driver(&mut driver, sample_rate, block_size, capture, playback, &loop_stop);
                driver.close();
                if let Err(e) = &result {
                    tracing::error!(
                        driver = driver.name(),
                        error = %e,
                        "Native loop exited with error"
                    );
                }
                (driver, result)
            })
            .map_err(|e| VoxError::NativeLoop {
                message: format!("Failed to spawn loop thread: {}", e),
            })?;

        tracing::info!(
            sample_rate,
            block_size,
            slot_capacity = slot.capacity(),
            "Native loop bridge started"
        );

        self.run = Some(ActiveRun {
            stop,
            handle,
            slot,
            fault,
        });
        self.state = BridgeState::Running;
        Ok(())
    }

    /// Stops the loop, joins its thread and releases the slot. No-op when idle.
    ///
    /// Any block in flight is dropped.
    ///
    /// # Errors
    /// A fatal condition detected in a callback (block size mismatch), a backend
    /// error that ended the loop, or a panic on the loop thread.
    pub fn stop(&mut self) -> Result<()> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };

        self.state = BridgeState::Stopping;
        run.stop.request();
        let joined = run.handle.join();
        self.state = BridgeState::Idle;

        let loop_result = match joined {
            Ok((driver, result)) => {
                self.driver = Some(driver);
                result
            }
            Err(panic_info) => {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic");
                Err(VoxError::LoopThreadPanicked {
                    message: msg.to_string(),
                })
            }
        };

        let stats = self.stats.snapshot();
        tracing::info!(
            captured = stats.captured_blocks,
            played = stats.played_blocks,
            underruns = stats.underruns,
            overruns = stats.overruns,
            truncations = stats.truncations,
            transform_failures = stats.transform_failures,
            "Native loop bridge stopped"
        );

        self.last_fault = run.fault.get().copied();
        if let Some(fault) = self.last_fault {
            tracing::error!(?fault, "Native loop aborted");
            return Err(fault.into());
        }
        loop_result
    }

    /// Current state, counters and any fatal condition.
    pub fn status(&self) -> BridgeStatus {
        let (loop_alive, pending_block, fatal) = match &self.run {
            Some(run) => (
                !run.handle.is_finished(),
                run.slot.has_data(),
                run.fault.get().copied(),
            ),
            None => (false, false, self.last_fault),
        };
        BridgeStatus {
            state: self.state,
            loop_alive,
            pending_block,
            stats: self.stats.snapshot(),
            fatal,
        }
    }

    /// Fatal condition of the current or last run, as an error.
    pub fn fatal_error(&self) -> Option<VoxError> {
        self.status().fatal.map(VoxError::from)
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Takes the transform failures reported by the capture callback during the
    /// current or last run. Failures not drained before the next `start` are
    /// discarded along with that run's counters.
    pub fn drain_failures(&self) -> Vec<TransformFailure> {
        self.failures_rx.try_iter().collect()
    }
}

impl<L: NativeLoop + 'static, T: VoiceTransform + 'static> Drop for NativeLoopBridge<L, T> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "Native loop bridge stopped with error during drop");
        }
    }
}

fn run_driver<L: NativeLoop>(
    driver: &mut L,
    sample_rate: u32,
    block_size: usize,
    capture: CaptureCallback,
    playback: PlaybackCallback,
    stop: &StopSignal,
) -> Result<()> {
    driver.open(sample_rate, block_size)?;
    driver.register_capture(capture)?;
    driver.register_playback(playback)?;
    driver.run(stop)
}

fn capture_callback<T: VoiceTransform + 'static>(ctx: CaptureContext<T>) -> CaptureCallback {
    let silence = vec![0.0f32; ctx.block_size];

    Box::new(move |input: &[f32]| {
        if ctx.fault.get().is_some() {
            return;
        }
        if input.len() != ctx.block_size {
            ctx.fault.get_or_init(|| FatalFault::BlockSizeMismatch {
                expected: ctx.block_size,
                actual: input.len(),
            });
            ctx.stop.request();
            return;
        }

        ctx.stats.record_capture();
        let output = catch_unwind(AssertUnwindSafe(|| {
            ctx.transform.convert(input, ctx.sample_rate)
        }))
        .unwrap_or_else(|_| {
            TransformOutput::failed(FailureKind::Generic, "transform panicked in capture callback")
        });

        let block: &[f32] = match &output.failure {
            Some(failure) => {
                ctx.stats.record_transform_failure();
                if ctx.failures.try_send(failure.clone()).is_err() {
                    ctx.stats.record_dropped_failure_report();
                }
                &silence
            }
            None => &output.samples,
        };

        match ctx.slot.publish(block) {
            PublishOutcome::Stored {
                truncated,
                replaced,
                ..
            } => {
                if truncated > 0 {
                    ctx.stats.record_truncation(truncated);
                }
                if replaced {
                    ctx.stats.record_replaced();
                }
            }
            PublishOutcome::Dropped => ctx.stats.record_overrun(),
        }
    })
}

fn playback_callback(slot: Arc<HandoffSlot>, stats: Arc<BridgeStats>) -> PlaybackCallback {
    Box::new(move |out: &mut [f32]| match slot.consume(out) {
        ConsumeOutcome::Filled { .. } => stats.record_played(),
        ConsumeOutcome::Underrun => stats.record_underrun(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::PLAYBACK_MARKER;
    use crate::bridge::{LoopEvent, MockLoop};
    use crate::transform::{FnTransform, MockTransform};
    use std::time::{Duration, Instant};

    fn config(block: usize) -> BridgeConfig {
        BridgeConfig {
            sample_rate: 48000,
            native_block_size: block,
            slot_factor: 2,
            failure_queue: 4,
        }
    }

    /// Polls until `cond` holds or a generous deadline passes.
    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_playback_before_capture_is_silent() {
        let mock = MockLoop::new().with_script(vec![LoopEvent::Playback(4)]);
        let log = mock.playback_log();
        let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() == 1));
        bridge.stop().unwrap();

        assert_eq!(log.blocks(), vec![vec![0.0; 4]]);
        assert_eq!(bridge.stats().underruns, 1);
    }

    #[test]
    fn test_capture_flows_to_playback() {
        let mock = MockLoop::new().with_script(vec![
            LoopEvent::Capture(vec![0.5; 4]),
            LoopEvent::Playback(4),
            LoopEvent::Playback(4),
        ]);
        let log = mock.playback_log();
        let mut bridge =
            NativeLoopBridge::new(mock, MockTransform::new().with_gain(2.0), config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() == 2));
        bridge.stop().unwrap();

        assert_eq!(log.blocks(), vec![vec![1.0; 4], vec![0.0; 4]]);
        let stats = bridge.stats();
        assert_eq!(stats.captured_blocks, 1);
        assert_eq!(stats.played_blocks, 1);
        assert_eq!(stats.underruns, 1);
    }

    #[test]
    fn test_short_output_is_zero_padded() {
        let mock = MockLoop::new().with_script(vec![
            LoopEvent::Capture(vec![0.25; 256]),
            LoopEvent::Playback(256),
        ]);
        let log = mock.playback_log();
        let transform = MockTransform::new().with_output_len(200);
        let mut bridge = NativeLoopBridge::new(mock, transform, config(256));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() == 1));
        bridge.stop().unwrap();

        let block = &log.blocks()[0];
        assert_eq!(block.len(), 256);
        assert!(block[..200].iter().all(|&s| s == 0.25));
        assert!(block[200..].iter().all(|&s| s == 0.0));
        assert!(!block.contains(&PLAYBACK_MARKER));
    }

    #[test]
    fn test_oversized_output_is_truncated_and_counted() {
        let mock = MockLoop::new().with_script(vec![
            LoopEvent::Capture(vec![0.1; 4]),
            LoopEvent::Playback(4),
        ]);
        let log = mock.playback_log();
        // Slot capacity is 8; the transform returns 20 samples.
        let transform = MockTransform::new().with_output_len(20);
        let mut bridge = NativeLoopBridge::new(mock, transform, config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() == 1));
        bridge.stop().unwrap();

        let stats = bridge.stats();
        assert_eq!(stats.truncations, 1);
        assert_eq!(stats.truncated_samples, 12);
        assert_eq!(log.blocks()[0].len(), 4);
    }

    #[test]
    fn test_transform_failure_plays_silence_and_is_reported() {
        let mock = MockLoop::new().with_script(vec![
            LoopEvent::Capture(vec![0.9; 4]),
            LoopEvent::Playback(4),
        ]);
        let log = mock.playback_log();
        let transform = MockTransform::new().with_failure(FailureKind::PipelineNotInitialized);
        let mut bridge = NativeLoopBridge::new(mock, transform, config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() == 1));
        bridge.stop().unwrap();

        assert_eq!(log.blocks(), vec![vec![0.0; 4]]);
        assert_eq!(bridge.stats().transform_failures, 1);
        let failures = bridge.drain_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::PipelineNotInitialized);
        assert!(bridge.drain_failures().is_empty());
    }

    #[test]
    fn test_full_failure_queue_drops_reports_without_blocking() {
        let script = (0..10).map(|_| LoopEvent::Capture(vec![0.0; 4])).collect();
        let mock = MockLoop::new().with_script(script);
        let transform = Arc::new(MockTransform::new().with_failure(FailureKind::Generic));
        let mut bridge = NativeLoopBridge::new(mock, Arc::clone(&transform), config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| transform.calls() == 10));
        bridge.stop().unwrap();

        let stats = bridge.stats();
        assert_eq!(stats.transform_failures, 10);
        assert_eq!(stats.dropped_failure_reports, 6);
        assert_eq!(bridge.drain_failures().len(), 4);
    }

    #[test]
    fn test_block_size_mismatch_aborts_loop() {
        let mock = MockLoop::new().with_script(vec![LoopEvent::Capture(vec![0.0; 3])]);
        let transform = Arc::new(MockTransform::new());
        let mut bridge = NativeLoopBridge::new(mock, Arc::clone(&transform), config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| !bridge.status().loop_alive));

        let status = bridge.status();
        assert_eq!(status.state, BridgeState::Running);
        assert_eq!(
            status.fatal,
            Some(FatalFault::BlockSizeMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(bridge.fatal_error().is_some());

        let err = bridge.stop().unwrap_err();
        assert!(matches!(
            err,
            VoxError::BlockSizeMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert_eq!(transform.calls(), 0);
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert!(bridge.status().fatal.is_some());
    }

    #[test]
    fn test_start_then_stop_releases_slot() {
        let mut bridge = NativeLoopBridge::new(MockLoop::new(), MockTransform::new(), config(64));

        bridge.start().unwrap();
        let slot = bridge.slot().unwrap();
        assert!(slot.upgrade().is_some());

        bridge.stop().unwrap();
        assert!(slot.upgrade().is_none());
        assert!(bridge.slot().is_none());

        let driver = bridge.driver().unwrap();
        assert!(!driver.has_callbacks());
        assert_eq!(driver.closes(), 1);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut bridge = NativeLoopBridge::new(MockLoop::new(), MockTransform::new(), config(8));

        bridge.stop().unwrap();
        assert_eq!(bridge.state(), BridgeState::Idle);

        bridge.start().unwrap();
        bridge.start().unwrap();
        assert!(bridge.is_running());

        bridge.stop().unwrap();
        bridge.stop().unwrap();
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert_eq!(bridge.driver().unwrap().runs(), 1);
    }

    #[test]
    fn test_bridge_can_restart() {
        let mock = MockLoop::new().with_script(vec![LoopEvent::Capture(vec![0.0; 8])]);
        let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), config(8));

        for round in 1..=3 {
            bridge.start().unwrap();
            assert!(wait_for(|| bridge.stats().captured_blocks == 1));
            bridge.stop().unwrap();
            assert_eq!(bridge.driver().unwrap().runs(), round);
        }
        assert_eq!(bridge.driver().unwrap().opened_with(), Some((48000, 8)));
    }

    #[test]
    fn test_panicking_transform_plays_silence_and_keeps_running() {
        let mock = MockLoop::new().with_script(vec![
            LoopEvent::Capture(vec![0.4; 4]),
            LoopEvent::Playback(4),
        ]);
        let log = mock.playback_log();
        let transform = FnTransform::new("exploding", |_: &[f32], _: u32| -> TransformOutput {
            panic!("model exploded")
        });
        let mut bridge = NativeLoopBridge::new(mock, transform, config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() == 1));
        assert!(bridge.status().loop_alive);
        assert!(bridge.stop().is_ok());

        assert_eq!(log.blocks(), vec![vec![0.0; 4]]);
        let failures = bridge.drain_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::Generic);
        assert_eq!(bridge.stats().transform_failures, 1);
    }

    #[test]
    fn test_restart_discards_previous_run_failures() {
        let mock = MockLoop::new().with_script(vec![LoopEvent::Capture(vec![0.0; 4])]);
        let transform =
            Arc::new(MockTransform::new().with_failure_on_calls(FailureKind::Generic, &[0]));
        let mut bridge = NativeLoopBridge::new(mock, Arc::clone(&transform), config(4));

        bridge.start().unwrap();
        assert!(wait_for(|| bridge.stats().captured_blocks == 1));
        bridge.stop().unwrap();
        assert_eq!(bridge.stats().transform_failures, 1);

        bridge.start().unwrap();
        assert!(wait_for(|| bridge.stats().captured_blocks == 1));
        bridge.stop().unwrap();

        assert_eq!(transform.calls(), 2);
        assert_eq!(bridge.stats().transform_failures, 0);
        assert!(bridge.drain_failures().is_empty());
    }

    #[test]
    fn test_open_failure_surfaces_on_stop() {
        let mock = MockLoop::new().with_open_failure();
        let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), config(8));

        bridge.start().unwrap();
        let err = bridge.stop().unwrap_err();
        assert!(err.to_string().contains("mock open failure"));
        assert!(bridge.driver().is_some());
    }

    #[test]
    fn test_loop_panic_is_reported_and_driver_lost() {
        let mock = MockLoop::new().with_run_panic();
        let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), config(8));

        bridge.start().unwrap();
        let err = bridge.stop().unwrap_err();
        assert!(matches!(err, VoxError::LoopThreadPanicked { .. }));
        assert!(err.to_string().contains("mock loop crashed"));

        assert!(bridge.start().is_err());
    }

    #[test]
    fn test_free_running_loop_stops_promptly() {
        let mock = MockLoop::new().with_free_run(vec![0.1; 16], Duration::from_millis(1));
        let log = mock.playback_log();
        let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), config(16));

        bridge.start().unwrap();
        assert!(wait_for(|| log.len() >= 5));
        bridge.stop().unwrap();

        let stats = bridge.stats();
        assert!(stats.captured_blocks >= 5);
        assert!(stats.played_blocks >= 1);
        for block in log.blocks() {
            assert!(block.iter().all(|&s| s == 0.1 || s == 0.0));
        }
    }

    #[test]
    fn test_status_serializes() {
        let bridge = NativeLoopBridge::new(MockLoop::new(), MockTransform::new(), config(8));
        let json = serde_json::to_value(bridge.status()).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["fatal"], serde_json::Value::Null);
    }

    #[test]
    fn test_drop_stops_running_loop() {
        let mut bridge = NativeLoopBridge::new(MockLoop::new(), MockTransform::new(), config(8));
        bridge.start().unwrap();
        let slot = bridge.slot().unwrap();
        drop(bridge);
        assert!(slot.upgrade().is_none());
    }
}
