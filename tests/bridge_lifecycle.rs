//! Integration tests for the native loop bridge driven by the mock loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use voxbridge::bridge::{BridgeConfig, BridgeState, LoopEvent, MockLoop, NativeLoopBridge};
use voxbridge::config::Config;
use voxbridge::transform::{FailureKind, FnTransform, MockTransform, TransformOutput};
use voxbridge::VoxError;

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

fn config(block: usize) -> BridgeConfig {
    BridgeConfig {
        sample_rate: 48000,
        native_block_size: block,
        slot_factor: 2,
        failure_queue: 16,
    }
}

#[test]
fn capture_playback_cycles_deliver_transformed_blocks() {
    let mut script = Vec::new();
    for i in 0..8 {
        script.push(LoopEvent::Capture(vec![i as f32; 128]));
        script.push(LoopEvent::Playback(128));
    }
    let mock = MockLoop::new().with_script(script);
    let log = mock.playback_log();
    let transform = FnTransform::new("negate", |input: &[f32], _rate| {
        let samples: Vec<f32> = input.iter().map(|s| -s).collect();
        TransformOutput::ok(samples, 0.0, [0; 3])
    });
    let mut bridge = NativeLoopBridge::new(mock, transform, config(128));

    bridge.start().unwrap();
    assert!(wait_for(|| log.len() == 8));
    bridge.stop().unwrap();

    for (i, block) in log.blocks().iter().enumerate() {
        assert_eq!(block, &vec![-(i as f32); 128]);
    }
    let stats = bridge.stats();
    assert_eq!(stats.captured_blocks, 8);
    assert_eq!(stats.played_blocks, 8);
    assert_eq!(stats.underruns, 0);
}

#[test]
fn slow_transform_shows_up_as_underruns_not_stalls() {
    let mock = MockLoop::new().with_script(vec![
        LoopEvent::Playback(64),
        LoopEvent::Capture(vec![0.5; 64]),
        LoopEvent::Playback(64),
        LoopEvent::Playback(64),
    ]);
    let log = mock.playback_log();
    let transform = MockTransform::new().with_delay(Duration::from_millis(5));
    let mut bridge = NativeLoopBridge::new(mock, transform, config(64));

    bridge.start().unwrap();
    assert!(wait_for(|| log.len() == 3));
    bridge.stop().unwrap();

    let blocks = log.blocks();
    assert_eq!(blocks[0], vec![0.0; 64]);
    assert_eq!(blocks[1], vec![0.5; 64]);
    assert_eq!(blocks[2], vec![0.0; 64]);
    assert_eq!(bridge.stats().underruns, 2);
}

#[test]
fn repeated_start_stop_never_deadlocks() {
    let mock = MockLoop::new().with_free_run(vec![0.2; 32], Duration::from_micros(200));
    let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), config(32));

    for _ in 0..25 {
        bridge.start().unwrap();
        let slot = bridge.slot().unwrap();
        bridge.stop().unwrap();
        assert!(slot.upgrade().is_none());
        assert_eq!(bridge.state(), BridgeState::Idle);
    }
}

#[test]
fn mismatched_native_block_is_fatal_and_reported() {
    let mock = MockLoop::new().with_script(vec![
        LoopEvent::Capture(vec![0.0; 256]),
        LoopEvent::Capture(vec![0.0; 128]),
        LoopEvent::Capture(vec![0.0; 256]),
    ]);
    let transform = Arc::new(MockTransform::new());
    let mut bridge = NativeLoopBridge::new(mock, Arc::clone(&transform), config(256));

    bridge.start().unwrap();
    assert!(wait_for(|| bridge.fatal_error().is_some()));

    match bridge.stop() {
        Err(VoxError::BlockSizeMismatch { expected, actual }) => {
            assert_eq!(expected, 256);
            assert_eq!(actual, 128);
        }
        other => panic!("expected block size mismatch, got {:?}", other),
    }
    // Nothing after the bad block reached the transform.
    assert_eq!(transform.calls(), 1);

    // A fresh start clears the fault.
    bridge.start().unwrap();
    assert!(wait_for(|| bridge.fatal_error().is_some()));
    assert!(bridge.stop().is_err());
}

#[test]
fn failures_are_forwarded_out_of_band() {
    let script = (0..5).map(|_| LoopEvent::Capture(vec![0.3; 16])).collect();
    let mock = MockLoop::new().with_script(script);
    let transform = Arc::new(
        MockTransform::new().with_failure_on_calls(FailureKind::ChangerNotSelected, &[1, 3]),
    );
    let mut bridge = NativeLoopBridge::new(mock, Arc::clone(&transform), config(16));

    bridge.start().unwrap();
    assert!(wait_for(|| bridge.stats().captured_blocks == 5 && transform.calls() == 5));
    bridge.stop().unwrap();

    let failures = bridge.drain_failures();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.kind == FailureKind::ChangerNotSelected));
    assert_eq!(bridge.stats().transform_failures, 2);
}

#[test]
fn bridge_config_from_file_config() {
    let mut file_config = Config::default();
    file_config.audio.chunk_size = 2;
    file_config.bridge.native_block_size = Some(128);
    let bridge_config = file_config.bridge_config();

    let mock = MockLoop::new();
    let mut bridge = NativeLoopBridge::new(mock, MockTransform::new(), bridge_config);
    bridge.start().unwrap();
    bridge.stop().unwrap();

    assert_eq!(bridge.driver().unwrap().opened_with(), Some((48000, 128)));
}
