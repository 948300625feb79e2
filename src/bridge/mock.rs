//! Scripted native loop for tests.

use crate::bridge::{CaptureCallback, NativeLoop, PlaybackCallback, StopSignal};
use crate::error::{Result, VoxError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One step of a [`MockLoop`] script.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// Invoke the capture callback with these samples.
    Capture(Vec<f32>),
    /// Invoke the playback callback with a buffer of this many samples.
    Playback(usize),
    /// Sleep on the loop thread.
    Pause(Duration),
}

/// Shared record of every buffer handed back by the playback callback.
#[derive(Debug, Clone, Default)]
pub struct PlaybackLog {
    blocks: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl PlaybackLog {
    pub fn blocks(&self) -> Vec<Vec<f32>> {
        match self.blocks.lock() {
            Ok(blocks) => blocks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.blocks.lock() {
            Ok(blocks) => blocks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, block: Vec<f32>) {
        match self.blocks.lock() {
            Ok(mut blocks) => blocks.push(block),
            Err(poisoned) => poisoned.into_inner().push(block),
        }
    }
}

/// Fake native loop driver.
///
/// `run` plays the script in order, then keeps cycling capture/playback with a
/// free-run block if one is configured, and otherwise idles until stopped.
/// Playback buffers are pre-filled with a marker value so tests can see that the
/// bridge overwrote every sample.
pub struct MockLoop {
    script: Vec<LoopEvent>,
    free_run: Option<(Vec<f32>, Duration)>,
    fail_open: bool,
    panic_in_run: bool,
    opened: Option<(u32, usize)>,
    capture: Option<CaptureCallback>,
    playback: Option<PlaybackCallback>,
    played: PlaybackLog,
    runs: usize,
    closes: usize,
}

/// Value playback buffers hold before the bridge fills them.
pub const PLAYBACK_MARKER: f32 = 7.0;

impl MockLoop {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            free_run: None,
            fail_open: false,
            panic_in_run: false,
            opened: None,
            capture: None,
            playback: None,
            played: PlaybackLog::default(),
            runs: 0,
            closes: 0,
        }
    }

    /// Events to replay on every `run`
    pub fn with_script(mut self, script: Vec<LoopEvent>) -> Self {
        self.script = script;
        self
    }

    /// After the script, alternate capture of `block` and playback of the same
    /// length every `period` until stopped
    pub fn with_free_run(mut self, block: Vec<f32>, period: Duration) -> Self {
        self.free_run = Some((block, period));
        self
    }

    /// Configure the mock to fail on open
    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Configure the mock to panic inside run
    pub fn with_run_panic(mut self) -> Self {
        self.panic_in_run = true;
        self
    }

    /// Handle to the playback record; stays valid while the loop runs elsewhere
    pub fn playback_log(&self) -> PlaybackLog {
        self.played.clone()
    }

    /// Sample rate and block size from the last `open`
    pub fn opened_with(&self) -> Option<(u32, usize)> {
        self.opened
    }

    pub fn has_callbacks(&self) -> bool {
        self.capture.is_some() || self.playback.is_some()
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn closes(&self) -> usize {
        self.closes
    }

    fn capture(&mut self, samples: &[f32]) {
        if let Some(callback) = self.capture.as_mut() {
            callback(samples);
        }
    }

    fn playback(&mut self, len: usize) {
        let mut buffer = vec![PLAYBACK_MARKER; len];
        if let Some(callback) = self.playback.as_mut() {
            callback(&mut buffer);
        }
        self.played.push(buffer);
    }
}

impl Default for MockLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeLoop for MockLoop {
    fn open(&mut self, sample_rate: u32, block_size: usize) -> Result<()> {
        if self.fail_open {
            return Err(VoxError::NativeLoop {
                message: "mock open failure".to_string(),
            });
        }
        self.opened = Some((sample_rate, block_size));
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
        self.runs += 1;
        if self.panic_in_run {
            panic!("mock loop crashed");
        }

        let script = self.script.clone();
        for event in script {
            if stop.is_requested() {
                return Ok(());
            }
            match event {
                LoopEvent::Capture(samples) => self.capture(&samples),
                LoopEvent::Playback(len) => self.playback(len),
                LoopEvent::Pause(duration) => std::thread::sleep(duration),
            }
        }

        match self.free_run.clone() {
            Some((block, period)) => {
                while !stop.wait_timeout(period) {
                    self.capture(&block);
                    self.playback(block.len());
                }
            }
            None => stop.wait(),
        }
        Ok(())
    }

    fn close(&mut self) {
        self.capture = None;
        self.playback = None;
        self.closes += 1;
    }

    fn name(&self) -> &str {
        "mock"
    }
}
