use crate::bridge::BridgeConfig;
use crate::defaults;
use crate::error::{Result, VoxError};
use crate::stream::StreamConfig;
use crate::transform::GuardConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub bridge: BridgeSection,
    pub processing: ProcessingConfig,
}

/// Audio format and device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Logical block size in units of 128 samples.
    pub chunk_size: u32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

/// Native loop bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeSection {
    /// Samples per native callback. Falls back to the logical block size.
    pub native_block_size: Option<usize>,
    pub slot_factor: usize,
    pub failure_queue: usize,
}

/// Voice processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    pub pass_through: bool,
    pub silent_threshold_db: i32,
    pub extra_convert_size: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_size: defaults::CHUNK_SIZE,
            input_device: None,
            output_device: None,
        }
    }
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            native_block_size: None,
            slot_factor: defaults::SLOT_FACTOR,
            failure_queue: defaults::FAILURE_QUEUE,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            pass_through: false,
            silent_threshold_db: defaults::SILENT_THRESHOLD_DB,
            extra_convert_size: defaults::EXTRA_CONVERT_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only a missing file yields defaults; invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXBRIDGE_SAMPLE_RATE → audio.sample_rate
    /// - VOXBRIDGE_CHUNK_SIZE → audio.chunk_size
    /// - VOXBRIDGE_INPUT_DEVICE → audio.input_device
    /// - VOXBRIDGE_OUTPUT_DEVICE → audio.output_device
    /// - VOXBRIDGE_PASS_THROUGH → processing.pass_through ("1"/"true")
    ///
    /// Empty or unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rate) = std::env::var("VOXBRIDGE_SAMPLE_RATE")
            && let Ok(rate) = rate.trim().parse::<u32>()
        {
            self.audio.sample_rate = rate;
        }

        if let Ok(chunk) = std::env::var("VOXBRIDGE_CHUNK_SIZE")
            && let Ok(chunk) = chunk.trim().parse::<u32>()
        {
            self.audio.chunk_size = chunk;
        }

        if let Ok(device) = std::env::var("VOXBRIDGE_INPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.input_device = Some(device);
        }

        if let Ok(device) = std::env::var("VOXBRIDGE_OUTPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.output_device = Some(device);
        }

        if let Ok(flag) = std::env::var("VOXBRIDGE_PASS_THROUGH") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.processing.pass_through = true,
                "0" | "false" | "no" | "off" => self.processing.pass_through = false,
                _ => {}
            }
        }

        self
    }

    /// Check value ranges. Components assume a validated config.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if !(defaults::MIN_CHUNK_SIZE..=defaults::MAX_CHUNK_SIZE).contains(&self.audio.chunk_size)
        {
            return Err(invalid(
                "audio.chunk_size",
                &format!(
                    "must be between {} and {}",
                    defaults::MIN_CHUNK_SIZE,
                    defaults::MAX_CHUNK_SIZE
                ),
            ));
        }
        if self.bridge.native_block_size == Some(0) {
            return Err(invalid("bridge.native_block_size", "must be positive"));
        }
        if self.bridge.slot_factor < defaults::SLOT_FACTOR {
            return Err(invalid(
                "bridge.slot_factor",
                &format!("must be at least {}", defaults::SLOT_FACTOR),
            ));
        }
        if self.bridge.failure_queue == 0 {
            return Err(invalid("bridge.failure_queue", "must be positive"));
        }
        if !(defaults::MIN_SILENT_THRESHOLD_DB..=defaults::MAX_SILENT_THRESHOLD_DB)
            .contains(&self.processing.silent_threshold_db)
        {
            return Err(invalid(
                "processing.silent_threshold_db",
                &format!(
                    "must be between {} and {}",
                    defaults::MIN_SILENT_THRESHOLD_DB,
                    defaults::MAX_SILENT_THRESHOLD_DB
                ),
            ));
        }
        if !(0.1..=5.0).contains(&self.processing.extra_convert_size) {
            return Err(invalid(
                "processing.extra_convert_size",
                "must be between 0.1 and 5.0",
            ));
        }
        Ok(())
    }

    /// Logical transform block size in samples.
    pub fn block_samples(&self) -> usize {
        defaults::block_samples(self.audio.chunk_size)
    }

    /// Plain config for the stream adapter.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.audio.sample_rate,
            block_size: self.block_samples(),
        }
    }

    /// Plain config for the native loop bridge.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            sample_rate: self.audio.sample_rate,
            native_block_size: self
                .bridge
                .native_block_size
                .unwrap_or_else(|| self.block_samples()),
            slot_factor: self.bridge.slot_factor,
            failure_queue: self.bridge.failure_queue,
        }
    }

    /// Plain config for the guarded transform.
    ///
    /// Only library users wrapping a model in `GuardedTransform` read this; the
    /// binary's commands run the pass-through transform.
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            pass_through: self.processing.pass_through,
            silent_threshold_db: self.processing.silent_threshold_db,
            extra_convert_size: self.processing.extra_convert_size,
        }
    }

    /// `[processing]` keys set to something other than their default.
    pub fn customized_processing_keys(&self) -> Vec<&'static str> {
        let defaults = ProcessingConfig::default();
        let mut keys = Vec::new();
        if self.processing.pass_through != defaults.pass_through {
            keys.push("processing.pass_through");
        }
        if self.processing.silent_threshold_db != defaults.silent_threshold_db {
            keys.push("processing.silent_threshold_db");
        }
        if self.processing.extra_convert_size != defaults.extra_convert_size {
            keys.push("processing.extra_convert_size");
        }
        keys
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxbridge/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("voxbridge").join("config.toml"))
            .ok_or_else(|| VoxError::Other("Could not determine config directory".to_string()))
    }
}

fn invalid(key: &str, message: &str) -> VoxError {
    VoxError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
