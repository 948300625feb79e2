//! Error types for voxbridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Transform errors
    #[error("Voice changer is not selected")]
    ChangerNotSelected,

    #[error("Voice conversion pipeline is not initialized")]
    PipelineNotInitialized,

    #[error("Transform failed: {message}")]
    Transform { message: String },

    // Stream transport errors
    #[error("Stream source error: {message}")]
    StreamSource { message: String },

    #[error("WAV error: {message}")]
    Wav { message: String },

    // Native loop errors
    #[error("Native block size mismatch: expected {expected} samples, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },

    #[error("Native loop error: {message}")]
    NativeLoop { message: String },

    #[error("Native loop thread panicked: {message}")]
    LoopThreadPanicked { message: String },

    // Audio backend errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio backend error: {message}")]
    AudioBackend { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxError>;
