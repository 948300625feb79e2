//! voxbridge - live audio through a block-based voice transform
//!
//! Two delivery surfaces share one transform contract:
//! - [`StreamBlockAdapter`]: arbitrary-chunked sample/byte streams in, fixed blocks
//!   to the transform, transformed stream out.
//! - [`NativeLoopBridge`]: a duplex native audio loop with the transform in the
//!   capture callback and a single-slot handoff to playback.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod bridge;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod stream;
pub mod transform;

// Transform contract
pub use transform::{
    FailureKind, FailureReporter, GuardedTransform, PassThrough, TransformFailure,
    TransformOutput, VoiceChanger, VoiceTransform,
};

// Surfaces
pub use bridge::{BridgeConfig, BridgeState, BridgeStatus, NativeLoop, NativeLoopBridge};
pub use stream::{StreamBlockAdapter, StreamConfig, StreamFilter};

// Error handling
pub use error::{Result, VoxError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
