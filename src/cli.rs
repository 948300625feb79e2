//! Command-line interface for voxbridge
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Live audio through a block-based voice transform
#[derive(Parser, Debug)]
#[command(
    name = "voxbridge",
    version,
    about = "Live audio through a block-based voice transform"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: info, -vv: debug, -vvv: trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run audio through the stream adapter with the pass-through transform
    Filter {
        /// Input: a mono WAV file, or "-" for raw f32le samples on stdin
        #[arg(short, long, value_name = "PATH", default_value = "-")]
        input: String,

        /// Output: a WAV file, or "-" for raw f32le samples on stdout
        #[arg(short, long, value_name = "PATH", default_value = "-")]
        output: String,
    },

    /// Run the duplex bridge on the default audio devices
    #[cfg(feature = "cpal-audio")]
    Loopback {
        /// Stop after this long (e.g. 30s, 5m). Default: until Enter is pressed
        #[arg(short, long, value_name = "DURATION", value_parser = parse_duration)]
        duration: Option<Duration>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    ///
    /// The `[processing]` section configures GuardedTransform for library users;
    /// the filter and loopback commands run the pass-through transform.
    Show,
    /// Print the default configuration file path
    Path,
}

/// Parse a duration string.
///
/// Supports bare numbers (seconds) and anything `humantime` accepts
/// (`30s`, `5m`, `1h30m`).
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_defaults_to_stdio() {
        let cli = Cli::try_parse_from(["voxbridge", "filter"]).unwrap();
        match cli.command {
            Commands::Filter { input, output } => {
                assert_eq!(input, "-");
                assert_eq!(output, "-");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_filter_paths() {
        let cli =
            Cli::try_parse_from(["voxbridge", "filter", "-i", "in.wav", "--output", "out.wav"])
                .unwrap();
        match cli.command {
            Commands::Filter { input, output } => {
                assert_eq!(input, "in.wav");
                assert_eq!(output, "out.wav");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "voxbridge",
            "config",
            "show",
            "-vv",
            "--config",
            "/tmp/voxbridge.toml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/voxbridge.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["voxbridge", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["voxbridge"]).is_err());
    }

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert!(parse_duration("soon").is_err());
    }

    #[cfg(feature = "cpal-audio")]
    #[test]
    fn test_parse_loopback_duration() {
        let cli = Cli::try_parse_from(["voxbridge", "loopback", "--duration", "2m"]).unwrap();
        match cli.command {
            Commands::Loopback { duration } => assert_eq!(duration, Some(Duration::from_secs(120))),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
