use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use voxbridge::cli::{Cli, Commands, ConfigAction};
use voxbridge::config::Config;
use voxbridge::stream::wav::{read_wav_mono, write_wav_mono};
use voxbridge::stream::{
    ByteSource, ReaderSource, StreamBlockAdapter, StreamConfig, StreamFilter, bytes_to_samples,
    samples_to_bytes,
};
use voxbridge::transform::PassThrough;

/// Bytes pulled from the source per filter read.
const FILTER_CHUNK_BYTES: usize = 16 * 1024;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!(version = %voxbridge::version_string(), "voxbridge starting");

    match cli.command {
        Commands::Filter { input, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_filter(&config, &input, &output)?;
        }
        #[cfg(feature = "cpal-audio")]
        Commands::Loopback { duration } => {
            let config = load_config(cli.config.as_deref())?;
            run_loopback(&config, duration)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "voxbridge", &mut io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(quiet: bool, verbose: u8) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("voxbridge: failed to initialize logging: {e}");
    }
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()?)?,
    }
    .with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn config_path(custom_path: Option<&Path>) -> Result<PathBuf> {
    match custom_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::default_path()?),
    }
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            let rendered = toml::to_string_pretty(&config).context("render configuration")?;
            print!("{}", rendered);
        }
        ConfigAction::Path => {
            println!("{}", config_path(custom_path)?.display());
        }
    }
    Ok(())
}

/// The binary always runs the pass-through transform, so `[processing]` has
/// no effect here.
fn note_unused_processing(config: &Config) {
    let keys = config.customized_processing_keys();
    if !keys.is_empty() {
        tracing::info!(
            keys = %keys.join(", "),
            "Processing settings apply to GuardedTransform in library use; \
             this command runs the pass-through transform"
        );
    }
}

/// Offline run of the stream adapter with the pass-through transform.
fn run_filter(config: &Config, input: &str, output: &str) -> Result<()> {
    note_unused_processing(config);
    let mut stream_config = config.stream_config();

    let output_bytes = if input == "-" {
        filter_to(ReaderSource::new(io::stdin()), &stream_config, output)?
    } else {
        let file = File::open(input).with_context(|| format!("open {}", input))?;
        let clip = read_wav_mono(io::BufReader::new(file))?;
        if clip.sample_rate != stream_config.sample_rate {
            tracing::warn!(
                file_rate = clip.sample_rate,
                configured_rate = stream_config.sample_rate,
                "WAV sample rate differs from configuration; using the file's rate"
            );
            stream_config.sample_rate = clip.sample_rate;
        }
        let source = ReaderSource::new(Cursor::new(samples_to_bytes(&clip.samples)));
        filter_to(source, &stream_config, output)?
    };

    if let Some(bytes) = output_bytes {
        let file = File::create(output).with_context(|| format!("create {}", output))?;
        write_wav_mono(
            BufWriter::new(file),
            &bytes_to_samples(&bytes),
            stream_config.sample_rate,
        )?;
    }
    Ok(())
}

/// Pumps `source` through the adapter. Raw output goes straight to stdout when
/// `output` is "-"; otherwise the bytes are returned for the WAV writer.
fn filter_to<S: ByteSource>(
    source: S,
    stream_config: &StreamConfig,
    output: &str,
) -> Result<Option<Vec<u8>>> {
    let adapter = StreamBlockAdapter::new(PassThrough, stream_config.clone());
    let mut filter = StreamFilter::new(source, adapter);
    let poll = Duration::from_millis(5);

    let (summary, collected) = if output == "-" {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        (filter.pump(&mut out, FILTER_CHUNK_BYTES, poll)?, None)
    } else {
        let mut buffer = Vec::new();
        (
            filter.pump(&mut buffer, FILTER_CHUNK_BYTES, poll)?,
            Some(buffer),
        )
    };

    tracing::info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        leftover_samples = summary.leftover_samples,
        blocks = filter.adapter().stats().blocks_processed,
        "Filter finished"
    );
    if summary.leftover_samples > 0 {
        eprintln!(
            "voxbridge: {} trailing sample(s) did not fill a block of {} and were not processed",
            summary.leftover_samples, stream_config.block_size
        );
    }
    io::stderr().flush().ok();
    Ok(collected)
}

#[cfg(feature = "cpal-audio")]
fn run_loopback(config: &Config, duration: Option<Duration>) -> Result<()> {
    use voxbridge::bridge::{CpalDuplexLoop, NativeLoopBridge};

    note_unused_processing(config);

    let driver = CpalDuplexLoop::new(
        config.audio.input_device.clone(),
        config.audio.output_device.clone(),
    );
    let bridge_config = config.bridge_config();
    let block_ms = voxbridge::defaults::block_duration_ms(
        bridge_config.native_block_size,
        bridge_config.sample_rate,
    );
    let mut bridge = NativeLoopBridge::new(driver, PassThrough, bridge_config);
    bridge.start()?;

    match duration {
        Some(limit) => {
            eprintln!(
                "voxbridge: looping for {} ({:.1} ms blocks)",
                humantime::format_duration(limit),
                block_ms
            );
            let deadline = std::time::Instant::now() + limit;
            while std::time::Instant::now() < deadline && bridge.status().loop_alive {
                std::thread::sleep(Duration::from_millis(100));
            }
        }
        None => {
            eprintln!("voxbridge: looping ({:.1} ms blocks), press Enter to stop", block_ms);
            let mut line = String::new();
            io::stdin().read_line(&mut line).context("read stdin")?;
        }
    }

    let result = bridge.stop();
    for failure in bridge.drain_failures() {
        tracing::warn!(%failure, "Transform failure during loopback");
    }
    println!("{}", serde_json::to_string_pretty(&bridge.stats())?);
    result?;
    Ok(())
}
