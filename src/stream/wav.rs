//! Mono WAV files in and out of the f32 sample domain.

use crate::error::{Result, VoxError};
use std::io::{Read, Seek, Write};

/// Mono clip read from a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Reads a mono WAV file as f32 samples.
///
/// Float files are taken as-is; 16-bit integer files are scaled into [-1, 1).
/// Anything with more than one channel is rejected: there is no channel mixing.
pub fn read_wav_mono<R: Read>(reader: R) -> Result<MonoClip> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| VoxError::Wav {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.channels != 1 {
        return Err(VoxError::Wav {
            message: format!("expected 1 channel, got {}", spec.channels),
        });
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        (hound::SampleFormat::Int, 16) => wav_reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<_>, _>>(),
        (format, bits) => {
            return Err(VoxError::Wav {
                message: format!("unsupported sample format {:?} with {} bits", format, bits),
            });
        }
    }
    .map_err(|e| VoxError::Wav {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    Ok(MonoClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Writes f32 samples as a mono 32-bit float WAV file.
pub fn write_wav_mono<W: Write + Seek>(writer: W, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let wav_err = |e: hound::Error| VoxError::Wav {
        message: format!("Failed to write WAV file: {}", e),
    };

    let mut wav_writer = hound::WavWriter::new(writer, spec).map_err(wav_err)?;
    for &sample in samples {
        wav_writer.write_sample(sample).map_err(wav_err)?;
    }
    wav_writer.finalize().map_err(wav_err)
}
