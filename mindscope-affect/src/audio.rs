//! Mono waveforms: WAV decoding, encoding and linear resampling.

use std::io::Cursor;
use std::path::Path;

use crate::error::{AffectError, Result};

/// Sample rate the voice classifier expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono PCM samples in `[-1, 1]` with their sample rate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Waveform {
    /// Samples, one per tick.
    pub samples: Vec<f32>,
    /// Ticks per second.
    pub sample_rate: u32,
}

impl Waveform {
    /// Wrap samples at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds, 0 for a zero sample rate.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// This waveform at `rate`, linearly interpolated.
    pub fn resampled(&self, rate: u32) -> Waveform {
        Waveform::new(resample_linear(&self.samples, self.sample_rate, rate), rate)
    }

    /// Encode as 16-bit PCM WAV bytes.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
            for sample in &self.samples {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
            }
            writer.finalize()?;
        }
        Ok(buffer.into_inner())
    }
}

/// Load a WAV file as a mono waveform at its native rate.
///
/// Multi-channel audio is averaged to mono.
pub fn load_wav(path: &Path) -> Result<Waveform> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| AffectError::Audio(format!("failed to open {}: {e}", path.display())))?;
    decode(reader)
}

/// Decode WAV bytes held in memory.
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<Waveform> {
    decode(hound::WavReader::new(Cursor::new(bytes))?)
}

fn decode<R: std::io::Read>(reader: hound::WavReader<R>) -> Result<Waveform> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        hound::SampleFormat::Float => {
            reader.into_samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = if channels > 1 {
        raw.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
    } else {
        raw
    };
    Ok(Waveform::new(mono, spec.sample_rate))
}

/// Simple linear interpolation resampling.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}
