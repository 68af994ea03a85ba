//! Audio decoding into analysis-ready mono waveforms.

mod decode;
mod downmix;

use std::path::PathBuf;

use thiserror::Error;

pub use decode::{decode_bytes, decode_file};

/// Errors raised while turning raw audio into an [`AudioSample`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The decoded stream contained no samples.
    #[error("Audio contains no samples")]
    Empty,
    /// The stream reported a zero or missing sample rate.
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    /// A decoded amplitude was NaN or infinite.
    #[error("Non-finite sample at index {index}")]
    NonFiniteSample { index: usize },
    /// The container had no decodable audio track.
    #[error("No decodable audio track")]
    MissingTrack,
    /// Reading the audio file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// WAV parsing failed.
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),
    /// Container probing or packet decoding failed.
    #[error("Audio decode failed: {0}")]
    Container(#[from] symphonia::core::errors::Error),
}

/// Decoded mono waveform with its sample rate.
///
/// Always holds at least one finite sample and a positive sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSample {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSample {
    /// Build a sample from mono amplitudes, validating the waveform.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(DecodeError::NonFiniteSample { index });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build a sample from interleaved multi-channel audio by averaging channels.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        if let Some(index) = interleaved.iter().position(|s| !s.is_finite()) {
            return Err(DecodeError::NonFiniteSample { index });
        }
        let mut mono = Vec::new();
        downmix::downmix_to_mono_into(&mut mono, interleaved, channels);
        Self::new(mono, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}
