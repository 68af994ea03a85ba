use rand::Rng;
use thiserror::Error;
use tracing::debug;

use super::audio::{AudioSample, DecodeError};
use super::descriptor::{DescriptorSet, MoodProxies, PitchClass};
use super::fft::FftError;
use super::frequency_domain::{STFT_FRAME_SIZE, STFT_HOP_SIZE, extract_spectral_summary};
use super::rhythm::analyze_rhythm;
use super::time_domain::{mean_frame_rms, mean_zero_crossing_rate};

/// Errors raised while computing descriptors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Spectral transform failed: {0}")]
    Transform(#[from] FftError),
    /// A computed descriptor was NaN or infinite.
    #[error("Descriptor {field} is not finite")]
    NonFinite { field: &'static str },
}

/// Analyze a waveform, drawing liveness from the thread-local RNG.
pub fn analyze(sample: &AudioSample) -> Result<DescriptorSet, AnalysisError> {
    analyze_with_rng(sample, &mut rand::rng())
}

/// Analyze a waveform with an explicit liveness source.
///
/// The same waveform and RNG state always yield the same descriptor set.
pub fn analyze_with_rng<R: Rng + ?Sized>(
    sample: &AudioSample,
    rng: &mut R,
) -> Result<DescriptorSet, AnalysisError> {
    let samples = sample.samples();
    let sample_rate = sample.sample_rate();

    let spectral = extract_spectral_summary(samples, sample_rate)?;
    let rhythm = analyze_rhythm(&spectral.onset_envelope, spectral.frame_rate);
    let rms_energy = mean_frame_rms(samples, STFT_FRAME_SIZE, STFT_HOP_SIZE);
    let zero_crossing_rate = mean_zero_crossing_rate(samples, STFT_FRAME_SIZE, STFT_HOP_SIZE);
    let proxies = MoodProxies::derive(
        rms_energy,
        rhythm.tempo_bpm,
        spectral.centroid_hz,
        spectral.contrast_db,
        zero_crossing_rate,
    );
    let liveness: f32 = rng.random_range(0.0..=1.0);

    let descriptors = DescriptorSet {
        duration: sample.duration_seconds(),
        tempo_bpm: rhythm.tempo_bpm,
        beat_times: rhythm.beat_times,
        key: PitchClass::from_chroma(&spectral.chroma),
        spectral_centroid: spectral.centroid_hz,
        spectral_contrast: spectral.contrast_db,
        zero_crossing_rate,
        mfcc: spectral.mfcc,
        rms_energy,
        energy: proxies.energy,
        danceability: proxies.danceability,
        valence: proxies.valence,
        acousticness: proxies.acousticness,
        instrumentalness: proxies.instrumentalness,
        liveness,
    };
    ensure_finite(&descriptors)?;
    debug!(
        "Analyzed {:.2}s: tempo {:.1} BPM, key {}, {} beats",
        descriptors.duration,
        descriptors.tempo_bpm,
        descriptors.key,
        descriptors.beat_times.len()
    );
    Ok(descriptors)
}

fn ensure_finite(descriptors: &DescriptorSet) -> Result<(), AnalysisError> {
    let scalars = [
        ("duration", descriptors.duration),
        ("tempo_bpm", descriptors.tempo_bpm),
        ("spectral_centroid", descriptors.spectral_centroid),
        ("spectral_contrast", descriptors.spectral_contrast),
        ("zero_crossing_rate", descriptors.zero_crossing_rate),
        ("rms_energy", descriptors.rms_energy),
        ("energy", descriptors.energy),
        ("danceability", descriptors.danceability),
        ("valence", descriptors.valence),
        ("acousticness", descriptors.acousticness),
        ("instrumentalness", descriptors.instrumentalness),
        ("liveness", descriptors.liveness),
    ];
    for (field, value) in scalars {
        if !value.is_finite() {
            return Err(AnalysisError::NonFinite { field });
        }
    }
    if descriptors.mfcc.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite { field: "mfcc" });
    }
    if descriptors.beat_times.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite {
            field: "beat_times",
        });
    }
    Ok(())
}
