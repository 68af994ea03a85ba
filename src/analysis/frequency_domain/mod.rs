//! Frequency-domain feature extraction (STFT, centroid, contrast, chroma, MFCC, onset flux).

mod chroma;
mod contrast;
mod mel;
mod stft;

use crate::analysis::fft::FftError;

pub(crate) const STFT_FRAME_SIZE: usize = 2048;
pub(crate) const STFT_HOP_SIZE: usize = 512;
pub(crate) const MEL_BANDS: usize = 40;
pub(crate) const MFCC_COUNT: usize = 13;

/// Time-averaged spectral descriptors plus the onset envelope used for rhythm.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpectralSummary {
    pub(crate) centroid_hz: f32,
    pub(crate) contrast_db: f32,
    pub(crate) chroma: [f32; 12],
    pub(crate) mfcc: [f32; MFCC_COUNT],
    pub(crate) onset_envelope: Vec<f32>,
    /// Onset envelope frames per second.
    pub(crate) frame_rate: f32,
}

pub(crate) fn extract_spectral_summary(
    samples: &[f32],
    sample_rate: u32,
) -> Result<SpectralSummary, FftError> {
    let frames = stft::compute_frames(samples, sample_rate, STFT_FRAME_SIZE, STFT_HOP_SIZE)?;
    let mut chroma = [0.0_f32; 12];
    for frame in &frames.chroma {
        for (acc, value) in chroma.iter_mut().zip(frame.iter()) {
            *acc += value;
        }
    }
    let frame_count = frames.chroma.len().max(1) as f32;
    for value in &mut chroma {
        *value /= frame_count;
    }
    let mut mfcc = [0.0_f32; MFCC_COUNT];
    for (index, coeff) in mfcc.iter_mut().enumerate() {
        *coeff = mean(frames.mfcc.iter().map(|frame| frame[index]));
    }
    Ok(SpectralSummary {
        centroid_hz: mean(frames.centroid_hz.iter().copied()),
        contrast_db: mean(frames.contrast_db.iter().copied()),
        chroma,
        mfcc,
        onset_envelope: frames.onset_strength,
        frame_rate: sample_rate as f32 / STFT_HOP_SIZE as f32,
    })
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let mut sum = 0.0_f64;
    let mut count = 0usize;
    for value in values {
        sum += value as f64;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

fn freq_to_bin(freq_hz: f32, sample_rate: u32, fft_len: usize) -> usize {
    let nyquist = sample_rate.max(1) as f32 * 0.5;
    let freq = freq_hz.clamp(0.0, nyquist);
    (((freq * fft_len as f32) / sample_rate.max(1) as f32).round() as usize).min(fft_len / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, seconds: f32) -> Vec<f32> {
        let len = (sr as f32 * seconds) as usize;
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn sine_wave_centroid_tracks_frequency() {
        let summary = extract_spectral_summary(&sine(1_000.0, 22_050, 0.5), 22_050).unwrap();
        assert!(summary.centroid_hz > 700.0 && summary.centroid_hz < 1_500.0);
    }

    #[test]
    fn a440_dominates_chroma() {
        let summary = extract_spectral_summary(&sine(440.0, 22_050, 0.5), 22_050).unwrap();
        let peak = summary
            .chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx);
        assert_eq!(peak, Some(9));
    }

    #[test]
    fn mfcc_is_deterministic_for_same_input() {
        let samples = sine(220.0, 16_000, 0.3);
        let a = extract_spectral_summary(&samples, 16_000).unwrap();
        let b = extract_spectral_summary(&samples, 16_000).unwrap();
        assert_eq!(a.mfcc, b.mfcc);
        assert!(a.mfcc.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn silence_produces_zero_centroid_and_contrast() {
        let summary = extract_spectral_summary(&vec![0.0; 8_192], 22_050).unwrap();
        assert_eq!(summary.centroid_hz, 0.0);
        assert_eq!(summary.contrast_db, 0.0);
        assert!(summary.onset_envelope.iter().all(|v| *v == 0.0));
    }
}
