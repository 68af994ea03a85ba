//! Frame-wise loudness and zero-crossing measurements.

use std::ops::Range;

/// Split `len` samples into frame ranges of `frame_size` stepped by `hop_size`.
///
/// Signals shorter than one frame produce a single frame over the whole signal,
/// and the final frame never extends past the end.
pub(crate) fn frame_ranges(len: usize, frame_size: usize, hop_size: usize) -> Vec<Range<usize>> {
    let frame_size = frame_size.max(1);
    let hop_size = hop_size.max(1);
    if len == 0 {
        return Vec::new();
    }
    if len <= frame_size {
        return vec![0..len];
    }
    let mut ranges = Vec::with_capacity((len - frame_size) / hop_size + 1);
    let mut start = 0usize;
    while start + frame_size <= len {
        ranges.push(start..start + frame_size);
        start += hop_size;
    }
    ranges
}

/// Mean of per-frame RMS amplitude.
pub(crate) fn mean_frame_rms(samples: &[f32], frame_size: usize, hop_size: usize) -> f32 {
    mean_over_frames(samples, frame_size, hop_size, rms)
}

/// Mean of per-frame zero-crossing fraction, in `[0, 1]`.
pub(crate) fn mean_zero_crossing_rate(samples: &[f32], frame_size: usize, hop_size: usize) -> f32 {
    mean_over_frames(samples, frame_size, hop_size, zero_crossing_fraction).clamp(0.0, 1.0)
}

fn mean_over_frames(
    samples: &[f32],
    frame_size: usize,
    hop_size: usize,
    measure: fn(&[f32]) -> f32,
) -> f32 {
    let ranges = frame_ranges(samples.len(), frame_size, hop_size);
    if ranges.is_empty() {
        return 0.0;
    }
    let sum: f64 = ranges
        .iter()
        .map(|range| measure(&samples[range.clone()]) as f64)
        .sum();
    (sum / ranges.len() as f64) as f32
}

pub(crate) fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0_f64;
    for &sample in samples {
        let sample = sanitize_sample(sample) as f64;
        sum += sample * sample;
    }
    (sum / samples.len() as f64).max(0.0).sqrt() as f32
}

fn zero_crossing_fraction(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| {
            let prev = sanitize_sample(pair[0]);
            let current = sanitize_sample(pair[1]);
            (prev >= 0.0) != (current >= 0.0)
        })
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

pub(crate) fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
