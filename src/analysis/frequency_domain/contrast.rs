//! Octave-band spectral contrast (peak versus valley energy).

const FIRST_BAND_HZ: f32 = 200.0;
const OCTAVE_BANDS: usize = 6;
const QUANTILE: f32 = 0.02;
const MIN_MAGNITUDE: f32 = 1e-10;

/// Precomputed bin ranges for the contrast sub-bands of one FFT size.
pub(super) struct ContrastBands {
    ranges: Vec<(usize, usize)>,
}

impl ContrastBands {
    /// Bands are `[0, 200)`, then octaves from 200 Hz; the last band runs to Nyquist.
    /// Bands that start above Nyquist are dropped.
    pub(super) fn new(sample_rate: u32, fft_len: usize) -> Self {
        let nyquist_bin = fft_len / 2;
        let mut edges = vec![0.0_f32];
        for octave in 0..=OCTAVE_BANDS {
            edges.push(FIRST_BAND_HZ * 2.0_f32.powi(octave as i32));
        }
        let mut ranges = Vec::with_capacity(OCTAVE_BANDS + 1);
        for (band, pair) in edges.windows(2).enumerate() {
            let lo = super::freq_to_bin(pair[0], sample_rate, fft_len);
            let hi = if band == OCTAVE_BANDS {
                nyquist_bin
            } else {
                super::freq_to_bin(pair[1], sample_rate, fft_len)
            };
            if pair[0] >= sample_rate as f32 * 0.5 || hi <= lo {
                continue;
            }
            ranges.push((lo, hi.min(nyquist_bin)));
        }
        Self { ranges }
    }

    /// Mean contrast in dB across bands for one magnitude frame.
    pub(super) fn frame_contrast(&self, magnitude: &[f32], scratch: &mut Vec<f32>) -> f32 {
        if self.ranges.is_empty() {
            return 0.0;
        }
        let mut total = 0.0_f64;
        for &(lo, hi) in &self.ranges {
            scratch.clear();
            scratch.extend_from_slice(&magnitude[lo..=hi.min(magnitude.len() - 1)]);
            total += band_contrast(scratch) as f64;
        }
        (total / self.ranges.len() as f64) as f32
    }
}

fn band_contrast(band: &mut [f32]) -> f32 {
    if band.is_empty() {
        return 0.0;
    }
    band.sort_by(|a, b| a.total_cmp(b));
    let take = ((QUANTILE * band.len() as f32).round() as usize).clamp(1, band.len());
    let valley = mean(&band[..take]);
    let peak = mean(&band[band.len() - take..]);
    to_db(peak) - to_db(valley)
}

fn mean(values: &[f32]) -> f32 {
    values.iter().map(|&v| v as f64).sum::<f64>() as f32 / values.len() as f32
}

fn to_db(value: f32) -> f32 {
    10.0 * value.max(MIN_MAGNITUDE).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_spectrum_has_no_contrast() {
        let bands = ContrastBands::new(22_050, 2048);
        let mut scratch = Vec::new();
        let contrast = bands.frame_contrast(&vec![0.5_f32; 1025], &mut scratch);
        assert!(contrast.abs() < 1e-4);
    }

    #[test]
    fn single_peak_produces_positive_contrast() {
        let bands = ContrastBands::new(22_050, 2048);
        let mut magnitude = vec![0.001_f32; 1025];
        magnitude[40] = 1.0;
        let mut scratch = Vec::new();
        assert!(bands.frame_contrast(&magnitude, &mut scratch) > 0.0);
    }

    #[test]
    fn low_sample_rates_drop_bands_above_nyquist() {
        let bands = ContrastBands::new(8_000, 2048);
        assert!(bands.ranges.len() < OCTAVE_BANDS + 1);
        assert!(bands.ranges.iter().all(|&(lo, hi)| lo < hi && hi <= 1024));
    }
}
