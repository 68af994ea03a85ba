/// Triangular mel filterbank with a log-power front end for MFCCs and onset flux.
pub(super) struct MelBank {
    filters: Vec<Vec<(usize, f32)>>,
}

const MIN_POWER: f32 = 1e-10;

impl MelBank {
    pub(super) fn new(
        sample_rate: u32,
        fft_len: usize,
        mel_bands: usize,
        f_min: f32,
        f_max: f32,
    ) -> Self {
        let bins = mel_bins(sample_rate, fft_len, mel_bands, f_min, f_max);
        Self {
            filters: build_filters(&bins, mel_bands),
        }
    }

    /// Mel band energies in decibels, floored at -100 dB.
    pub(super) fn log_energies_db(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                let mut sum = 0.0_f64;
                for &(bin, weight) in filter {
                    let p = power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64;
                    sum += p * weight as f64;
                }
                10.0 * (sum as f32).max(MIN_POWER).log10()
            })
            .collect()
    }
}

fn mel_bins(sample_rate: u32, fft_len: usize, mel_bands: usize, f_min: f32, f_max: f32) -> Vec<usize> {
    let nyquist = sample_rate.max(1) as f32 * 0.5;
    let f_max = f_max.min(nyquist).max(f_min);
    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    (0..(mel_bands + 2))
        .map(|i| {
            let t = i as f32 / (mel_bands + 1) as f32;
            let hz = mel_to_hz(mel_min + (mel_max - mel_min) * t);
            super::freq_to_bin(hz, sample_rate, fft_len)
        })
        .collect()
}

fn build_filters(bins: &[usize], mel_bands: usize) -> Vec<Vec<(usize, f32)>> {
    (0..mel_bands)
        .map(|m| {
            let left = bins[m];
            let center = bins[m + 1].max(left + 1);
            let right = bins[m + 2].max(center + 1);
            triangle(left, center, right)
        })
        .collect()
}

fn triangle(left: usize, center: usize, right: usize) -> Vec<(usize, f32)> {
    let mut weights = Vec::with_capacity(right - left + 1);
    for bin in left..=right {
        let w = if bin <= center {
            (bin - left) as f32 / (center - left) as f32
        } else {
            (right - bin) as f32 / (right - center) as f32
        };
        if w > 0.0 {
            weights.push((bin, w));
        }
    }
    weights
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0_f32 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0_f32 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Orthonormal DCT-II, keeping the first `count` coefficients.
pub(super) fn dct_ii_ortho(values: &[f32], count: usize) -> Vec<f32> {
    let n = values.len().max(1) as f64;
    (0..count)
        .map(|k| {
            let mut sum = 0.0_f64;
            for (m, &v) in values.iter().enumerate() {
                let angle = std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n;
                sum += v as f64 * angle.cos();
            }
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (sum * scale) as f32
        })
        .collect()
}
