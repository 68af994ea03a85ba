use super::chroma::ChromaMap;
use super::contrast::ContrastBands;
use super::mel::{MelBank, dct_ii_ortho};
use super::{MEL_BANDS, MFCC_COUNT};
use crate::analysis::fft::{Complex32, FftError, FftPlan, hann_window};
use crate::analysis::time_domain::{frame_ranges, sanitize_sample};

/// Per-frame spectral measurements for one pass over the signal.
pub(super) struct FrameSet {
    pub(super) centroid_hz: Vec<f32>,
    pub(super) contrast_db: Vec<f32>,
    pub(super) chroma: Vec<[f32; 12]>,
    pub(super) mfcc: Vec<Vec<f32>>,
    /// Positive mel-band flux per frame; the first frame is always 0.
    pub(super) onset_strength: Vec<f32>,
}

struct Analyzers {
    plan: FftPlan,
    window: Vec<f32>,
    mel: MelBank,
    contrast: ContrastBands,
    chroma: ChromaMap,
}

pub(super) fn compute_frames(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
) -> Result<FrameSet, FftError> {
    let analyzers = Analyzers {
        plan: FftPlan::new(frame_size)?,
        window: hann_window(frame_size),
        mel: MelBank::new(sample_rate, frame_size, MEL_BANDS, 0.0, sample_rate as f32 * 0.5),
        contrast: ContrastBands::new(sample_rate, frame_size),
        chroma: ChromaMap::new(sample_rate, frame_size),
    };
    let ranges = frame_ranges(samples.len(), frame_size, hop_size);
    let mut frames = FrameSet {
        centroid_hz: Vec::with_capacity(ranges.len()),
        contrast_db: Vec::with_capacity(ranges.len()),
        chroma: Vec::with_capacity(ranges.len()),
        mfcc: Vec::with_capacity(ranges.len()),
        onset_strength: Vec::with_capacity(ranges.len()),
    };
    let mut complex = vec![Complex32::default(); frame_size];
    let mut power = vec![0.0_f32; frame_size / 2 + 1];
    let mut magnitude = vec![0.0_f32; frame_size / 2 + 1];
    let mut scratch = Vec::new();
    let mut previous_mel: Option<Vec<f32>> = None;
    for range in ranges {
        fill_windowed(&mut complex, &samples[range], &analyzers.window);
        analyzers.plan.process(&mut complex)?;
        for (bin, cell) in complex.iter().take(power.len()).enumerate() {
            power[bin] = cell.norm_sqr();
            magnitude[bin] = power[bin].sqrt();
        }
        frames
            .centroid_hz
            .push(centroid(&magnitude, sample_rate, frame_size));
        frames
            .contrast_db
            .push(analyzers.contrast.frame_contrast(&magnitude, &mut scratch));
        frames.chroma.push(analyzers.chroma.frame_chroma(&power));
        let mel_db = analyzers.mel.log_energies_db(&power);
        frames.mfcc.push(dct_ii_ortho(&mel_db, MFCC_COUNT));
        frames
            .onset_strength
            .push(positive_flux(previous_mel.as_deref(), &mel_db));
        previous_mel = Some(mel_db);
    }
    Ok(frames)
}

/// Window a frame into the FFT buffer, zero-padding short tails.
fn fill_windowed(target: &mut [Complex32], frame: &[f32], window: &[f32]) {
    for (i, cell) in target.iter_mut().enumerate() {
        let src = frame.get(i).copied().map(sanitize_sample).unwrap_or(0.0);
        *cell = Complex32::new(src * window[i], 0.0);
    }
}

fn centroid(magnitude: &[f32], sample_rate: u32, fft_len: usize) -> f32 {
    let mut sum = 0.0_f64;
    let mut weighted = 0.0_f64;
    let hz_per_bin = sample_rate.max(1) as f64 / fft_len as f64;
    for (bin, &m) in magnitude.iter().enumerate() {
        let m = m.max(0.0) as f64;
        sum += m;
        weighted += m * bin as f64 * hz_per_bin;
    }
    if sum <= 0.0 {
        return 0.0;
    }
    (weighted / sum) as f32
}

fn positive_flux(previous: Option<&[f32]>, current: &[f32]) -> f32 {
    let Some(previous) = previous else {
        return 0.0;
    };
    if current.is_empty() {
        return 0.0;
    }
    let sum: f32 = previous
        .iter()
        .zip(current.iter())
        .map(|(prev, cur)| (cur - prev).max(0.0))
        .sum();
    sum / current.len() as f32
}
