//! Tempo estimation and beat tracking over a spectral-flux onset envelope.

pub(crate) const MIN_BPM: f32 = 40.0;
pub(crate) const MAX_BPM: f32 = 240.0;
/// Tempo prior centre; autocorrelation peaks are weighted towards it.
pub(crate) const PRIOR_BPM: f32 = 120.0;
/// Prior width in octaves.
const PRIOR_OCTAVES: f32 = 1.0;
pub(crate) const MAX_BEATS: usize = 20;
const SMOOTHING_WINDOW: usize = 3;
/// Envelopes whose peak flux stays below this are treated as having no pulse.
const MIN_ONSET_STRENGTH: f32 = 1e-3;
const BEAT_SEARCH_FRACTION: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RhythmSummary {
    pub(crate) tempo_bpm: f32,
    /// First beats in ascending order, at most [`MAX_BEATS`].
    pub(crate) beat_times: Vec<f32>,
}

impl RhythmSummary {
    fn none() -> Self {
        Self {
            tempo_bpm: 0.0,
            beat_times: Vec::new(),
        }
    }
}

/// Estimate tempo and beat positions; `frame_rate` is envelope frames per second.
pub(crate) fn analyze_rhythm(onset_envelope: &[f32], frame_rate: f32) -> RhythmSummary {
    if onset_envelope.len() < 2 || !(frame_rate > 0.0) {
        return RhythmSummary::none();
    }
    let peak = onset_envelope.iter().copied().fold(0.0_f32, f32::max);
    if peak < MIN_ONSET_STRENGTH {
        return RhythmSummary::none();
    }
    let smoothed = moving_average(onset_envelope, SMOOTHING_WINDOW);
    let Some(period) = estimate_period(&smoothed, frame_rate) else {
        return RhythmSummary::none();
    };
    let mut beat_times: Vec<f32> = track_beats(&smoothed, period)
        .into_iter()
        .map(|frame| frame as f32 / frame_rate)
        .collect();
    beat_times.truncate(MAX_BEATS);
    RhythmSummary {
        tempo_bpm: 60.0 * frame_rate / period,
        beat_times,
    }
}

fn moving_average(signal: &[f32], window: usize) -> Vec<f32> {
    if signal.len() < window {
        return signal.to_vec();
    }
    let half = window / 2;
    (0..signal.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(signal.len());
            signal[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}

/// Beat period in envelope frames, refined to sub-frame precision.
fn estimate_period(envelope: &[f32], frame_rate: f32) -> Option<f32> {
    let min_lag = ((60.0 / MAX_BPM) * frame_rate).floor().max(1.0) as usize;
    let max_lag = ((60.0 / MIN_BPM) * frame_rate).ceil() as usize;
    let max_lag = max_lag.min(envelope.len().saturating_sub(1));
    if min_lag >= max_lag {
        return None;
    }
    let autocorr = autocorrelate(envelope, max_lag + 1)?;
    let weighted = |lag: usize| -> f32 {
        let bpm = 60.0 * frame_rate / lag as f32;
        autocorr[lag] * tempo_prior(bpm)
    };
    let best_lag = (min_lag..=max_lag)
        .filter(|&lag| bpm_in_range(60.0 * frame_rate / lag as f32))
        .max_by(|&a, &b| weighted(a).total_cmp(&weighted(b)))?;
    if autocorr[best_lag] <= 0.0 {
        return None;
    }
    Some(refine_peak(&autocorr, best_lag))
}

fn bpm_in_range(bpm: f32) -> bool {
    (MIN_BPM..=MAX_BPM).contains(&bpm)
}

fn tempo_prior(bpm: f32) -> f32 {
    let octaves = (bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Mean-removed autocorrelation normalized by lag-0 energy.
fn autocorrelate(signal: &[f32], lags: usize) -> Option<Vec<f32>> {
    let n = signal.len();
    let mean = signal.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = signal.iter().map(|&x| x - mean).collect();
    let energy: f32 = centered.iter().map(|&x| x * x).sum();
    if energy < f32::EPSILON {
        return None;
    }
    Some(
        (0..lags.min(n))
            .map(|lag| {
                let sum: f32 = centered[..n - lag]
                    .iter()
                    .zip(&centered[lag..])
                    .map(|(a, b)| a * b)
                    .sum();
                sum / energy
            })
            .collect(),
    )
}

fn refine_peak(values: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= values.len() {
        return index as f32;
    }
    let (left, centre, right) = (values[index - 1], values[index], values[index + 1]);
    let denom = left - 2.0 * centre + right;
    if denom.abs() < f32::EPSILON {
        return index as f32;
    }
    let offset = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    index as f32 + offset
}

/// Step one period at a time from the strongest early onset, snapping to local maxima.
fn track_beats(envelope: &[f32], period: f32) -> Vec<usize> {
    let first_window = (period.ceil() as usize).clamp(1, envelope.len());
    let Some(start) = argmax(&envelope[..first_window]) else {
        return Vec::new();
    };
    let radius = ((period * BEAT_SEARCH_FRACTION).round() as usize).max(1);
    let mut beats = vec![start];
    let mut expected = start as f32 + period;
    while (expected.round() as usize) < envelope.len() && beats.len() < MAX_BEATS {
        let centre = expected.round() as usize;
        let lo = centre.saturating_sub(radius);
        let hi = (centre + radius + 1).min(envelope.len());
        let beat = argmax(&envelope[lo..hi])
            .map(|offset| lo + offset)
            .filter(|&frame| envelope[frame] > 0.0)
            .unwrap_or(centre);
        let beat = beat.max(beats[beats.len() - 1] + 1);
        beats.push(beat);
        expected = beat as f32 + period;
    }
    beats
}

fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if best.is_none_or(|(_, best_value)| value > best_value) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}
