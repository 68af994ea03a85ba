//! Pitch-class energy folding.

const REFERENCE_HZ: f32 = 440.0;
const MIN_PITCH_HZ: f32 = 27.5;
/// Index of A in the C-based pitch-class ordering.
const A_INDEX: i32 = 9;

pub(super) struct ChromaMap {
    /// Pitch class per FFT bin; `None` for bins outside the pitched range.
    classes: Vec<Option<usize>>,
}

impl ChromaMap {
    pub(super) fn new(sample_rate: u32, fft_len: usize) -> Self {
        let bins = fft_len / 2 + 1;
        let sr = sample_rate.max(1) as f32;
        let classes = (0..bins)
            .map(|bin| {
                let freq = bin as f32 * sr / fft_len as f32;
                (freq >= MIN_PITCH_HZ).then(|| pitch_class(freq))
            })
            .collect();
        Self { classes }
    }

    /// Fold one power frame into 12 pitch classes, normalized to a peak of 1.
    pub(super) fn frame_chroma(&self, power: &[f32]) -> [f32; 12] {
        let mut chroma = [0.0_f32; 12];
        for (class, &p) in self.classes.iter().zip(power.iter()) {
            if let Some(class) = class {
                chroma[*class] += p.max(0.0);
            }
        }
        let peak = chroma.iter().copied().fold(0.0_f32, f32::max);
        if peak > 0.0 {
            for value in &mut chroma {
                *value /= peak;
            }
        }
        chroma
    }
}

fn pitch_class(freq_hz: f32) -> usize {
    let semitones = (12.0 * (freq_hz / REFERENCE_HZ).log2()).round() as i32;
    (semitones + A_INDEX).rem_euclid(12) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_pitches_map_to_expected_classes() {
        assert_eq!(pitch_class(440.0), 9);
        assert_eq!(pitch_class(261.63), 0);
        assert_eq!(pitch_class(277.18), 1);
        assert_eq!(pitch_class(880.0), 9);
        assert_eq!(pitch_class(246.94), 11);
    }

    #[test]
    fn silent_frame_stays_zero() {
        let map = ChromaMap::new(22_050, 2048);
        assert_eq!(map.frame_chroma(&vec![0.0; 1025]), [0.0; 12]);
    }
}
