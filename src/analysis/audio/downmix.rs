/// Average interleaved channels into `out`, reusing its allocation.
///
/// A trailing partial frame is dropped.
pub(super) fn downmix_to_mono_into(out: &mut Vec<f32>, samples: &[f32], channels: u16) {
    let channels = channels.max(1) as usize;
    out.clear();
    if channels == 1 {
        out.extend_from_slice(samples);
        return;
    }
    let frames = samples.len() / channels;
    out.reserve(frames);
    for frame in samples.chunks_exact(channels) {
        let sum: f32 = frame.iter().sum();
        out.push(sum / channels as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_input_is_copied() {
        let mut out = vec![9.0];
        downmix_to_mono_into(&mut out, &[0.1, -0.2], 1);
        assert_eq!(out, vec![0.1, -0.2]);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let mut out = Vec::new();
        downmix_to_mono_into(&mut out, &[0.2, 0.4, 0.6, 0.8, 1.0], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] - 0.7).abs() < 1e-6);
    }
}
