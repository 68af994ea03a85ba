use std::f32::consts::PI;
use std::path::Path;

/// Write mono float samples as a WAV file, creating parent directories.
pub fn write_test_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

pub fn sine(freq_hz: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    (0..total)
        .map(|i| (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin() * 0.5)
        .collect()
}

/// Short decaying noise bursts every `60 / bpm` seconds.
pub fn click_train(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    let period = (60.0 / bpm * sample_rate as f32) as usize;
    let click_len = sample_rate as usize / 100;
    let mut samples = vec![0.0_f32; total];
    let mut state = 0x1234_5678_u32;
    let mut start = 0usize;
    while start < total {
        for (offset, slot) in samples[start..total.min(start + click_len)].iter_mut().enumerate() {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
            let decay = 1.0 - offset as f32 / click_len as f32;
            *slot = noise * decay * 0.8;
        }
        start += period;
    }
    samples
}
