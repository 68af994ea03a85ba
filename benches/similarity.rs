use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use soundalike::analysis::{AudioSample, FeatureVector, analyze, top_k, vectorize};

const CANDIDATE_COUNT: usize = 2_000;
const SAMPLE_RATE: u32 = 22_050;

fn descriptor_mapping(seed: usize) -> Value {
    let mfcc: Vec<f64> = (0..13).map(|i| ((seed * 7 + i * 13) % 97) as f64 - 48.0).collect();
    json!({
        "tempo_bpm": 60.0 + (seed % 140) as f64,
        "spectral_centroid": 500.0 + (seed % 4_000) as f64,
        "spectral_contrast": 10.0 + (seed % 30) as f64,
        "zero_crossing_rate": (seed % 100) as f64 / 100.0,
        "rms_energy": (seed % 50) as f64 / 500.0,
        "energy": (seed % 10) as f64 / 10.0,
        "danceability": (seed % 7) as f64 / 7.0,
        "valence": 0.5,
        "acousticness": 0.3,
        "instrumentalness": 0.9,
        "liveness": (seed % 3) as f64 / 3.0,
        "mfcc": mfcc,
    })
}

fn candidates() -> Vec<(usize, Option<FeatureVector>)> {
    (0..CANDIDATE_COUNT)
        .map(|seed| (seed, vectorize(&descriptor_mapping(seed))))
        .collect()
}

fn bench_ranking(c: &mut Criterion) {
    let pool = candidates();
    let query = vectorize(&descriptor_mapping(CANDIDATE_COUNT + 1));
    c.bench_function("top_k_2000_candidates", |b| {
        b.iter(|| top_k(query.as_ref(), &pool, 10))
    });
    c.bench_function("vectorize_mapping", |b| {
        b.iter_batched(
            || descriptor_mapping(42),
            |mapping| vectorize(&mapping),
            BatchSize::SmallInput,
        )
    });
}

fn bench_analysis(c: &mut Criterion) {
    let samples: Vec<f32> = (0..SAMPLE_RATE as usize * 5)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / SAMPLE_RATE as f32).sin() * 0.5)
        .collect();
    let sample = AudioSample::new(samples, SAMPLE_RATE).expect("valid sample");
    let mut group = c.benchmark_group("analysis");
    group.sample_size(10);
    group.bench_function("analyze_5s_sine", |b| b.iter(|| analyze(&sample)));
    group.finish();
}

criterion_group!(benches, bench_ranking, bench_analysis);
criterion_main!(benches);
