use serde_json::Value;

use super::descriptor::DescriptorSet;
use super::frequency_domain::MFCC_COUNT;

/// Scalar descriptor keys, in vector order. The MFCCs follow them.
pub const SCALAR_FEATURE_KEYS: [&str; 11] = [
    "tempo_bpm",
    "spectral_centroid",
    "spectral_contrast",
    "zero_crossing_rate",
    "rms_energy",
    "energy",
    "danceability",
    "valence",
    "acousticness",
    "instrumentalness",
    "liveness",
];
/// Number of `f32` values in every feature vector.
pub const FEATURE_VECTOR_LEN: usize = SCALAR_FEATURE_KEYS.len() + MFCC_COUNT;

/// Fixed-order numeric embedding of a descriptor set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_VECTOR_LEN]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn values(&self) -> &[f32; FEATURE_VECTOR_LEN] {
        &self.0
    }
}

/// Vectorize a loose descriptor mapping.
///
/// Returns `None` unless `features` is a JSON object. Missing or non-numeric
/// scalars become 0.0; `mfcc` is truncated or zero-padded to 13 entries.
pub fn vectorize(features: &Value) -> Option<FeatureVector> {
    let map = features.as_object()?;
    let mut out = [0.0_f32; FEATURE_VECTOR_LEN];
    for (slot, key) in out.iter_mut().zip(SCALAR_FEATURE_KEYS) {
        *slot = map.get(key).map(number_or_zero).unwrap_or(0.0);
    }
    if let Some(Value::Array(mfcc)) = map.get("mfcc") {
        let mfcc_slots = &mut out[SCALAR_FEATURE_KEYS.len()..];
        for (slot, value) in mfcc_slots.iter_mut().zip(mfcc.iter()) {
            *slot = number_or_zero(value);
        }
    }
    Some(FeatureVector(out))
}

fn number_or_zero(value: &Value) -> f32 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0) as f32,
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0) as f32,
        _ => 0.0,
    }
}

impl From<&DescriptorSet> for FeatureVector {
    fn from(set: &DescriptorSet) -> Self {
        let scalars = [
            set.tempo_bpm,
            set.spectral_centroid,
            set.spectral_contrast,
            set.zero_crossing_rate,
            set.rms_energy,
            set.energy,
            set.danceability,
            set.valence,
            set.acousticness,
            set.instrumentalness,
            set.liveness,
        ];
        let mut out = [0.0_f32; FEATURE_VECTOR_LEN];
        out[..scalars.len()].copy_from_slice(&scalars);
        out[scalars.len()..].copy_from_slice(&set.mfcc);
        FeatureVector(out)
    }
}
