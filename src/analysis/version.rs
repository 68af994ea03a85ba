//! Versioned descriptor persistence format.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::descriptor::DescriptorSet;
use super::frequency_domain::{MEL_BANDS, MFCC_COUNT, STFT_FRAME_SIZE, STFT_HOP_SIZE};
use super::rhythm::{MAX_BEATS, MAX_BPM, MIN_BPM, PRIOR_BPM};

/// Layout version of the persisted descriptor envelope.
pub const DESCRIPTOR_SCHEMA_VERSION: u32 = 1;

/// Hash identifying the analysis parameters that produced a descriptor.
pub fn analysis_version() -> &'static str {
    &ANALYSIS_VERSION
}

static ANALYSIS_VERSION: LazyLock<String> = LazyLock::new(|| {
    let payload = format!(
        "frame={}|hop={}|mel={}|mfcc={}|bpm_min={}|bpm_max={}|bpm_prior={}|beats={}",
        STFT_FRAME_SIZE, STFT_HOP_SIZE, MEL_BANDS, MFCC_COUNT, MIN_BPM, MAX_BPM, PRIOR_BPM, MAX_BEATS
    );
    let hash = blake3::hash(payload.as_bytes());
    format!("analysis_v1_{}", hash.to_hex())
});

#[derive(Debug, Serialize, Deserialize)]
struct DescriptorEnvelope<T> {
    schema_version: u32,
    analysis_version: String,
    features: T,
}

/// Serialize a descriptor set into its canonical, version-tagged JSON text.
pub fn encode_descriptor(set: &DescriptorSet) -> Result<String, serde_json::Error> {
    serde_json::to_string(&DescriptorEnvelope {
        schema_version: DESCRIPTOR_SCHEMA_VERSION,
        analysis_version: analysis_version().to_string(),
        features: set,
    })
}

/// Extract the descriptor mapping from persisted text.
///
/// Accepts the current envelope, newer envelopes (with a warning) and legacy
/// bare mappings. Unparseable text yields `Value::Null`.
pub fn decode_features(text: &str) -> Value {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!("Ignoring unparseable descriptor: {err}");
            return Value::Null;
        }
    };
    let Value::Object(mut map) = value else {
        return value;
    };
    let Some(schema_version) = map.get("schema_version") else {
        return Value::Object(map);
    };
    if schema_version
        .as_u64()
        .is_none_or(|version| version > DESCRIPTOR_SCHEMA_VERSION as u64)
    {
        warn!("Descriptor schema {schema_version} is newer than {DESCRIPTOR_SCHEMA_VERSION}; reading features best-effort");
    }
    map.remove("features").unwrap_or(Value::Null)
}

/// Analysis version recorded in persisted text, if any.
pub fn stored_analysis_version(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .get("analysis_version")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::descriptor::PitchClass;
    use serde_json::json;

    fn set() -> DescriptorSet {
        DescriptorSet {
            duration: 1.0,
            tempo_bpm: 100.0,
            beat_times: vec![0.5],
            key: PitchClass::FSharp,
            spectral_centroid: 900.0,
            spectral_contrast: 18.0,
            zero_crossing_rate: 0.1,
            mfcc: [0.5; 13],
            rms_energy: 0.02,
            energy: 0.2,
            danceability: 0.5,
            valence: 0.68,
            acousticness: 0.82,
            instrumentalness: 0.9,
            liveness: 0.3,
        }
    }

    #[test]
    fn envelope_carries_versions_and_features() {
        let text = encode_descriptor(&set()).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["schema_version"], json!(1));
        assert_eq!(raw["features"]["key"], json!("F#"));
        assert_eq!(
            stored_analysis_version(&text).as_deref(),
            Some(analysis_version())
        );
    }

    #[test]
    fn decode_returns_features_mapping() {
        let text = encode_descriptor(&set()).unwrap();
        let features = decode_features(&text);
        assert_eq!(features["tempo_bpm"], json!(100.0));
        let parsed: DescriptorSet = serde_json::from_value(features).unwrap();
        assert_eq!(parsed, set());
    }

    #[test]
    fn legacy_bare_mapping_is_accepted() {
        let features = decode_features(r#"{"tempo_bpm": 90, "mfcc": [1, 2]}"#);
        assert_eq!(features["tempo_bpm"], json!(90));
    }

    #[test]
    fn newer_schema_still_yields_features() {
        let features =
            decode_features(r#"{"schema_version": 9, "analysis_version": "x", "features": {"energy": 0.5}}"#);
        assert_eq!(features, json!({"energy": 0.5}));
    }

    #[test]
    fn garbage_decodes_to_null() {
        assert_eq!(decode_features("not json"), Value::Null);
        assert_eq!(decode_features(""), Value::Null);
    }

    #[test]
    fn analysis_version_is_stable() {
        assert!(analysis_version().starts_with("analysis_v1_"));
        assert_eq!(analysis_version(), analysis_version());
    }
}
