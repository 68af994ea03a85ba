use serde::{Deserialize, Serialize};

use super::frequency_domain::MFCC_COUNT;

/// Western pitch class, serialized with sharp spellings (`"C#"`, `"F#"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class with the highest chroma energy; ties resolve to the lowest index.
    pub fn from_chroma(chroma: &[f32; 12]) -> Self {
        let mut best = 0usize;
        for (idx, value) in chroma.iter().enumerate().skip(1) {
            if *value > chroma[best] {
                best = idx;
            }
        }
        Self::ALL[best]
    }

    pub fn label(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Acoustic descriptors for one upload.
///
/// Field names are the persisted mapping keys read back by the vectorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet {
    pub duration: f32,
    pub tempo_bpm: f32,
    pub beat_times: Vec<f32>,
    pub key: PitchClass,
    pub spectral_centroid: f32,
    pub spectral_contrast: f32,
    pub zero_crossing_rate: f32,
    pub mfcc: [f32; MFCC_COUNT],
    pub rms_energy: f32,
    pub energy: f32,
    pub danceability: f32,
    pub valence: f32,
    pub acousticness: f32,
    pub instrumentalness: f32,
    pub liveness: f32,
}

#[cfg(test)]
impl DescriptorSet {
    /// Plausible descriptor set varying only in tempo and brightness.
    pub(crate) fn fixture(tempo_bpm: f32, spectral_centroid: f32) -> Self {
        let proxies = MoodProxies::derive(0.05, tempo_bpm, spectral_centroid, 20.0, 0.1);
        Self {
            duration: 30.0,
            tempo_bpm,
            beat_times: vec![0.5, 1.0, 1.5],
            key: PitchClass::A,
            spectral_centroid,
            spectral_contrast: 20.0,
            zero_crossing_rate: 0.1,
            mfcc: [-200.0, 40.0, -10.0, 5.0, 0.0, 1.0, -1.0, 2.0, 0.5, -0.5, 0.2, 0.1, 0.0],
            rms_energy: 0.05,
            energy: proxies.energy,
            danceability: proxies.danceability,
            valence: proxies.valence,
            acousticness: proxies.acousticness,
            instrumentalness: proxies.instrumentalness,
            liveness: 0.5,
        }
    }
}

/// Mood-style proxies derived from the raw measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MoodProxies {
    pub(crate) energy: f32,
    pub(crate) danceability: f32,
    pub(crate) valence: f32,
    pub(crate) acousticness: f32,
    pub(crate) instrumentalness: f32,
}

const ENERGY_RMS_SCALE: f32 = 0.1;
const DANCEABILITY_BPM_SCALE: f32 = 200.0;
const BRIGHTNESS_SCALE_HZ: f32 = 5000.0;

impl MoodProxies {
    pub(crate) fn derive(rms: f32, tempo_bpm: f32, centroid_hz: f32, contrast: f32, zcr: f32) -> Self {
        Self {
            energy: unit(rms / ENERGY_RMS_SCALE),
            danceability: unit(tempo_bpm / DANCEABILITY_BPM_SCALE),
            valence: unit(0.5 + centroid_hz / BRIGHTNESS_SCALE_HZ - contrast / BRIGHTNESS_SCALE_HZ),
            acousticness: unit(1.0 - centroid_hz / BRIGHTNESS_SCALE_HZ),
            instrumentalness: unit(1.0 - zcr),
        }
    }
}

fn unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}
