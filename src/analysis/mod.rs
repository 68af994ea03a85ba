//! Audio analysis pipeline: decoding, descriptor extraction, vectorization and ranking.

mod analyzer;
pub mod audio;
mod descriptor;
pub(crate) mod fft;
pub(crate) mod frequency_domain;
pub(crate) mod rhythm;
pub mod similarity;
pub(crate) mod time_domain;
pub mod vector;
pub mod version;

pub use analyzer::{AnalysisError, analyze, analyze_with_rng};
pub use audio::{AudioSample, DecodeError, decode_bytes, decode_file};
pub use descriptor::{DescriptorSet, PitchClass};
pub use similarity::{SimilarityResult, cosine_similarity, similarity, top_k};
pub use vector::{FEATURE_VECTOR_LEN, FeatureVector, vectorize};
