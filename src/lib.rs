//! Audio-similarity recommendations for uploaded tracks.
//!
//! Uploads are decoded and analyzed into acoustic descriptors, vectorized,
//! ranked by cosine similarity and enriched with external track metadata.

/// Decoding, descriptor extraction, vectorization and ranking.
pub mod analysis;
/// Application directory helpers.
pub mod app_dirs;
/// Command-line parsing and dispatch.
pub mod cli;
/// TOML settings.
pub mod config;
pub(crate) mod http_client;
/// Background analysis workers.
pub mod jobs;
/// Logging setup.
pub mod logging;
/// External track metadata.
pub mod metadata;
/// Recommendation assembly.
pub mod recommend;
/// Upload and descriptor persistence.
pub mod store;
/// Importing audio files.
pub mod uploads;
