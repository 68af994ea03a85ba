//! External track metadata: lookups, search and a bounded lookup cache.

mod cache;
mod spotify;

use serde::{Deserialize, Serialize};

pub use cache::{CachedMetadataProvider, LruCache};
pub use spotify::SpotifyProvider;

/// Normalized metadata for one external track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub id: String,
    pub name: Option<String>,
    /// Artist names joined with `", "`.
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_image_url: Option<String>,
    /// 0-100 when the service reports it.
    pub popularity: Option<u32>,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Errors raised while talking to the metadata service.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Metadata client credentials are not configured")]
    MissingCredentials,
    #[error("Metadata service returned HTTP {status}")]
    Http { status: u16 },
    #[error("Metadata request failed: {0}")]
    Transport(String),
    #[error("Invalid metadata response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid metadata endpoint {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Source of external track metadata.
pub trait MetadataProvider {
    /// Look up one track by its external id.
    fn track(&self, id: &str) -> Result<TrackMetadata, EnrichmentError>;

    /// Free-text track search returning at most `limit` results.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, EnrichmentError>;
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for &P {
    fn track(&self, id: &str) -> Result<TrackMetadata, EnrichmentError> {
        (**self).track(id)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, EnrichmentError> {
        (**self).search(query, limit)
    }
}
