//! Persistence for uploads and their analyzed descriptors.

mod patch;
mod schema;
mod sqlite;

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::analysis::DescriptorSet;

pub use patch::{Patch, UploadPatch};
pub use sqlite::SqliteStore;

/// Default filename for the upload database inside the app directory.
pub const DB_FILE_NAME: &str = "soundalike.db";

/// Errors returned by the upload store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Upload {0} not found")]
    NotFound(i64),
    #[error("Database is busy, please retry")]
    Busy,
}

/// One stored upload with its linked external metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub id: i64,
    /// Stored filename inside the upload directory.
    pub filename: String,
    /// Name the file had when it was imported.
    pub original_name: String,
    /// Unix seconds.
    pub uploaded_at: i64,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub album_image_url: Option<String>,
    pub popularity: Option<u32>,
    pub preview_url: Option<String>,
    pub duration_ms: Option<u64>,
    /// Descriptor mapping, `None` until analyzed.
    pub features: Option<Value>,
    pub analysis_version: Option<String>,
}

impl UploadRecord {
    pub fn is_analyzed(&self) -> bool {
        self.features.is_some()
    }
}

/// Candidate row for ranking: an analyzed upload and its descriptor mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedUpload {
    pub id: i64,
    pub filename: String,
    pub external_id: Option<String>,
    pub features: Value,
}

/// Read/write access to uploads and descriptors used by ranking and analysis.
pub trait DescriptorStore {
    /// Fetch one upload, `None` if the id is unknown.
    fn upload(&self, id: i64) -> Result<Option<UploadRecord>, StoreError>;

    /// Every analyzed upload other than `id`, in ascending id order.
    fn analyzed_uploads_except(&self, id: i64) -> Result<Vec<AnalyzedUpload>, StoreError>;

    /// Replace the descriptor of `id` in a single write.
    fn set_descriptor(&self, id: i64, descriptors: &DescriptorSet) -> Result<(), StoreError>;
}
