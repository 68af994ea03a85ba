//! Importing audio files into the upload directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::store::{SqliteStore, StoreError};

/// Errors raised while storing a new upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0} has no file name")]
    MissingFileName(PathBuf),
    #[error("Failed to copy {path}: {source}")]
    Copy { path: PathBuf, source: io::Error },
    #[error("Failed to create upload directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A file that was copied into the upload directory and recorded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredUpload {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
}

/// Stored name for an incoming file: `<uuid>_<basename>`.
pub fn stored_file_name(original_name: &str) -> String {
    format!("{}_{}", uuid::Uuid::new_v4(), original_name)
}

/// Copy `source` into `upload_dir` under a unique name and record the upload.
///
/// The copy is written to a temporary file first and renamed into place, so
/// readers never see a partial file.
pub fn import_upload(
    store: &SqliteStore,
    upload_dir: &Path,
    source: &Path,
) -> Result<StoredUpload, UploadError> {
    let original_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| UploadError::MissingFileName(source.to_path_buf()))?;
    fs::create_dir_all(upload_dir).map_err(|source| UploadError::CreateDir {
        path: upload_dir.to_path_buf(),
        source,
    })?;
    let filename = stored_file_name(&original_name);
    let destination = upload_dir.join(&filename);
    copy_atomically(source, upload_dir, &destination)?;
    let id = store.insert_upload(&filename, &original_name)?;
    info!(id, filename, "Stored upload");
    Ok(StoredUpload {
        id,
        filename,
        original_name,
    })
}

fn copy_atomically(source: &Path, upload_dir: &Path, destination: &Path) -> Result<(), UploadError> {
    let copy_err = |err: io::Error| UploadError::Copy {
        path: source.to_path_buf(),
        source: err,
    };
    let mut input = fs::File::open(source).map_err(copy_err)?;
    let mut temp = tempfile::NamedTempFile::new_in(upload_dir).map_err(copy_err)?;
    io::copy(&mut input, temp.as_file_mut()).map_err(copy_err)?;
    temp.as_file().sync_all().map_err(copy_err)?;
    temp.persist(destination)
        .map_err(|err| copy_err(err.error))?;
    Ok(())
}
