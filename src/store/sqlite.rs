use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use time::OffsetDateTime;
use tracing::debug;

use super::schema::{apply_pragmas, apply_schema};
use super::{AnalyzedUpload, DescriptorStore, StoreError, UploadPatch, UploadRecord};
use crate::analysis::DescriptorSet;
use crate::analysis::version::{
    analysis_version, decode_features, encode_descriptor, stored_analysis_version,
};

const UPLOAD_COLUMNS: &str = "id, filename, original_name, uploaded_at, external_id, external_url,
     track_name, artist_name, album_name, album_image_url, popularity, preview_url,
     duration_ms, descriptor, analysis_version";

/// SQLite-backed upload and descriptor store.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating its parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        create_parent_if_needed(path)?;
        let connection = Connection::open(path)?;
        let store = Self { connection };
        store.prepare()?;
        debug!("Opened database {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            connection: Connection::open_in_memory()?,
        };
        store.prepare()?;
        Ok(store)
    }

    fn prepare(&self) -> Result<(), StoreError> {
        apply_pragmas(&self.connection)?;
        apply_schema(&self.connection)
    }

    /// Record a newly stored upload and return its id.
    pub fn insert_upload(&self, filename: &str, original_name: &str) -> Result<i64, StoreError> {
        let uploaded_at = OffsetDateTime::now_utc().unix_timestamp();
        self.connection
            .execute(
                "INSERT INTO uploads (filename, original_name, uploaded_at) VALUES (?1, ?2, ?3)",
                params![filename, original_name, uploaded_at],
            )
            .map_err(map_sql_error)?;
        let id = self.connection.last_insert_rowid();
        debug!(id, filename, "Inserted upload");
        Ok(id)
    }

    /// All uploads in ascending id order.
    pub fn list_uploads(&self) -> Result<Vec<UploadRecord>, StoreError> {
        let mut stmt = self
            .connection
            .prepare(&format!("SELECT {UPLOAD_COLUMNS} FROM uploads ORDER BY id ASC"))
            .map_err(map_sql_error)?;
        let rows = stmt.query_map([], map_upload_row).map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    /// Ids of uploads with no descriptor, or one produced by other analysis parameters.
    pub fn pending_upload_ids(&self) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self
            .connection
            .prepare(
                "SELECT id, descriptor, analysis_version FROM uploads
                 WHERE descriptor IS NULL OR analysis_version IS NULL OR analysis_version != ?1
                 ORDER BY id ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![analysis_version()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(map_sql_error)?;
        let mut pending = Vec::new();
        for row in rows {
            let (id, descriptor, version) = row.map_err(map_sql_error)?;
            if needs_analysis(descriptor.as_deref(), version.as_deref()) {
                pending.push(id);
            }
        }
        Ok(pending)
    }

    /// Write every non-`Keep` field of `patch` to upload `id`.
    pub fn apply_patch(&self, id: i64, patch: &UploadPatch) -> Result<(), StoreError> {
        let assignments = patch.assignments();
        if assignments.is_empty() {
            return match self.upload(id)? {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound(id)),
            };
        }
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(index, (column, _))| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE uploads SET {set_clause} WHERE id = ?{}",
            assignments.len() + 1
        );
        let mut values: Vec<rusqlite::types::Value> =
            assignments.into_iter().map(|(_, value)| value).collect();
        values.push(rusqlite::types::Value::Integer(id));
        let changed = self
            .connection
            .execute(&sql, params_from_iter(values))
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

impl DescriptorStore for SqliteStore {
    fn upload(&self, id: i64) -> Result<Option<UploadRecord>, StoreError> {
        self.connection
            .query_row(
                &format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?1"),
                params![id],
                map_upload_row,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn analyzed_uploads_except(&self, id: i64) -> Result<Vec<AnalyzedUpload>, StoreError> {
        let mut stmt = self
            .connection
            .prepare(
                "SELECT id, filename, external_id, descriptor FROM uploads
                 WHERE descriptor IS NOT NULL AND id != ?1
                 ORDER BY id ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![id], |row| {
                let descriptor: String = row.get(3)?;
                Ok(AnalyzedUpload {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    external_id: row.get(2)?,
                    features: decode_features(&descriptor),
                })
            })
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn set_descriptor(&self, id: i64, descriptors: &DescriptorSet) -> Result<(), StoreError> {
        let encoded = encode_descriptor(descriptors)?;
        let analyzed_at = OffsetDateTime::now_utc().unix_timestamp();
        let changed = self
            .connection
            .execute(
                "UPDATE uploads SET descriptor = ?1, analysis_version = ?2, analyzed_at = ?3
                 WHERE id = ?4",
                params![encoded, analysis_version(), analyzed_at, id],
            )
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "Stored descriptor");
        Ok(())
    }
}

fn map_upload_row(row: &Row<'_>) -> rusqlite::Result<UploadRecord> {
    let popularity: Option<i64> = row.get(10)?;
    let duration_ms: Option<i64> = row.get(12)?;
    let descriptor: Option<String> = row.get(13)?;
    Ok(UploadRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_name: row.get(2)?,
        uploaded_at: row.get(3)?,
        external_id: row.get(4)?,
        external_url: row.get(5)?,
        track_name: row.get(6)?,
        artist_name: row.get(7)?,
        album_name: row.get(8)?,
        album_image_url: row.get(9)?,
        popularity: popularity.and_then(|value| u32::try_from(value).ok()),
        preview_url: row.get(11)?,
        duration_ms: duration_ms.and_then(|value| u64::try_from(value).ok()),
        features: descriptor.as_deref().map(decode_features),
        analysis_version: row.get(14)?,
    })
}

/// Rows without a version column fall back to the version inside the envelope.
fn needs_analysis(descriptor: Option<&str>, version: Option<&str>) -> bool {
    let Some(text) = descriptor else {
        return true;
    };
    let recorded = match version {
        Some(version) => Some(version.to_string()),
        None => stored_analysis_version(text),
    };
    recorded.as_deref() != Some(analysis_version())
}

fn create_parent_if_needed(path: &Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })
}

pub(super) fn map_sql_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.code == rusqlite::ErrorCode::DatabaseBusy =>
        {
            StoreError::Busy
        }
        other => StoreError::Sql(other),
    }
}
