use rusqlite::Connection;

use super::StoreError;
use super::sqlite::map_sql_error;

pub(super) fn apply_pragmas(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
        )
        .map_err(map_sql_error)
}

pub(super) fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS uploads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                original_name TEXT NOT NULL DEFAULT '',
                uploaded_at INTEGER NOT NULL,
                external_id TEXT,
                external_url TEXT,
                track_name TEXT,
                artist_name TEXT,
                album_name TEXT,
                album_image_url TEXT,
                popularity INTEGER,
                preview_url TEXT,
                duration_ms INTEGER,
                descriptor TEXT,
                analysis_version TEXT,
                analyzed_at INTEGER
             );
             CREATE INDEX IF NOT EXISTS idx_uploads_analyzed
                ON uploads (id) WHERE descriptor IS NOT NULL;
             CREATE INDEX IF NOT EXISTS idx_uploads_external_id
                ON uploads (external_id);",
        )
        .map_err(map_sql_error)
}
