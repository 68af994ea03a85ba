use rusqlite::types::Value as SqlValue;

use crate::metadata::TrackMetadata;

/// Explicit partial-update instruction for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the stored value untouched.
    #[default]
    Keep,
    /// Reset the stored value to null.
    Clear,
    /// Overwrite with a value; empty strings and zeros are ordinary values.
    Set(T),
}

impl<T> Patch<T> {
    /// `Set` for `Some`, `Clear` for `None`.
    pub fn replace_with(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        }
    }
}

/// Partial update of an upload's external metadata link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPatch {
    pub external_id: Patch<String>,
    pub external_url: Patch<String>,
    pub track_name: Patch<String>,
    pub artist_name: Patch<String>,
    pub album_name: Patch<String>,
    pub album_image_url: Patch<String>,
    pub popularity: Patch<u32>,
    pub preview_url: Patch<String>,
    pub duration_ms: Patch<u64>,
}

impl UploadPatch {
    /// Link every field to `metadata`, clearing fields it lacks.
    pub fn from_metadata(metadata: &TrackMetadata) -> Self {
        Self {
            external_id: Patch::Set(metadata.id.clone()),
            external_url: Patch::replace_with(metadata.external_url.clone()),
            track_name: Patch::replace_with(metadata.name.clone()),
            artist_name: Patch::replace_with(metadata.artist.clone()),
            album_name: Patch::replace_with(metadata.album.clone()),
            album_image_url: Patch::replace_with(metadata.album_image_url.clone()),
            popularity: Patch::replace_with(metadata.popularity),
            preview_url: Patch::replace_with(metadata.preview_url.clone()),
            duration_ms: Patch::replace_with(metadata.duration_ms),
        }
    }

    /// Column/value pairs for every field that is not `Keep`.
    pub(super) fn assignments(&self) -> Vec<(&'static str, SqlValue)> {
        let mut out = Vec::new();
        push_text(&mut out, "external_id", &self.external_id);
        push_text(&mut out, "external_url", &self.external_url);
        push_text(&mut out, "track_name", &self.track_name);
        push_text(&mut out, "artist_name", &self.artist_name);
        push_text(&mut out, "album_name", &self.album_name);
        push_text(&mut out, "album_image_url", &self.album_image_url);
        push_integer(&mut out, "popularity", &self.popularity.clone().map(i64::from));
        push_text(&mut out, "preview_url", &self.preview_url);
        push_integer(
            &mut out,
            "duration_ms",
            &self.duration_ms.clone().map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
        );
        out
    }
}

impl<T> Patch<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Keep => Patch::Keep,
            Patch::Clear => Patch::Clear,
            Patch::Set(value) => Patch::Set(f(value)),
        }
    }
}

fn push_text(out: &mut Vec<(&'static str, SqlValue)>, column: &'static str, patch: &Patch<String>) {
    match patch {
        Patch::Keep => {}
        Patch::Clear => out.push((column, SqlValue::Null)),
        Patch::Set(text) => out.push((column, SqlValue::Text(text.clone()))),
    }
}

fn push_integer(out: &mut Vec<(&'static str, SqlValue)>, column: &'static str, patch: &Patch<i64>) {
    match patch {
        Patch::Keep => {}
        Patch::Clear => out.push((column, SqlValue::Null)),
        Patch::Set(value) => out.push((column, SqlValue::Integer(*value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patch_keeps_everything() {
        assert!(UploadPatch::default().assignments().is_empty());
    }

    #[test]
    fn empty_string_and_zero_are_written() {
        let patch = UploadPatch {
            track_name: Patch::Set(String::new()),
            popularity: Patch::Set(0),
            ..UploadPatch::default()
        };
        let assignments = patch.assignments();
        assert_eq!(
            assignments,
            vec![
                ("track_name", SqlValue::Text(String::new())),
                ("popularity", SqlValue::Integer(0)),
            ]
        );
    }

    #[test]
    fn metadata_link_clears_missing_fields() {
        let metadata = TrackMetadata {
            id: "abc".into(),
            name: Some("Song".into()),
            ..TrackMetadata::default()
        };
        let patch = UploadPatch::from_metadata(&metadata);
        assert_eq!(patch.external_id, Patch::Set("abc".into()));
        assert_eq!(patch.track_name, Patch::Set("Song".into()));
        assert_eq!(patch.popularity, Patch::Clear);
        assert_eq!(patch.assignments().len(), 9);
    }
}
