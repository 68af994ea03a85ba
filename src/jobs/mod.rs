//! Background analysis of stored uploads.
//!
//! Each job decodes one upload, analyzes it and writes the descriptor in a
//! single statement. A job that is cancelled before that write leaves the
//! stored descriptor untouched.

mod pool;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::info;

use crate::analysis::{AnalysisError, DecodeError, DescriptorSet, analyze, decode_file};
use crate::store::{DescriptorStore, StoreError};

pub use pool::{AnalysisPool, AnalysisTicket, resolve_worker_count};

/// Errors produced while running an analysis job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Upload {0} not found")]
    NotFound(i64),
    #[error("Could not read audio at {path}: {source}")]
    ReadAudio { path: PathBuf, source: DecodeError },
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Analysis of upload {0} was cancelled")]
    Cancelled(i64),
    #[error("Analysis worker exited before reporting a result")]
    WorkerGone,
}

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub upload_id: i64,
    pub descriptors: DescriptorSet,
}

/// Decode, analyze and persist one upload stored under `upload_dir`.
pub fn analyze_upload<S>(
    store: &S,
    upload_dir: &Path,
    upload_id: i64,
    cancel: &AtomicBool,
) -> Result<AnalysisOutcome, JobError>
where
    S: DescriptorStore + ?Sized,
{
    let record = store
        .upload(upload_id)?
        .ok_or(JobError::NotFound(upload_id))?;
    ensure_not_cancelled(cancel, upload_id)?;
    let path = upload_dir.join(&record.filename);
    let sample = decode_file(&path).map_err(|source| JobError::ReadAudio {
        path: path.clone(),
        source,
    })?;
    ensure_not_cancelled(cancel, upload_id)?;
    let descriptors = analyze(&sample)?;
    ensure_not_cancelled(cancel, upload_id)?;
    store.set_descriptor(upload_id, &descriptors)?;
    info!(
        upload_id,
        tempo_bpm = descriptors.tempo_bpm,
        key = %descriptors.key,
        "Analyzed upload"
    );
    Ok(AnalysisOutcome {
        upload_id,
        descriptors,
    })
}

fn ensure_not_cancelled(cancel: &AtomicBool, upload_id: i64) -> Result<(), JobError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(JobError::Cancelled(upload_id));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Write a mono 16-bit sine WAV.
    pub(crate) fn write_sine_wav(path: &Path, freq_hz: f32, seconds: f32, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (seconds * sample_rate as f32) as usize;
        for i in 0..total {
            let t = i as f32 / sample_rate as f32;
            let value = (2.0 * std::f32::consts::PI * freq_hz * t).sin() * 0.5;
            writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::write_sine_wav;
    use super::*;
    use crate::analysis::PitchClass;
    use crate::store::SqliteStore;
    use tempfile::tempdir;

    #[test]
    fn analysis_persists_descriptor() {
        let dir = tempdir().unwrap();
        write_sine_wav(&dir.path().join("tone.wav"), 440.0, 1.0, 22_050);
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_upload("tone.wav", "tone.wav").unwrap();

        let outcome = analyze_upload(&store, dir.path(), id, &AtomicBool::new(false)).unwrap();
        assert_eq!(outcome.upload_id, id);
        assert_eq!(outcome.descriptors.key, PitchClass::A);

        let record = store.upload(id).unwrap().unwrap();
        let stored: DescriptorSet = serde_json::from_value(record.features.unwrap()).unwrap();
        assert_eq!(stored, outcome.descriptors);
    }

    #[test]
    fn cancelled_job_never_writes() {
        let dir = tempdir().unwrap();
        write_sine_wav(&dir.path().join("tone.wav"), 440.0, 0.5, 22_050);
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_upload("tone.wav", "tone.wav").unwrap();

        let err = analyze_upload(&store, dir.path(), id, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, JobError::Cancelled(cancelled) if cancelled == id));
        assert!(!store.upload(id).unwrap().unwrap().is_analyzed());
    }

    #[test]
    fn missing_audio_file_reports_path() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_upload("missing.wav", "missing.wav").unwrap();
        let err = analyze_upload(&store, dir.path(), id, &AtomicBool::new(false)).unwrap_err();
        match err {
            JobError::ReadAudio { path, .. } => assert_eq!(path, dir.path().join("missing.wav")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_upload_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let err = analyze_upload(&store, dir.path(), 12, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, JobError::NotFound(12)));
    }

    #[test]
    fn empty_audio_is_rejected_without_writing() {
        let dir = tempdir().unwrap();
        write_sine_wav(&dir.path().join("empty.wav"), 440.0, 0.0, 22_050);
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_upload("empty.wav", "empty.wav").unwrap();
        let err = analyze_upload(&store, dir.path(), id, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(
            err,
            JobError::ReadAudio {
                source: DecodeError::Empty,
                ..
            }
        ));
        assert!(!store.upload(id).unwrap().unwrap().is_analyzed());
    }
}
