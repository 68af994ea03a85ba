//! Command-line surface: argument parsing and command dispatch.
//!
//! Command output is JSON on stdout; logs go to stderr and the log file.

mod commands;
mod parse;

use thiserror::Error;

use crate::app_dirs::AppDirError;
use crate::config::ConfigError;
use crate::jobs::JobError;
use crate::metadata::EnrichmentError;
use crate::recommend::RecommendError;
use crate::store::StoreError;
use crate::uploads::UploadError;

pub use commands::run;
pub use parse::{CliOptions, Command, GlobalOptions, ManualLink, help_text, parse_args};

/// Errors surfaced by the command-line tool.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Recommend(#[from] RecommendError),
    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),
    #[error("No tracks found for \"{0}\"")]
    NoSearchResults(String),
    #[error("{failed} of {total} analysis job(s) failed")]
    AnalysisFailed { failed: usize, total: usize },
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit status for this error: 2 for usage errors, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) => 2,
            _ => 1,
        }
    }
}
