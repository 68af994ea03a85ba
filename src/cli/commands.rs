use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::parse::{CliOptions, Command, GlobalOptions, ManualLink};
use super::CliError;
use crate::analysis::DescriptorSet;
use crate::app_dirs;
use crate::config::{self, AppSettings};
use crate::jobs::{AnalysisPool, JobError, resolve_worker_count};
use crate::metadata::{CachedMetadataProvider, MetadataProvider, SpotifyProvider};
use crate::recommend::{RecommendationQuery, recommend, similar_uploads};
use crate::store::{DescriptorStore, Patch, SqliteStore, StoreError, UploadPatch, UploadRecord};
use crate::uploads::import_upload;

/// Web URL used for manual links that do not name one.
const TRACK_URL_PREFIX: &str = "https://open.spotify.com/track/";

struct Context {
    settings: AppSettings,
    config_path: PathBuf,
    database_path: PathBuf,
    upload_dir: PathBuf,
}

impl Context {
    fn resolve(global: &GlobalOptions) -> Result<Self, CliError> {
        let config_path = match &global.config_path {
            Some(path) => path.clone(),
            None => config::config_path()?,
        };
        let settings = config::load_settings_from(&config_path)?;
        let database_path = match global
            .db_path
            .clone()
            .or_else(|| settings.storage.database_path.clone())
        {
            Some(path) => path,
            None => app_dirs::default_database_path()?,
        };
        let upload_dir = match global
            .upload_dir
            .clone()
            .or_else(|| settings.storage.upload_dir.clone())
        {
            Some(path) => path,
            None => app_dirs::default_upload_dir()?,
        };
        Ok(Self {
            settings,
            config_path,
            database_path,
            upload_dir,
        })
    }

    fn open_store(&self) -> Result<SqliteStore, CliError> {
        Ok(SqliteStore::open(&self.database_path)?)
    }

    fn metadata_provider(&self) -> CachedMetadataProvider<SpotifyProvider> {
        let settings = &self.settings.metadata;
        CachedMetadataProvider::new(SpotifyProvider::from_settings(settings), settings.cache_capacity)
    }
}

/// Execute a parsed command, writing its JSON result to `out`.
pub fn run(options: CliOptions, out: &mut impl Write) -> Result<(), CliError> {
    let context = Context::resolve(&options.global)?;
    match options.command {
        Command::Upload { files } => {
            let store = context.open_store()?;
            let stored = files
                .iter()
                .map(|file| import_upload(&store, &context.upload_dir, file))
                .collect::<Result<Vec<_>, _>>()?;
            emit(out, &stored)
        }
        Command::List => {
            let store = context.open_store()?;
            emit(out, &store.list_uploads()?)
        }
        Command::Analyze { ids, all, workers } => analyze(&context, ids, all, workers, out),
        Command::Recommend {
            upload_id,
            k,
            max_popularity,
            page,
            per_page,
        } => {
            let store = context.open_store()?;
            let mut query =
                RecommendationQuery::with_settings(upload_id, &context.settings.recommendations);
            if let Some(k) = k {
                query.k = k;
            }
            if let Some(max_popularity) = max_popularity {
                query.max_popularity = max_popularity;
            }
            if let Some(page) = page {
                query.page = page;
            }
            if let Some(per_page) = per_page {
                query.per_page = per_page;
            }
            let provider = context.metadata_provider();
            emit(out, &recommend(&store, &provider, &query)?)
        }
        Command::Similar { upload_id, k } => {
            let store = context.open_store()?;
            let k = k.unwrap_or(context.settings.recommendations.default_k);
            let similar = similar_uploads(&store, upload_id, k)?;
            emit(out, &json!({"upload_id": upload_id, "similar": similar}))
        }
        Command::Link {
            upload_id,
            external_id,
            fetch,
            manual,
        } => {
            let store = context.open_store()?;
            let patch = if fetch {
                let track = context.metadata_provider().track(&external_id)?;
                UploadPatch::from_metadata(&track)
            } else {
                manual_patch(&external_id, manual)
            };
            emit(out, &link(&store, upload_id, &patch)?)
        }
        Command::LinkSearch { upload_id, query } => {
            let store = context.open_store()?;
            if store.upload(upload_id)?.is_none() {
                return Err(StoreError::NotFound(upload_id).into());
            }
            let results = context.metadata_provider().search(&query, 1)?;
            let Some(best) = results.into_iter().next() else {
                return Err(CliError::NoSearchResults(query));
            };
            let record = link(&store, upload_id, &UploadPatch::from_metadata(&best))?;
            emit(out, &json!({"upload_id": upload_id, "track": best, "upload": record}))
        }
        Command::Search { query, limit } => {
            let results = context.metadata_provider().search(&query, limit)?;
            emit(out, &json!({"query": query, "results": results}))
        }
        Command::Config { init } => {
            if init {
                config::save_settings_to_path(&context.settings, &context.config_path)?;
                info!("Wrote settings to {}", context.config_path.display());
            }
            emit(
                out,
                &json!({
                    "path": context.config_path,
                    "database_path": context.database_path,
                    "upload_dir": context.upload_dir,
                    "settings": context.settings,
                }),
            )
        }
    }
}

#[derive(Serialize)]
struct AnalyzeReport {
    upload_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<DescriptorSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn analyze(
    context: &Context,
    ids: Vec<i64>,
    all: bool,
    workers: Option<u32>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut ids = ids;
    if all {
        let store = context.open_store()?;
        for pending in store.pending_upload_ids()? {
            if !ids.contains(&pending) {
                ids.push(pending);
            }
        }
    }
    if ids.is_empty() {
        return emit(out, &Vec::<AnalyzeReport>::new());
    }
    let configured = workers.unwrap_or(context.settings.analysis.worker_count);
    let worker_count = resolve_worker_count(configured).min(ids.len());
    let mut pool = AnalysisPool::start(
        context.database_path.clone(),
        context.upload_dir.clone(),
        u32::try_from(worker_count).unwrap_or(1),
    )?;
    let tickets = ids
        .iter()
        .map(|&id| pool.submit(id))
        .collect::<Result<Vec<_>, JobError>>()?;
    let reports: Vec<AnalyzeReport> = tickets
        .into_iter()
        .map(|ticket| {
            let upload_id = ticket.upload_id();
            match ticket.wait() {
                Ok(outcome) => AnalyzeReport {
                    upload_id,
                    features: Some(outcome.descriptors),
                    error: None,
                },
                Err(err) => AnalyzeReport {
                    upload_id,
                    features: None,
                    error: Some(err.to_string()),
                },
            }
        })
        .collect();
    pool.shutdown();
    let failed = reports.iter().filter(|report| report.error.is_some()).count();
    emit(out, &reports)?;
    if failed > 0 {
        return Err(CliError::AnalysisFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

fn manual_patch(external_id: &str, manual: ManualLink) -> UploadPatch {
    let external_url = manual
        .external_url
        .unwrap_or_else(|| format!("{TRACK_URL_PREFIX}{external_id}"));
    UploadPatch {
        external_id: Patch::Set(external_id.to_string()),
        external_url: Patch::Set(external_url),
        track_name: set_if_some(manual.track_name),
        artist_name: set_if_some(manual.artist_name),
        album_name: set_if_some(manual.album_name),
        album_image_url: set_if_some(manual.album_image_url),
        popularity: set_if_some(manual.popularity),
        preview_url: set_if_some(manual.preview_url),
        duration_ms: set_if_some(manual.duration_ms),
    }
}

fn set_if_some<T>(value: Option<T>) -> Patch<T> {
    value.map_or(Patch::Keep, Patch::Set)
}

fn link(store: &SqliteStore, upload_id: i64, patch: &UploadPatch) -> Result<UploadRecord, CliError> {
    store.apply_patch(upload_id, patch)?;
    store
        .upload(upload_id)?
        .ok_or_else(|| StoreError::NotFound(upload_id).into())
}

fn emit<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
