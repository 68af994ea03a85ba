//! Ranked, enriched and paginated recommendations for an analyzed upload.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::{FeatureVector, top_k, vectorize};
use crate::config::RecommendationSettings;
use crate::metadata::{MetadataProvider, TrackMetadata};
use crate::store::{AnalyzedUpload, DescriptorStore, StoreError};


/// Errors surfaced to callers asking for recommendations.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Upload {0} not found")]
    NotFound(i64),
    #[error("Upload {0} has not been analyzed yet")]
    NotAnalyzed(i64),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters of one recommendation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationQuery {
    pub upload_id: i64,
    /// Number of nearest candidates considered before filtering.
    pub k: i64,
    /// Results whose metadata popularity exceeds this are dropped.
    pub max_popularity: i64,
    /// 1-indexed page number.
    pub page: usize,
    pub per_page: usize,
}

impl RecommendationQuery {
    /// Query for `upload_id` with the built-in defaults.
    pub fn new(upload_id: i64) -> Self {
        Self::with_settings(upload_id, &RecommendationSettings::default())
    }

    /// Query for `upload_id` with defaults taken from settings.
    pub fn with_settings(upload_id: i64, settings: &RecommendationSettings) -> Self {
        Self {
            upload_id,
            k: settings.default_k,
            max_popularity: i64::from(settings.default_max_popularity),
            page: 1,
            per_page: settings.default_per_page,
        }
    }
}

/// One ranked candidate with its optional external metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: i64,
    pub similarity: f32,
    pub metadata: Option<TrackMetadata>,
}

/// One page of recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationPage {
    pub query_id: i64,
    pub recommendations: Vec<Recommendation>,
    pub page: usize,
    pub per_page: usize,
    /// Results surviving the popularity filter, across all pages.
    pub total: usize,
}

/// Plain similarity listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarUpload {
    pub id: i64,
    pub filename: String,
    pub score: f32,
}

/// Rank, enrich, filter and paginate recommendations for `query.upload_id`.
///
/// Filtering happens after ranking, so `k` bounds the considered set rather
/// than the number of survivors. Metadata lookup failures degrade to `null`.
pub fn recommend<S, M>(
    store: &S,
    metadata: &M,
    query: &RecommendationQuery,
) -> Result<RecommendationPage, RecommendError>
where
    S: DescriptorStore + ?Sized,
    M: MetadataProvider + ?Sized,
{
    if query.page == 0 {
        return Err(RecommendError::InvalidQuery("page must be at least 1".into()));
    }
    if query.per_page == 0 {
        return Err(RecommendError::InvalidQuery("per_page must be at least 1".into()));
    }
    let (query_vector, candidates) = ranking_inputs(store, query.upload_id)?;
    if candidates.is_empty() {
        return Ok(RecommendationPage {
            query_id: query.upload_id,
            recommendations: Vec::new(),
            page: 1,
            per_page: usize::try_from(query.k.max(0)).unwrap_or(usize::MAX),
            total: 0,
        });
    }

    let pool = candidate_pool(&candidates);
    let ranked = top_k(query_vector.as_ref(), &pool, query.k);
    let survivors: Vec<Recommendation> = ranked
        .into_iter()
        .map(|result| {
            let candidate = &candidates[result.id];
            Recommendation {
                id: candidate.id,
                similarity: result.score,
                metadata: enrich(metadata, candidate),
            }
        })
        .filter(|item| within_popularity(item.metadata.as_ref(), query.max_popularity))
        .collect();

    let total = survivors.len();
    let start = (query.page - 1).saturating_mul(query.per_page);
    let recommendations: Vec<Recommendation> = survivors
        .into_iter()
        .skip(start)
        .take(query.per_page)
        .collect();
    debug!(
        upload_id = query.upload_id,
        total,
        returned = recommendations.len(),
        "Assembled recommendations"
    );
    Ok(RecommendationPage {
        query_id: query.upload_id,
        recommendations,
        page: query.page,
        per_page: query.per_page,
        total,
    })
}

/// Top `k` most similar analyzed uploads with their filenames.
pub fn similar_uploads<S>(store: &S, upload_id: i64, k: i64) -> Result<Vec<SimilarUpload>, RecommendError>
where
    S: DescriptorStore + ?Sized,
{
    let (query_vector, candidates) = ranking_inputs(store, upload_id)?;
    let pool = candidate_pool(&candidates);
    Ok(top_k(query_vector.as_ref(), &pool, k)
        .into_iter()
        .map(|result| {
            let candidate = &candidates[result.id];
            SimilarUpload {
                id: candidate.id,
                filename: candidate.filename.clone(),
                score: result.score,
            }
        })
        .collect())
}

fn ranking_inputs<S>(
    store: &S,
    upload_id: i64,
) -> Result<(Option<FeatureVector>, Vec<AnalyzedUpload>), RecommendError>
where
    S: DescriptorStore + ?Sized,
{
    let record = store
        .upload(upload_id)?
        .ok_or(RecommendError::NotFound(upload_id))?;
    let features = record
        .features
        .ok_or(RecommendError::NotAnalyzed(upload_id))?;
    let candidates = store.analyzed_uploads_except(upload_id)?;
    Ok((vectorize(&features), candidates))
}

/// Candidates keyed by their position so ranked results map back cheaply.
fn candidate_pool(candidates: &[AnalyzedUpload]) -> Vec<(usize, Option<FeatureVector>)> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| (index, vectorize(&candidate.features)))
        .collect()
}

fn enrich<M: MetadataProvider + ?Sized>(
    metadata: &M,
    candidate: &AnalyzedUpload,
) -> Option<TrackMetadata> {
    let external_id = candidate.external_id.as_deref()?;
    match metadata.track(external_id) {
        Ok(track) => Some(track),
        Err(err) => {
            warn!(
                upload_id = candidate.id,
                external_id, "Metadata lookup failed: {err}"
            );
            None
        }
    }
}

fn within_popularity(metadata: Option<&TrackMetadata>, max_popularity: i64) -> bool {
    metadata
        .and_then(|track| track.popularity)
        .is_none_or(|popularity| i64::from(popularity) <= max_popularity)
}
