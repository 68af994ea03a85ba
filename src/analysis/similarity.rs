//! Cosine similarity and stable top-k ranking over feature vectors.

use super::vector::FeatureVector;

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult<Id> {
    pub id: Id,
    pub score: f32,
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either vector has zero magnitude, the lengths differ, or the
/// result would not be finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !score.is_finite() {
        return 0.0;
    }
    let score = score.clamp(-1.0, 1.0) as f32;
    // Scores that underflow to -0.0 must tie with 0.0 under `total_cmp`.
    if score == 0.0 { 0.0 } else { score }
}

/// Similarity between two optional vectors; absent vectors score 0.0.
pub fn similarity(a: Option<&FeatureVector>, b: Option<&FeatureVector>) -> f32 {
    match (a, b) {
        (Some(a), Some(b)) => cosine_similarity(a.as_slice(), b.as_slice()),
        _ => 0.0,
    }
}

/// Score every candidate against `query` and keep the best `k`.
///
/// Ties keep candidate order. `k <= 0` yields nothing; `k` larger than the pool
/// yields every candidate.
pub fn top_k<Id: Clone>(
    query: Option<&FeatureVector>,
    candidates: &[(Id, Option<FeatureVector>)],
    k: i64,
) -> Vec<SimilarityResult<Id>> {
    if k <= 0 {
        return Vec::new();
    }
    let mut scored: Vec<SimilarityResult<Id>> = candidates
        .iter()
        .map(|(id, vector)| SimilarityResult {
            id: id.clone(),
            score: similarity(query, vector.as_ref()),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    let k = usize::try_from(k).unwrap_or(usize::MAX);
    scored.truncate(k);
    scored
}
