pub(super) const MAX_ANALYSIS_WORKER_COUNT: u32 = 64;

pub(super) fn clamp_analysis_worker_count(value: u32) -> u32 {
    value.min(MAX_ANALYSIS_WORKER_COUNT)
}

pub(super) fn default_analysis_worker_count() -> u32 {
    0
}

pub(super) fn default_k() -> i64 {
    5
}

pub(super) fn default_max_popularity() -> u32 {
    100
}

pub(super) fn default_per_page() -> usize {
    10
}

pub(super) fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

pub(super) fn default_auth_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

pub(super) fn default_timeout_ms() -> u64 {
    10_000
}

pub(super) fn default_cache_capacity() -> usize {
    512
}

pub(super) fn default_max_attempts() -> usize {
    3
}
