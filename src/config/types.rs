use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::{
    clamp_analysis_worker_count, default_analysis_worker_count, default_api_base_url,
    default_auth_url, default_cache_capacity, default_k, default_max_attempts,
    default_max_popularity, default_per_page, default_timeout_ms,
};

/// Environment variable holding the metadata client id when the config omits it.
pub const CLIENT_ID_ENV: &str = "SPOTIPY_CLIENT_ID";
/// Environment variable holding the metadata client secret when the config omits it.
pub const CLIENT_SECRET_ENV: &str = "SPOTIPY_CLIENT_SECRET";

/// Settings stored in `config.toml`.
///
/// Config keys (TOML): `storage`, `analysis`, `recommendations`, `metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub recommendations: RecommendationSettings,
    #[serde(default)]
    pub metadata: MetadataSettings,
}

impl AppSettings {
    pub(crate) fn normalized(self) -> Self {
        Self {
            storage: self.storage,
            analysis: AnalysisSettings {
                worker_count: clamp_analysis_worker_count(self.analysis.worker_count),
            },
            recommendations: RecommendationSettings {
                default_k: self.recommendations.default_k,
                default_max_popularity: self.recommendations.default_max_popularity.min(100),
                default_per_page: self.recommendations.default_per_page.max(1),
            },
            metadata: MetadataSettings {
                cache_capacity: self.metadata.cache_capacity.max(1),
                max_attempts: self.metadata.max_attempts.max(1),
                ..self.metadata
            },
        }
    }
}

/// Where the upload database and stored audio files live.
///
/// Unset paths fall back to the app directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
}

/// Analysis worker preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Analysis worker count override (0 = auto).
    #[serde(default = "default_analysis_worker_count")]
    pub worker_count: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            worker_count: default_analysis_worker_count(),
        }
    }
}

/// Defaults applied to recommendation queries that omit a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSettings {
    #[serde(default = "default_k")]
    pub default_k: i64,
    #[serde(default = "default_max_popularity")]
    pub default_max_popularity: u32,
    #[serde(default = "default_per_page")]
    pub default_per_page: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            default_max_popularity: default_max_popularity(),
            default_per_page: default_per_page(),
        }
    }
}

/// External track metadata service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSettings {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum number of cached track lookups.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: default_api_base_url(),
            auth_url: default_auth_url(),
            timeout_ms: default_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl MetadataSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    /// Client credentials from config, falling back to the environment.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    pub(crate) fn credentials_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<(String, String)> {
        let id = non_empty(self.client_id.clone()).or_else(|| non_empty(lookup(CLIENT_ID_ENV)))?;
        let secret = non_empty(self.client_secret.clone())
            .or_else(|| non_empty(lookup(CLIENT_SECRET_ENV)))?;
        Some((id, secret))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
