//! TOML settings for storage locations, analysis workers, query defaults and
//! the metadata service.

mod defaults;
mod errors;
mod io;
mod types;

/// Default filename used to store the app configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub use errors::ConfigError;
pub use io::{config_path, load_settings_from, save_settings_to_path};
pub use types::{
    AnalysisSettings, AppSettings, CLIENT_ID_ENV, CLIENT_SECRET_ENV, MetadataSettings,
    RecommendationSettings, StorageSettings,
};
