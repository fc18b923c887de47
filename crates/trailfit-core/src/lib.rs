//! Shared data model and configuration for the trailfit recommender.
//!
//! Holds the immutable catalog records, the mutable per-user profile shape,
//! structured feedback signals, climate categories, and the env-driven
//! application config. No I/O beyond reading the catalog document.

pub mod app_config;
pub mod catalog;
pub mod climate;
pub mod config;
pub mod feedback;
pub mod product;
pub mod profile;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, OracleBackend};
pub use catalog::{load_catalog, Catalog, CatalogSummary, NumericStats};
pub use climate::Climate;
pub use config::{load_app_config, load_app_config_from_env};
pub use feedback::{Direction, FeedbackSignal, SignalKind};
pub use product::{Attribute, Product};
pub use profile::{
    normalize_user_id, CategoryPreferences, FeedbackEntry, GeneralPreferences, Location, Sizing,
    UserProfile,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),

    #[error("catalog validation error: {0}")]
    Validation(String),
}
