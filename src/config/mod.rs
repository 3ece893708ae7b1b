//! Configuration module
//!
//! Handles thresholds, timings, deployment catalogue, and automation
//! preferences.

pub mod settings;

pub use settings::{
    AutomationSettings, DeploySettings, OcrSettings, SearchSettings, Settings, TimingSettings,
};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
