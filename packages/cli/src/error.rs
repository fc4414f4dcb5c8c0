use geotrack_tracking::TrackingError;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error in {path}: {source}")]
    Config {
        path: String,
        source: toml::de::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),
}
