//! TOML replay configuration.
//!
//! ```toml
//! [settings]
//! historyLimit = 20
//!
//! [[entities]]
//! id = "rex"
//! walker = "alice"
//! config = { minDistanceForPointMeters = 5.0 }
//! zones = [
//!   { name = "home", latitude = 52.52, longitude = 13.405, radiusMeters = 100.0 },
//! ]
//! ```
//!
//! A missing `[settings]` table falls back to
//! [`TrackingSettings::from_env`].

use std::path::Path;

use geotrack_tracking::TrackingSettings;
use geotrack_tracking_models::{EntityTrackingConfig, GeofenceZone};
use serde::Deserialize;

use crate::error::CliError;

/// Root of the replay config file.
#[derive(Debug, Default, Deserialize)]
pub struct ReplayConfig {
    pub settings: Option<TrackingSettings>,
    #[serde(default)]
    pub entities: Vec<EntityEntry>,
}

/// One tracked entity.
#[derive(Debug, Deserialize)]
pub struct EntityEntry {
    pub id: String,
    pub walker: Option<String>,
    #[serde(default)]
    pub config: EntityTrackingConfig,
    #[serde(default)]
    pub zones: Vec<GeofenceZone>,
}

impl ReplayConfig {
    /// Settings from the file, or from the environment if absent.
    #[must_use]
    pub fn settings(&self) -> TrackingSettings {
        self.settings.unwrap_or_else(TrackingSettings::from_env)
    }
}

/// Parses a replay config from TOML text.
///
/// # Errors
///
/// Returns [`CliError::Config`] if the text is not a valid config.
pub fn parse(text: &str, origin: &str) -> Result<ReplayConfig, CliError> {
    toml::from_str(text).map_err(|source| CliError::Config {
        path: origin.to_string(),
        source,
    })
}

/// Reads and parses a replay config file.
///
/// # Errors
///
/// Returns [`CliError`] if the file cannot be read or parsed.
pub fn load(path: &Path) -> Result<ReplayConfig, CliError> {
    let text = std::fs::read_to_string(path)?;
    let config = parse(&text, &path.display().to_string())?;
    log::info!(
        "Loaded {} entit{} from {}",
        config.entities.len(),
        if config.entities.len() == 1 { "y" } else { "ies" },
        path.display()
    );
    Ok(config)
}
