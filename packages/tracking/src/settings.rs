//! Service-wide settings.

use geotrack_tracking_models::AccuracyTiers;
use serde::{Deserialize, Serialize};

/// Default number of completed routes kept per entity.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Settings shared by every entity the service tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingSettings {
    /// Completed routes kept per entity; the oldest are evicted first.
    pub history_limit: usize,
    /// Cutoffs used to classify fix accuracy.
    pub accuracy_tiers: AccuracyTiers,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            accuracy_tiers: AccuracyTiers::default(),
        }
    }
}

impl TrackingSettings {
    /// Reads overrides from the environment, falling back to defaults for
    /// anything unset or unparseable.
    ///
    /// * `GEOTRACK_HISTORY_LIMIT`
    /// * `GEOTRACK_ACCURACY_EXCELLENT_M`
    /// * `GEOTRACK_ACCURACY_GOOD_M`
    /// * `GEOTRACK_ACCURACY_FAIR_M`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let tiers = defaults.accuracy_tiers;
        let float = |key: &str, fallback: f64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(fallback)
        };

        let history_limit = lookup("GEOTRACK_HISTORY_LIMIT")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.history_limit);

        let settings = Self {
            history_limit,
            accuracy_tiers: AccuracyTiers {
                excellent_max_meters: float(
                    "GEOTRACK_ACCURACY_EXCELLENT_M",
                    tiers.excellent_max_meters,
                ),
                good_max_meters: float("GEOTRACK_ACCURACY_GOOD_M", tiers.good_max_meters),
                fair_max_meters: float("GEOTRACK_ACCURACY_FAIR_M", tiers.fair_max_meters),
            },
        };
        log::debug!("Tracking settings: {settings:?}");
        settings
    }
}
