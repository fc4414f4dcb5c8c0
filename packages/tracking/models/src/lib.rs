#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Value types shared by the tracking engine, exporters and front ends.
//!
//! Everything here is plain data: location fixes, per-entity tracking
//! configuration, circular geofence zones, routes, outbound events and
//! the status/statistics snapshots the coordinator hands out. The types
//! serialize with `serde` in `camelCase` so they can be loaded from
//! TOML/JSON and handed to external collaborators unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Where a location fix came from.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LocationSource {
    /// A device tracker integration.
    DeviceTracker,
    /// A phone companion app.
    CompanionApp,
    /// Entered by hand.
    Manual,
    /// Pushed through a webhook.
    Webhook,
    /// Received over MQTT.
    Mqtt,
    /// A raw GPS receiver.
    Gps,
    /// Network (cell/wifi) positioning.
    Network,
    /// Source not reported.
    #[default]
    Unknown,
}

/// Accuracy classification of a fix, ordered best to worst.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccuracyTier {
    /// Survey-grade or very good GPS (around 3 m).
    Excellent,
    /// Typical open-sky GPS (around 10 m).
    Good,
    /// Urban GPS or wifi positioning (around 30 m).
    Fair,
    /// Cell positioning or unknown accuracy (100 m and worse).
    Poor,
}

/// Upper bounds (inclusive, meters) of each [`AccuracyTier`].
///
/// Anything above `fair_max_meters`, or a fix without an accuracy value,
/// is [`AccuracyTier::Poor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccuracyTiers {
    /// Largest accuracy radius still rated [`AccuracyTier::Excellent`].
    pub excellent_max_meters: f64,
    /// Largest accuracy radius still rated [`AccuracyTier::Good`].
    pub good_max_meters: f64,
    /// Largest accuracy radius still rated [`AccuracyTier::Fair`].
    pub fair_max_meters: f64,
}

impl AccuracyTiers {
    /// Default upper bound for [`AccuracyTier::Excellent`].
    pub const DEFAULT_EXCELLENT_MAX_METERS: f64 = 5.0;
    /// Default upper bound for [`AccuracyTier::Good`].
    pub const DEFAULT_GOOD_MAX_METERS: f64 = 15.0;
    /// Default upper bound for [`AccuracyTier::Fair`].
    pub const DEFAULT_FAIR_MAX_METERS: f64 = 50.0;

    /// Classifies an accuracy radius.
    #[must_use]
    pub fn classify(&self, accuracy_meters: Option<f64>) -> AccuracyTier {
        match accuracy_meters {
            Some(a) if a <= self.excellent_max_meters => AccuracyTier::Excellent,
            Some(a) if a <= self.good_max_meters => AccuracyTier::Good,
            Some(a) if a <= self.fair_max_meters => AccuracyTier::Fair,
            _ => AccuracyTier::Poor,
        }
    }
}

impl Default for AccuracyTiers {
    fn default() -> Self {
        Self {
            excellent_max_meters: Self::DEFAULT_EXCELLENT_MAX_METERS,
            good_max_meters: Self::DEFAULT_GOOD_MAX_METERS,
            fair_max_meters: Self::DEFAULT_FAIR_MAX_METERS,
        }
    }
}

/// A single accepted location reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Altitude in meters.
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters (smaller is better).
    pub accuracy: Option<f64>,
    /// Ground speed in meters per second.
    pub speed: Option<f64>,
    /// Heading in degrees, `[0, 360]`.
    pub heading: Option<f64>,
    /// Where the reading came from.
    pub source: LocationSource,
    /// Battery level of the reporting device, percent.
    pub battery_level: Option<f64>,
}

impl LocationFix {
    /// Accuracy tier of this fix under the given cutoffs.
    #[must_use]
    pub fn accuracy_tier(&self, tiers: &AccuracyTiers) -> AccuracyTier {
        tiers.classify(self.accuracy)
    }

    /// A fix is trustworthy unless it falls in the worst tier.
    #[must_use]
    pub fn is_trustworthy(&self, tiers: &AccuracyTiers) -> bool {
        self.accuracy_tier(tiers) != AccuracyTier::Poor
    }
}

/// An incoming reading before validation.
///
/// Only the coordinates are required; everything else defaults to
/// "unknown" and the timestamp to the moment the fix is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixRequest {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Altitude in meters.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Speed in meters per second.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Heading in degrees.
    #[serde(default)]
    pub heading: Option<f64>,
    /// Reporting source.
    #[serde(default)]
    pub source: LocationSource,
    /// Battery level, percent.
    #[serde(default)]
    pub battery_level: Option<f64>,
    /// Reading time. `None` means "now".
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FixRequest {
    /// Creates a request with just coordinates.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// Sets the accuracy radius.
    #[must_use]
    pub fn accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }

    /// Sets the altitude.
    #[must_use]
    pub fn altitude(mut self, meters: f64) -> Self {
        self.altitude = Some(meters);
        self
    }

    /// Sets the speed.
    #[must_use]
    pub fn speed(mut self, meters_per_second: f64) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    /// Sets the heading.
    #[must_use]
    pub fn heading(mut self, degrees: f64) -> Self {
        self.heading = Some(degrees);
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: LocationSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the battery level.
    #[must_use]
    pub fn battery_level(mut self, percent: f64) -> Self {
        self.battery_level = Some(percent);
        self
    }

    /// Sets the reading time.
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Converts into an accepted fix, stamping `now` if no timestamp was
    /// supplied. Does not validate.
    #[must_use]
    pub fn into_fix(self, now: DateTime<Utc>) -> LocationFix {
        LocationFix {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp.unwrap_or(now),
            altitude: self.altitude,
            accuracy: self.accuracy,
            speed: self.speed,
            heading: self.heading,
            source: self.source,
            battery_level: self.battery_level,
        }
    }
}

/// Per-entity tracking settings. Replaced wholesale on every configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityTrackingConfig {
    /// Whether fixes for this entity are accepted at all.
    pub enabled: bool,
    /// Open a route automatically once the entity starts moving.
    pub auto_start_on_movement: bool,
    /// Append accepted fixes to the active route.
    pub track_route: bool,
    /// Emit safety alerts on safe-zone exits and restricted-area entries.
    pub safety_alerts: bool,
    /// Fixes with a larger accuracy radius are rejected.
    pub accuracy_threshold_meters: Option<f64>,
    /// Seconds between background polling ticks.
    pub update_interval_seconds: u64,
    /// Fixes closer than this to the previous route point are dropped.
    pub min_distance_for_point_meters: f64,
    /// Run a background polling task while a route is active.
    pub background_polling: bool,
}

impl Default for EntityTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_start_on_movement: false,
            track_route: true,
            safety_alerts: true,
            accuracy_threshold_meters: Some(50.0),
            update_interval_seconds: 30,
            min_distance_for_point_meters: 10.0,
            background_polling: false,
        }
    }
}

/// Kind of geofence zone.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ZoneType {
    /// Leaving it counts as a breach.
    #[default]
    SafeZone,
    /// Entering it is noteworthy.
    RestrictedArea,
    /// Informational only.
    PointOfInterest,
}

/// A circular geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceZone {
    /// Zone name, unique per entity.
    pub name: String,
    /// Center latitude.
    pub latitude: f64,
    /// Center longitude.
    pub longitude: f64,
    /// Radius in meters, always positive.
    pub radius_meters: f64,
    /// Kind of zone.
    #[serde(default)]
    pub zone_type: ZoneType,
}

/// Lifecycle state of a route.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteStatus {
    /// Open and accumulating fixes.
    Active,
    /// Finalized with aggregates computed.
    Completed,
}

/// A tracking session for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Unique route ID.
    pub id: Uuid,
    /// Entity the route belongs to.
    pub entity_id: String,
    /// Who is being walked/tracked, if given at start.
    pub walker: Option<String>,
    /// When the route was opened.
    pub started_at: DateTime<Utc>,
    /// When the route was finalized.
    pub ended_at: Option<DateTime<Utc>>,
    /// Accepted fixes in arrival order.
    pub fixes: Vec<LocationFix>,
    /// Sum of consecutive great-circle distances.
    pub total_distance_meters: f64,
    /// `ended_at - started_at`.
    pub total_duration_seconds: f64,
    /// Distance over duration, zero for zero-length routes.
    pub average_speed_mps: f64,
    /// Largest reported fix speed.
    pub max_speed_mps: Option<f64>,
    /// Number of fixes.
    pub point_count: usize,
    /// Lifecycle state.
    pub status: RouteStatus,
}

/// An outbound event for the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// A route was opened.
    SessionStarted {
        /// Entity ID.
        entity_id: String,
        /// New route ID.
        route_id: Uuid,
        /// Walker name, if any.
        walker: Option<String>,
        /// Open time.
        timestamp: DateTime<Utc>,
    },
    /// A route was finalized.
    SessionEnded {
        /// Entity ID.
        entity_id: String,
        /// Finalized route ID.
        route_id: Uuid,
        /// Route length.
        total_distance_meters: f64,
        /// Route duration.
        total_duration_seconds: f64,
        /// Number of fixes.
        point_count: usize,
        /// Whether it went into history.
        saved: bool,
        /// Close time.
        timestamp: DateTime<Utc>,
    },
    /// The entity moved from outside to inside a zone.
    ZoneEntered {
        /// Entity ID.
        entity_id: String,
        /// Zone name.
        zone: String,
        /// Zone kind.
        zone_type: ZoneType,
        /// Time of the triggering fix.
        timestamp: DateTime<Utc>,
        /// The triggering fix.
        fix: LocationFix,
    },
    /// The entity moved from inside to outside a zone.
    ZoneExited {
        /// Entity ID.
        entity_id: String,
        /// Zone name.
        zone: String,
        /// Zone kind.
        zone_type: ZoneType,
        /// Time of the triggering fix.
        timestamp: DateTime<Utc>,
        /// The triggering fix.
        fix: LocationFix,
    },
    /// A safe zone was left or a restricted area entered.
    SafetyAlert {
        /// Entity ID.
        entity_id: String,
        /// Zone name.
        zone: String,
        /// Human-readable reason.
        message: String,
        /// Time of the triggering fix.
        timestamp: DateTime<Utc>,
    },
}

impl TrackingEvent {
    /// Entity the event concerns.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        match self {
            Self::SessionStarted { entity_id, .. }
            | Self::SessionEnded { entity_id, .. }
            | Self::ZoneEntered { entity_id, .. }
            | Self::ZoneExited { entity_id, .. }
            | Self::SafetyAlert { entity_id, .. } => entity_id,
        }
    }
}

/// Containment of the entity in one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    /// Zone name.
    pub name: String,
    /// Zone kind.
    pub zone_type: ZoneType,
    /// Zone radius in meters.
    pub radius_meters: f64,
    /// Last evaluated containment.
    pub inside: bool,
    /// Distance from the last known location to the zone center.
    pub distance_meters: Option<f64>,
}

/// Geofence summary for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceStatus {
    /// Entity ID.
    pub entity_id: String,
    /// Number of zones configured.
    pub zones_configured: usize,
    /// Per-zone containment.
    pub zones: Vec<ZoneStatus>,
    /// Last accepted fix.
    pub current_location: Option<LocationFix>,
    /// Accuracy tier of `current_location` under the service's cutoffs.
    pub current_accuracy: Option<AccuracyTier>,
    /// Number of safe-zone exits so far.
    pub safe_zone_breaches: u64,
    /// Time of the last geofence evaluation.
    pub last_update: Option<DateTime<Utc>>,
}

/// Service-wide counters and gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatistics {
    /// Entities with a configuration (gauge).
    pub entities_configured: usize,
    /// Routes currently active (gauge).
    pub active_sessions: usize,
    /// Routes held in history across all entities (gauge).
    pub total_sessions_stored: usize,
    /// Zones configured across all entities (gauge).
    pub zones_configured: usize,
    /// Fixes accepted since startup.
    pub fixes_processed: u64,
    /// Fixes rejected by filtering since startup.
    pub fixes_rejected: u64,
    /// Routes finalized since startup.
    pub sessions_completed: u64,
}

/// State an external storage collaborator may load or save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingSnapshot {
    /// Per-entity configuration.
    pub configs: BTreeMap<String, EntityTrackingConfig>,
    /// Per-entity zones.
    pub zones: BTreeMap<String, Vec<GeofenceZone>>,
    /// Per-entity completed routes, oldest first.
    pub history: BTreeMap<String, Vec<Route>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix_with_accuracy(accuracy: Option<f64>) -> LocationFix {
        FixRequest {
            accuracy,
            ..FixRequest::new(40.0, -75.0)
        }
        .into_fix(Utc::now())
    }

    #[test]
    fn example_accuracies_land_in_distinct_tiers() {
        let tiers = AccuracyTiers::default();
        assert_eq!(tiers.classify(Some(3.0)), AccuracyTier::Excellent);
        assert_eq!(tiers.classify(Some(10.0)), AccuracyTier::Good);
        assert_eq!(tiers.classify(Some(30.0)), AccuracyTier::Fair);
        assert_eq!(tiers.classify(Some(100.0)), AccuracyTier::Poor);
        assert_eq!(tiers.classify(None), AccuracyTier::Poor);
    }

    #[test]
    fn tier_cutoffs_are_inclusive_and_overridable() {
        let tiers = AccuracyTiers {
            excellent_max_meters: 1.0,
            good_max_meters: 2.0,
            fair_max_meters: 3.0,
        };
        assert_eq!(tiers.classify(Some(1.0)), AccuracyTier::Excellent);
        assert_eq!(tiers.classify(Some(2.0)), AccuracyTier::Good);
        assert_eq!(tiers.classify(Some(3.0)), AccuracyTier::Fair);
        assert_eq!(tiers.classify(Some(3.5)), AccuracyTier::Poor);
    }

    #[test]
    fn tiers_are_ordered_best_to_worst() {
        assert!(AccuracyTier::Excellent < AccuracyTier::Good);
        assert!(AccuracyTier::Good < AccuracyTier::Fair);
        assert!(AccuracyTier::Fair < AccuracyTier::Poor);
    }

    #[test]
    fn trustworthy_excludes_worst_tier() {
        let tiers = AccuracyTiers::default();
        assert!(fix_with_accuracy(Some(30.0)).is_trustworthy(&tiers));
        assert!(!fix_with_accuracy(Some(100.0)).is_trustworthy(&tiers));
        assert!(!fix_with_accuracy(None).is_trustworthy(&tiers));
    }

    #[test]
    fn request_without_timestamp_uses_now() {
        let now = Utc::now();
        let fix = FixRequest::new(1.0, 2.0)
            .accuracy(4.0)
            .source(LocationSource::Mqtt)
            .into_fix(now);
        assert_eq!(fix.timestamp, now);
        assert_eq!(fix.accuracy, Some(4.0));
        assert_eq!(fix.source, LocationSource::Mqtt);
    }

    #[test]
    fn source_parses_case_insensitively() {
        assert_eq!(
            "Companion_App".parse::<LocationSource>().unwrap(),
            LocationSource::CompanionApp
        );
        assert_eq!(LocationSource::DeviceTracker.as_ref(), "device_tracker");
        assert_eq!("mqtt".parse::<LocationSource>().unwrap(), LocationSource::Mqtt);
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: EntityTrackingConfig =
            serde_json::from_str(r#"{"accuracyThresholdMeters": 20.0}"#).unwrap();
        assert_eq!(config.accuracy_threshold_meters, Some(20.0));
        assert!(config.enabled);
        assert!(config.track_route);
        assert_eq!(config.update_interval_seconds, 30);
    }

    #[test]
    fn events_are_tagged_by_type() {
        let event = TrackingEvent::SafetyAlert {
            entity_id: "rex".to_string(),
            zone: "home".to_string(),
            message: "left safe zone".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "safety_alert");
        assert_eq!(event.entity_id(), "rex");
    }
}
