//! Zone containment and enter/exit transition detection.
//!
//! Each entity gets one [`GeofenceTracker`] holding its zones, the last
//! evaluated containment per zone and its safe-zone breach counter. A
//! zone that has never been evaluated counts as "outside", so the first
//! fix inside a zone produces an enter event.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geotrack_tracking_models::{
    GeofenceStatus, GeofenceZone, LocationFix, TrackingEvent, ZoneStatus, ZoneType,
};

/// Returns `true` if the coordinate is inside the zone (boundary
/// inclusive).
#[must_use]
pub fn contains(zone: &GeofenceZone, latitude: f64, longitude: f64) -> bool {
    geotrack_spatial::within_radius(
        zone.latitude,
        zone.longitude,
        zone.radius_meters,
        latitude,
        longitude,
    )
}

/// Distance from a coordinate to the zone center.
#[must_use]
pub fn distance_to_center(zone: &GeofenceZone, latitude: f64, longitude: f64) -> f64 {
    geotrack_spatial::distance_meters(zone.latitude, zone.longitude, latitude, longitude)
}

/// Zones and containment history for a single entity.
#[derive(Debug, Clone, Default)]
pub struct GeofenceTracker {
    zones: Vec<GeofenceZone>,
    inside: BTreeMap<String, bool>,
    safe_zone_breaches: u64,
    last_update: Option<DateTime<Utc>>,
}

impl GeofenceTracker {
    /// Creates a tracker with the given zones, all with an "outside"
    /// baseline.
    #[must_use]
    pub fn with_zones(zones: Vec<GeofenceZone>) -> Self {
        let mut tracker = Self::default();
        for zone in zones {
            tracker.upsert_zone(zone);
        }
        tracker
    }

    /// Adds a zone, replacing any zone with the same name. A replaced
    /// zone's containment resets to "outside". Returns `true` if a zone
    /// was replaced.
    pub fn upsert_zone(&mut self, zone: GeofenceZone) -> bool {
        self.inside.remove(&zone.name);
        if let Some(existing) = self.zones.iter_mut().find(|z| z.name == zone.name) {
            *existing = zone;
            true
        } else {
            self.zones.push(zone);
            false
        }
    }

    /// Removes a zone by name. Returns `true` if it existed.
    pub fn remove_zone(&mut self, name: &str) -> bool {
        self.inside.remove(name);
        let before = self.zones.len();
        self.zones.retain(|z| z.name != name);
        self.zones.len() != before
    }

    /// Configured zones in insertion order.
    #[must_use]
    pub fn zones(&self) -> &[GeofenceZone] {
        &self.zones
    }

    /// Number of safe-zone exits recorded so far.
    #[must_use]
    pub const fn safe_zone_breaches(&self) -> u64 {
        self.safe_zone_breaches
    }

    /// Last evaluated containment for a zone.
    #[must_use]
    pub fn is_inside(&self, zone_name: &str) -> bool {
        self.inside.get(zone_name).copied().unwrap_or(false)
    }

    /// Evaluates an accepted fix against every zone and returns the
    /// events for any transitions.
    ///
    /// A safe-zone exit bumps the breach counter once. With
    /// `safety_alerts`, safe-zone exits and restricted-area entries also
    /// produce a [`TrackingEvent::SafetyAlert`].
    pub fn evaluate(
        &mut self,
        entity_id: &str,
        fix: &LocationFix,
        safety_alerts: bool,
    ) -> Vec<TrackingEvent> {
        let mut events = Vec::new();

        for zone in &self.zones {
            let now_inside = contains(zone, fix.latitude, fix.longitude);
            let was_inside = self
                .inside
                .insert(zone.name.clone(), now_inside)
                .unwrap_or(false);

            match (was_inside, now_inside) {
                (false, true) => {
                    log::debug!("{entity_id} entered zone '{}'", zone.name);
                    events.push(TrackingEvent::ZoneEntered {
                        entity_id: entity_id.to_string(),
                        zone: zone.name.clone(),
                        zone_type: zone.zone_type,
                        timestamp: fix.timestamp,
                        fix: fix.clone(),
                    });
                    if safety_alerts && zone.zone_type == ZoneType::RestrictedArea {
                        events.push(TrackingEvent::SafetyAlert {
                            entity_id: entity_id.to_string(),
                            zone: zone.name.clone(),
                            message: format!("{entity_id} entered restricted area '{}'", zone.name),
                            timestamp: fix.timestamp,
                        });
                    }
                }
                (true, false) => {
                    log::debug!("{entity_id} exited zone '{}'", zone.name);
                    events.push(TrackingEvent::ZoneExited {
                        entity_id: entity_id.to_string(),
                        zone: zone.name.clone(),
                        zone_type: zone.zone_type,
                        timestamp: fix.timestamp,
                        fix: fix.clone(),
                    });
                    if zone.zone_type == ZoneType::SafeZone {
                        self.safe_zone_breaches += 1;
                        log::info!(
                            "{entity_id} left safe zone '{}' (breach #{})",
                            zone.name,
                            self.safe_zone_breaches
                        );
                        if safety_alerts {
                            events.push(TrackingEvent::SafetyAlert {
                                entity_id: entity_id.to_string(),
                                zone: zone.name.clone(),
                                message: format!("{entity_id} left safe zone '{}'", zone.name),
                                timestamp: fix.timestamp,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        self.last_update = Some(fix.timestamp);
        events
    }

    /// Builds a status snapshot. `current` is the entity's last known fix.
    /// The accuracy tier is left for the caller, which owns the cutoffs.
    #[must_use]
    pub fn status(&self, entity_id: &str, current: Option<&LocationFix>) -> GeofenceStatus {
        GeofenceStatus {
            entity_id: entity_id.to_string(),
            zones_configured: self.zones.len(),
            zones: self
                .zones
                .iter()
                .map(|zone| ZoneStatus {
                    name: zone.name.clone(),
                    zone_type: zone.zone_type,
                    radius_meters: zone.radius_meters,
                    inside: self.is_inside(&zone.name),
                    distance_meters: current
                        .map(|fix| distance_to_center(zone, fix.latitude, fix.longitude)),
                })
                .collect(),
            current_location: current.cloned(),
            current_accuracy: None,
            safe_zone_breaches: self.safe_zone_breaches,
            last_update: self.last_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use geotrack_tracking_models::FixRequest;

    use super::*;

    fn zone(name: &str, zone_type: ZoneType) -> GeofenceZone {
        GeofenceZone {
            name: name.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            radius_meters: 100.0,
            zone_type,
        }
    }

    fn fix(lat: f64, lon: f64) -> LocationFix {
        FixRequest::new(lat, lon).into_fix(Utc::now())
    }

    const INSIDE: (f64, f64) = (0.0, 0.0001);
    const OUTSIDE: (f64, f64) = (0.0, 0.01);

    #[test]
    fn containment_includes_boundary() {
        let mut z = zone("home", ZoneType::SafeZone);
        let d = geotrack_spatial::distance_meters(0.0, 0.0, 0.0, 0.001);
        z.radius_meters = d;
        assert!(contains(&z, 0.0, 0.001));
        z.radius_meters = d - 0.001;
        assert!(!contains(&z, 0.0, 0.001));
    }

    #[test]
    fn first_fix_inside_emits_enter() {
        let mut tracker = GeofenceTracker::with_zones(vec![zone("home", ZoneType::SafeZone)]);
        let events = tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), true);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TrackingEvent::ZoneEntered { zone, .. } if zone == "home"));
        assert!(tracker.is_inside("home"));
    }

    #[test]
    fn staying_put_emits_nothing() {
        let mut tracker = GeofenceTracker::with_zones(vec![zone("home", ZoneType::SafeZone)]);
        tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), true);
        assert!(tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), true).is_empty());
        assert!(tracker.evaluate("rex", &fix(0.0, 0.0), true).is_empty());
    }

    #[test]
    fn breach_counted_once_per_exit() {
        let mut tracker = GeofenceTracker::with_zones(vec![zone("home", ZoneType::SafeZone)]);
        tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), false);

        let events = tracker.evaluate("rex", &fix(OUTSIDE.0, OUTSIDE.1), false);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TrackingEvent::ZoneExited { .. }));
        assert_eq!(tracker.safe_zone_breaches(), 1);

        for _ in 0..5 {
            tracker.evaluate("rex", &fix(OUTSIDE.0, OUTSIDE.1), false);
        }
        assert_eq!(tracker.safe_zone_breaches(), 1);

        tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), false);
        tracker.evaluate("rex", &fix(OUTSIDE.0, OUTSIDE.1), false);
        assert_eq!(tracker.safe_zone_breaches(), 2);
    }

    #[test]
    fn outside_from_start_is_not_a_breach() {
        let mut tracker = GeofenceTracker::with_zones(vec![zone("home", ZoneType::SafeZone)]);
        assert!(tracker.evaluate("rex", &fix(OUTSIDE.0, OUTSIDE.1), true).is_empty());
        assert_eq!(tracker.safe_zone_breaches(), 0);
    }

    #[test]
    fn non_safe_zone_exit_is_not_a_breach() {
        let mut tracker =
            GeofenceTracker::with_zones(vec![zone("park", ZoneType::PointOfInterest)]);
        tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), true);
        let events = tracker.evaluate("rex", &fix(OUTSIDE.0, OUTSIDE.1), true);
        assert_eq!(events.len(), 1);
        assert_eq!(tracker.safe_zone_breaches(), 0);
    }

    #[test]
    fn safety_alerts_follow_the_flag() {
        let mut tracker = GeofenceTracker::with_zones(vec![
            zone("home", ZoneType::SafeZone),
            zone("road", ZoneType::RestrictedArea),
        ]);
        let entered = tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), true);
        assert_eq!(
            entered
                .iter()
                .filter(|e| matches!(e, TrackingEvent::SafetyAlert { zone, .. } if zone == "road"))
                .count(),
            1
        );

        let exited = tracker.evaluate("rex", &fix(OUTSIDE.0, OUTSIDE.1), false);
        assert!(
            !exited
                .iter()
                .any(|e| matches!(e, TrackingEvent::SafetyAlert { .. }))
        );
        assert_eq!(exited.len(), 2);
    }

    #[test]
    fn replacing_a_zone_resets_its_baseline() {
        let mut tracker = GeofenceTracker::with_zones(vec![zone("home", ZoneType::SafeZone)]);
        tracker.evaluate("rex", &fix(INSIDE.0, INSIDE.1), true);
        assert!(tracker.upsert_zone(zone("home", ZoneType::SafeZone)));
        assert!(!tracker.is_inside("home"));
        assert_eq!(tracker.zones().len(), 1);
        assert!(tracker.remove_zone("home"));
        assert!(!tracker.remove_zone("home"));
    }

    #[test]
    fn status_reports_distances() {
        let mut tracker = GeofenceTracker::with_zones(vec![zone("home", ZoneType::SafeZone)]);
        let current = fix(INSIDE.0, INSIDE.1);
        tracker.evaluate("rex", &current, true);
        let status = tracker.status("rex", Some(&current));
        assert_eq!(status.zones_configured, 1);
        assert!(status.zones[0].inside);
        assert!(status.zones[0].distance_meters.unwrap() < 100.0);
        assert_eq!(status.last_update, Some(current.timestamp));
    }
}
