//! Route lifecycle: open, accumulate, finalize.
//!
//! A route is `Active` from [`open`] until [`finalize`] computes its
//! aggregates and marks it `Completed`. The coordinator decides which
//! fixes reach [`append`]; this module only enforces the point-spacing
//! rule and does the arithmetic.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use geotrack_tracking_models::{LocationFix, Route, RouteStatus};
use uuid::Uuid;

/// Opens a new, empty route.
#[must_use]
pub fn open(entity_id: &str, walker: Option<&str>, started_at: DateTime<Utc>) -> Route {
    Route {
        id: Uuid::new_v4(),
        entity_id: entity_id.to_string(),
        walker: walker.map(str::to_string),
        started_at,
        ended_at: None,
        fixes: Vec::new(),
        total_distance_meters: 0.0,
        total_duration_seconds: 0.0,
        average_speed_mps: 0.0,
        max_speed_mps: None,
        point_count: 0,
        status: RouteStatus::Active,
    }
}

/// Returns `true` if `fix` is far enough from the route's last point.
///
/// The first fix of a route, and every fix when `min_distance_meters`
/// is zero, always qualifies.
#[must_use]
pub fn is_far_enough(route: &Route, fix: &LocationFix, min_distance_meters: f64) -> bool {
    if min_distance_meters <= 0.0 {
        return true;
    }
    route.fixes.last().is_none_or(|last| {
        geotrack_spatial::distance_meters(
            last.latitude,
            last.longitude,
            fix.latitude,
            fix.longitude,
        ) >= min_distance_meters
    })
}

/// Appends an accepted fix to an active route.
pub fn append(route: &mut Route, fix: LocationFix) {
    debug_assert_eq!(route.status, RouteStatus::Active);
    route.fixes.push(fix);
    route.point_count = route.fixes.len();
}

/// Sum of great-circle distances between consecutive fixes.
#[must_use]
pub fn total_distance_meters(fixes: &[LocationFix]) -> f64 {
    let points: Vec<(f64, f64)> = fixes.iter().map(|f| (f.latitude, f.longitude)).collect();
    geotrack_spatial::path_length_meters(&points)
}

/// Closes a route at `ended_at` and computes its aggregates.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn finalize(mut route: Route, ended_at: DateTime<Utc>) -> Route {
    let duration_ms = (ended_at - route.started_at).num_milliseconds().max(0);
    let duration_seconds = duration_ms as f64 / 1000.0;
    let distance = total_distance_meters(&route.fixes);

    route.ended_at = Some(ended_at.max(route.started_at));
    route.total_distance_meters = distance;
    route.total_duration_seconds = duration_seconds;
    route.average_speed_mps = if duration_seconds > 0.0 {
        distance / duration_seconds
    } else {
        0.0
    };
    route.max_speed_mps = route
        .fixes
        .iter()
        .filter_map(|f| f.speed)
        .fold(None, |max: Option<f64>, s| Some(max.map_or(s, |m| m.max(s))));
    route.point_count = route.fixes.len();
    route.status = RouteStatus::Completed;
    route
}

/// Pushes a completed route onto a history, evicting the oldest entries
/// beyond `limit`. Returns how many were evicted.
pub fn push_history(history: &mut VecDeque<Route>, route: Route, limit: usize) -> usize {
    history.push_back(route);
    let mut evicted = 0;
    while history.len() > limit.max(1) {
        history.pop_front();
        evicted += 1;
    }
    evicted
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use geotrack_tracking_models::FixRequest;

    use super::*;

    fn fix(lat: f64, lon: f64) -> LocationFix {
        FixRequest::new(lat, lon).into_fix(Utc::now())
    }

    #[test]
    fn first_fix_is_always_far_enough() {
        let route = open("rex", None, Utc::now());
        assert!(is_far_enough(&route, &fix(0.0, 0.0), 1_000.0));
    }

    #[test]
    fn close_fix_is_rejected_by_spacing() {
        let mut route = open("rex", None, Utc::now());
        append(&mut route, fix(0.0, 0.0));
        // ~11 m east
        assert!(!is_far_enough(&route, &fix(0.0, 0.0001), 20.0));
        assert!(is_far_enough(&route, &fix(0.0, 0.0001), 5.0));
        assert!(is_far_enough(&route, &fix(0.0, 0.0), 0.0));
    }

    #[test]
    fn finalize_computes_aggregates() {
        let start = Utc::now();
        let mut route = open("rex", Some("alice"), start);
        let points = [(0.0, 0.0), (0.0, 0.001), (0.001, 0.001)];
        for (lat, lon) in points {
            append(&mut route, fix(lat, lon));
        }
        route.fixes[1].speed = Some(2.5);
        route.fixes[2].speed = Some(1.0);

        let end = start + Duration::seconds(100);
        let done = finalize(route, end);

        let expected = geotrack_spatial::distance_meters(0.0, 0.0, 0.0, 0.001)
            + geotrack_spatial::distance_meters(0.0, 0.001, 0.001, 0.001);
        assert!((done.total_distance_meters - expected).abs() < 1e-6);
        assert!((done.total_duration_seconds - 100.0).abs() < 1e-9);
        assert!((done.average_speed_mps - expected / 100.0).abs() < 1e-9);
        assert_eq!(done.max_speed_mps, Some(2.5));
        assert_eq!(done.point_count, 3);
        assert_eq!(done.status, RouteStatus::Completed);
        assert_eq!(done.ended_at, Some(end));
        assert_eq!(done.walker.as_deref(), Some("alice"));
    }

    #[test]
    fn finalize_never_yields_negative_duration() {
        let start = Utc::now();
        let done = finalize(open("rex", None, start), start - Duration::seconds(5));
        assert!(done.total_duration_seconds.abs() < f64::EPSILON);
        assert!(done.average_speed_mps.abs() < f64::EPSILON);
        assert!(done.total_distance_meters.abs() < f64::EPSILON);
        assert_eq!(done.max_speed_mps, None);
    }

    #[test]
    fn history_is_capped_oldest_first() {
        let mut history = VecDeque::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let route = finalize(open("rex", None, Utc::now()), Utc::now());
            ids.push(route.id);
            push_history(&mut history, route, 3);
        }
        assert_eq!(history.len(), 3);
        let kept: Vec<Uuid> = history.iter().map(|r| r.id).collect();
        assert_eq!(kept, ids[2..].to_vec());
    }
}
