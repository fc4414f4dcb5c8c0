#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle geometry for location tracking.
//!
//! Thin wrappers around the `geo` crate's haversine measures that take
//! plain `(latitude, longitude)` degrees, which is how every fix and
//! zone in the tracking engine stores its coordinates. Inputs are assumed
//! to be validated by the caller; none of these functions fail.

use geo::{Bearing, Distance, Haversine, Point};

/// Mean earth radius (meters) of the sphere the haversine formula uses.
pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_008.8;

/// Builds a `geo` point. Note the `(x, y)` = `(longitude, latitude)` order.
fn point(lat: f64, lon: f64) -> Point<f64> {
    Point::new(lon, lat)
}

/// Great-circle distance in meters between two coordinates.
///
/// Zero for identical points and symmetric in its arguments.
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine.distance(point(lat1, lon1), point(lat2, lon2))
}

/// Initial bearing in degrees (`[0, 360)`) from point 1 toward point 2.
///
/// North is 0, east is 90.
#[must_use]
pub fn bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let bearing = Haversine.bearing(point(lat1, lon1), point(lat2, lon2));
    let normalized = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Returns `true` if `(lat, lon)` lies within `radius_meters` of the
/// center. The boundary itself counts as inside.
#[must_use]
pub fn within_radius(
    center_lat: f64,
    center_lon: f64,
    radius_meters: f64,
    lat: f64,
    lon: f64,
) -> bool {
    distance_meters(center_lat, center_lon, lat, lon) <= radius_meters
}

/// Total length of a path as the sum of consecutive great-circle
/// distances. Paths with fewer than two points have zero length.
#[must_use]
pub fn path_length_meters(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_meters(pair[0].0, pair[0].1, pair[1].0, pair[1].1))
        .sum()
}
