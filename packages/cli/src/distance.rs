//! The `distance` command.

use geotrack_tracking::ValidationError;
use geotrack_tracking::validation::validate_coordinates;

/// Great-circle distance (meters) and initial bearing (degrees) between
/// two points.
///
/// # Errors
///
/// Returns [`ValidationError`] if either point is out of range or not a
/// finite number.
pub fn measure(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<(f64, f64), ValidationError> {
    validate_coordinates(lat1, lon1)?;
    validate_coordinates(lat2, lon2)?;
    Ok((
        geotrack_spatial::distance_meters(lat1, lon1, lat2, lon2),
        geotrack_spatial::bearing_degrees(lat1, lon1, lat2, lon2),
    ))
}
