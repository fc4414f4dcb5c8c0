//! Input validation run at the top of every public operation.
//!
//! These reject structurally invalid requests (caller contract
//! violations). Expected noise such as poor accuracy is not handled
//! here; that is a filtering decision made by the coordinator.

use geotrack_tracking_models::{EntityTrackingConfig, FixRequest};
use thiserror::Error;

/// A request that can never be valid, regardless of entity state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Entity IDs must be non-empty.
    #[error("Entity ID must not be empty")]
    EmptyEntityId,

    /// Zone names must be non-empty.
    #[error("Zone name must not be empty")]
    EmptyZoneName,

    /// Latitude outside `[-90, 90]` or not finite.
    #[error("Invalid latitude {value}: expected -90 to 90")]
    InvalidLatitude {
        /// The rejected value.
        value: f64,
    },

    /// Longitude outside `[-180, 180]` or not finite.
    #[error("Invalid longitude {value}: expected -180 to 180")]
    InvalidLongitude {
        /// The rejected value.
        value: f64,
    },

    /// Zone radius must be a positive number of meters.
    #[error("Invalid radius {value}: must be greater than 0 meters")]
    InvalidRadius {
        /// The rejected value.
        value: f64,
    },

    /// Heading outside `[0, 360]`.
    #[error("Invalid heading {value}: expected 0 to 360 degrees")]
    InvalidHeading {
        /// The rejected value.
        value: f64,
    },

    /// Battery level outside `[0, 100]`.
    #[error("Invalid battery level {value}: expected 0 to 100 percent")]
    InvalidBatteryLevel {
        /// The rejected value.
        value: f64,
    },

    /// Accuracy (or accuracy threshold) negative or not finite.
    #[error("Invalid accuracy {value}: must be a non-negative number of meters")]
    InvalidAccuracy {
        /// The rejected value.
        value: f64,
    },

    /// Minimum point distance negative or not finite.
    #[error("Invalid minimum point distance {value}: must be non-negative")]
    InvalidMinDistance {
        /// The rejected value.
        value: f64,
    },
}

/// Rejects empty entity IDs.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyEntityId`] if `entity_id` is blank.
pub fn validate_entity_id(entity_id: &str) -> Result<(), ValidationError> {
    if entity_id.trim().is_empty() {
        return Err(ValidationError::EmptyEntityId);
    }
    Ok(())
}

/// Checks that a coordinate pair is finite and in range.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidLatitude`] or
/// [`ValidationError::InvalidLongitude`].
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::InvalidLatitude { value: latitude });
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::InvalidLongitude { value: longitude });
    }
    Ok(())
}

/// Checks that a zone radius is a positive, finite number of meters.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidRadius`] for zero, negative or
/// non-finite radii.
pub fn validate_radius(radius_meters: f64) -> Result<(), ValidationError> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(ValidationError::InvalidRadius {
            value: radius_meters,
        });
    }
    Ok(())
}

/// Validates every field of an incoming fix.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, checking coordinates
/// first.
pub fn validate_fix(request: &FixRequest) -> Result<(), ValidationError> {
    validate_coordinates(request.latitude, request.longitude)?;

    if let Some(accuracy) = request.accuracy {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(ValidationError::InvalidAccuracy { value: accuracy });
        }
    }
    if let Some(heading) = request.heading {
        if !(0.0..=360.0).contains(&heading) {
            return Err(ValidationError::InvalidHeading { value: heading });
        }
    }
    if let Some(battery) = request.battery_level {
        if !(0.0..=100.0).contains(&battery) {
            return Err(ValidationError::InvalidBatteryLevel { value: battery });
        }
    }
    Ok(())
}

/// Validates the numeric settings of an entity configuration.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidAccuracy`] for a negative threshold
/// or [`ValidationError::InvalidMinDistance`] for a negative minimum
/// distance.
pub fn validate_config(config: &EntityTrackingConfig) -> Result<(), ValidationError> {
    if let Some(threshold) = config.accuracy_threshold_meters {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ValidationError::InvalidAccuracy { value: threshold });
        }
    }
    let min_distance = config.min_distance_for_point_meters;
    if !min_distance.is_finite() || min_distance < 0.0 {
        return Err(ValidationError::InvalidMinDistance {
            value: min_distance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_in_range_pass() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
    }

    #[test]
    fn latitude_out_of_range_fails() {
        assert_eq!(
            validate_coordinates(100.0, 0.0),
            Err(ValidationError::InvalidLatitude { value: 100.0 })
        );
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn longitude_out_of_range_fails() {
        assert_eq!(
            validate_coordinates(0.0, -180.5),
            Err(ValidationError::InvalidLongitude { value: -180.5 })
        );
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn radius_must_be_positive() {
        assert!(validate_radius(0.1).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-5.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
    }

    #[test]
    fn fix_optional_fields_are_checked() {
        assert!(validate_fix(&FixRequest::new(1.0, 1.0).heading(360.0)).is_ok());
        assert!(matches!(
            validate_fix(&FixRequest::new(1.0, 1.0).heading(361.0)),
            Err(ValidationError::InvalidHeading { .. })
        ));
        assert!(matches!(
            validate_fix(&FixRequest::new(1.0, 1.0).battery_level(101.0)),
            Err(ValidationError::InvalidBatteryLevel { .. })
        ));
        assert!(matches!(
            validate_fix(&FixRequest::new(1.0, 1.0).accuracy(-1.0)),
            Err(ValidationError::InvalidAccuracy { .. })
        ));
    }

    #[test]
    fn blank_entity_id_fails() {
        assert_eq!(validate_entity_id("  "), Err(ValidationError::EmptyEntityId));
        assert!(validate_entity_id("rex").is_ok());
    }

    #[test]
    fn config_rejects_negative_distances() {
        let config = EntityTrackingConfig {
            min_distance_for_point_meters: -1.0,
            ..EntityTrackingConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidMinDistance { .. })
        ));
        assert!(validate_config(&EntityTrackingConfig::default()).is_ok());
    }
}
