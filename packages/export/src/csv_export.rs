//! CSV export: a header row, then one row per fix across all routes.

use chrono::SecondsFormat;
use geotrack_tracking_models::{LocationSource, Route};
use serde::Serialize;

use crate::ExportError;

/// Column names, in order.
pub const CSV_HEADER: [&str; 10] = [
    "timestamp",
    "latitude",
    "longitude",
    "altitude",
    "accuracy",
    "speed",
    "heading",
    "source",
    "battery_level",
    "route_id",
];

#[derive(Serialize)]
struct FixRow {
    timestamp: String,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    accuracy: Option<f64>,
    speed: Option<f64>,
    heading: Option<f64>,
    source: LocationSource,
    battery_level: Option<f64>,
    route_id: String,
}

/// Renders every fix of every route as CSV. Missing optional values are
/// empty cells.
///
/// # Errors
///
/// Returns [`ExportError`] if a row cannot be serialized or the writer
/// cannot be flushed.
pub fn to_csv(routes: &[Route]) -> Result<String, ExportError> {
    // Header is written by hand so an empty export still has one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for route in routes {
        let route_id = route.id.to_string();
        for fix in &route.fixes {
            writer.serialize(FixRow {
                timestamp: fix.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                latitude: fix.latitude,
                longitude: fix.longitude,
                altitude: fix.altitude,
                accuracy: fix.accuracy,
                speed: fix.speed,
                heading: fix.heading,
                source: fix.source,
                battery_level: fix.battery_level,
                route_id: route_id.clone(),
            })?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}
