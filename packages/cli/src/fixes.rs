//! Fix logs in CSV form.
//!
//! Columns: `entity_id,timestamp,latitude,longitude` followed by any of
//! `accuracy,altitude,speed,heading,source,battery_level`. Optional
//! columns may be omitted or left blank; a blank timestamp means "now".

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use geotrack_tracking_models::{FixRequest, LocationSource};
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct FixRecord {
    entity_id: String,
    timestamp: Option<String>,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    altitude: Option<f64>,
    speed: Option<f64>,
    heading: Option<f64>,
    source: Option<String>,
    battery_level: Option<f64>,
}

/// A fix tagged with the entity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedFix {
    pub entity_id: String,
    pub request: FixRequest,
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(text) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            log::debug!("Unparseable fix timestamp '{text}': {e}");
            None
        }
    }
}

impl FixRecord {
    fn into_logged(self) -> LoggedFix {
        let source = self
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .map_or(LocationSource::Unknown, |s| {
                s.parse().unwrap_or_else(|_| {
                    log::debug!("Unrecognized fix source '{s}', using unknown");
                    LocationSource::Unknown
                })
            });

        LoggedFix {
            entity_id: self.entity_id,
            request: FixRequest {
                latitude: self.latitude,
                longitude: self.longitude,
                accuracy: self.accuracy,
                altitude: self.altitude,
                speed: self.speed,
                heading: self.heading,
                source,
                battery_level: self.battery_level,
                timestamp: self.timestamp.as_deref().and_then(parse_timestamp),
            },
        }
    }
}

/// Reads fixes from CSV. Rows that cannot be parsed are skipped with a
/// warning.
///
/// # Errors
///
/// Returns [`CliError::Csv`] if the header cannot be read.
pub fn read<R: Read>(reader: R) -> Result<Vec<LoggedFix>, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    reader.headers()?;

    let mut fixes = Vec::new();
    for (row, result) in reader.deserialize::<FixRecord>().enumerate() {
        match result {
            Ok(record) => fixes.push(record.into_logged()),
            // +2: one for the header, one for 1-based line numbers
            Err(e) => log::warn!("Skipping fix on line {}: {e}", row + 2),
        }
    }
    Ok(fixes)
}

/// Reads fixes from a CSV file.
///
/// # Errors
///
/// Returns [`CliError`] if the file cannot be opened or its header read.
pub fn read_path(path: &Path) -> Result<Vec<LoggedFix>, CliError> {
    let file = std::fs::File::open(path)?;
    let fixes = read(file)?;
    log::info!("Read {} fixes from {}", fixes.len(), path.display());
    Ok(fixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_full_and_sparse_rows() {
        let csv = "\
entity_id,timestamp,latitude,longitude,accuracy,altitude,speed,heading,source,battery_level
rex,2024-05-01T08:00:00Z,52.52,13.405,4.0,34.0,1.2,90,gps,80
rex,,52.521,13.406,,,,,,
";
        let fixes = read(csv.as_bytes()).unwrap();
        assert_eq!(fixes.len(), 2);

        let first = &fixes[0];
        assert_eq!(first.entity_id, "rex");
        assert_eq!(first.request.source, LocationSource::Gps);
        assert_eq!(first.request.accuracy, Some(4.0));
        assert_eq!(first.request.battery_level, Some(80.0));
        assert_eq!(
            first.request.timestamp.unwrap().to_rfc3339(),
            "2024-05-01T08:00:00+00:00"
        );

        let second = &fixes[1];
        assert!(second.request.timestamp.is_none());
        assert!(second.request.accuracy.is_none());
        assert_eq!(second.request.source, LocationSource::Unknown);
    }

    #[test]
    fn optional_columns_can_be_left_out() {
        let csv = "entity_id,timestamp,latitude,longitude\ntom,,1.5,2.5\n";
        let fixes = read(csv.as_bytes()).unwrap();
        assert_eq!(fixes.len(), 1);
        assert!((fixes[0].request.latitude - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let csv = "\
entity_id,timestamp,latitude,longitude
rex,,not-a-number,13.4
rex,,52.52,13.405
";
        let fixes = read(csv.as_bytes()).unwrap();
        assert_eq!(fixes.len(), 1);
    }

    #[test]
    fn source_names_are_case_insensitive() {
        let csv = "entity_id,timestamp,latitude,longitude,source\nrex,,0,0,Companion_App\n";
        let fixes = read(csv.as_bytes()).unwrap();
        assert_eq!(fixes[0].request.source, LocationSource::CompanionApp);
    }
}
