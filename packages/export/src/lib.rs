#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Serialization of completed routes.
//!
//! Routes are passed in the order they should appear (the tracking
//! service hands them over most recent first). Each format lives in its
//! own module; [`export_routes`] dispatches on [`ExportFormat`].

pub mod csv_export;
pub mod gpx_export;
pub mod json_export;

use geotrack_tracking_models::Route;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors that can occur while serializing routes.
#[derive(Debug, Error)]
pub enum ExportError {
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GPX document could not be written.
    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while flushing the CSV writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized output was not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Supported export formats.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    /// GPX 1.1 track document.
    Gpx,
    /// JSON document with a `routes` list.
    Json,
    /// One CSV row per fix.
    Csv,
}

impl ExportFormat {
    /// Conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gpx => "gpx",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// MIME type for the serialized content.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Gpx => "application/gpx+xml",
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

/// Serialized routes plus the format they are in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteExport {
    /// Format of `content`.
    pub format: ExportFormat,
    /// The serialized document.
    pub content: String,
}

/// Serializes routes in the requested format.
///
/// # Errors
///
/// Returns [`ExportError`] if serialization fails.
pub fn export_routes(
    entity_id: &str,
    format: ExportFormat,
    routes: &[Route],
) -> Result<RouteExport, ExportError> {
    let content = match format {
        ExportFormat::Gpx => gpx_export::to_gpx(entity_id, routes)?,
        ExportFormat::Json => json_export::to_json(entity_id, routes)?,
        ExportFormat::Csv => csv_export::to_csv(routes)?,
    };
    Ok(RouteExport { format, content })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("GPX".parse::<ExportFormat>().unwrap(), ExportFormat::Gpx);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("Csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("kml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Gpx.to_string(), "gpx");
    }

    #[test]
    fn file_metadata_per_format() {
        assert_eq!(ExportFormat::Gpx.extension(), "gpx");
        assert_eq!(ExportFormat::Gpx.mime_type(), "application/gpx+xml");
        assert_eq!(ExportFormat::Json.extension(), "json");
        assert_eq!(ExportFormat::Json.mime_type(), "application/json");
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Csv.mime_type(), "text/csv");
    }

    #[test]
    fn export_dispatches_on_format() {
        let routes = vec![test_support::sample_route(None)];
        for format in [ExportFormat::Gpx, ExportFormat::Json, ExportFormat::Csv] {
            let export = export_routes("rex", format, &routes).unwrap();
            assert_eq!(export.format, format);
            assert!(!export.content.is_empty(), "{format} export is empty");
        }
    }
}
