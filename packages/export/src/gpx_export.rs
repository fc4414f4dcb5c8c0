//! GPX 1.1 export: one `<trk>` per route, one `<trkpt>` per fix.

use chrono::{DateTime, SecondsFormat, Utc};
use geo::Point;
use geotrack_tracking_models::{LocationFix, Route};
use gpx::{Gpx, GpxVersion, Metadata, Time, Track, TrackSegment, Waypoint};
use time::OffsetDateTime;

use crate::ExportError;

const CREATOR: &str = "geotrack";

fn gpx_time(ts: DateTime<Utc>) -> Option<Time> {
    let seconds = OffsetDateTime::from_unix_timestamp(ts.timestamp()).ok()?;
    seconds
        .replace_nanosecond(ts.timestamp_subsec_nanos())
        .ok()
        .map(Time::from)
}

fn waypoint(fix: &LocationFix) -> Waypoint {
    let mut point = Waypoint::new(Point::new(fix.longitude, fix.latitude));
    point.elevation = fix.altitude;
    point.time = gpx_time(fix.timestamp);
    point
}

fn track(entity_id: &str, route: &Route) -> Track {
    let started = route.started_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut track = Track::new();
    track.name = Some(route.walker.as_deref().map_or_else(
        || format!("{entity_id} {started}"),
        |walker| format!("{entity_id} ({walker}) {started}"),
    ));
    track.segments.push(TrackSegment {
        points: route.fixes.iter().map(waypoint).collect(),
    });
    track
}

/// Renders routes as a GPX document.
///
/// # Errors
///
/// Returns [`ExportError::Gpx`] if the document cannot be written.
pub fn to_gpx(entity_id: &str, routes: &[Route]) -> Result<String, ExportError> {
    let document = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        metadata: Some(Metadata {
            name: Some(entity_id.to_string()),
            ..Metadata::default()
        }),
        tracks: routes.iter().map(|route| track(entity_id, route)).collect(),
        ..Gpx::default()
    };

    let mut bytes = Vec::new();
    gpx::write(&document, &mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_route;

    fn read_back(content: &str) -> Gpx {
        gpx::read(content.as_bytes()).unwrap()
    }

    #[test]
    fn one_track_per_route_and_one_point_per_fix() {
        let routes = vec![sample_route(None), sample_route(None)];
        let document = read_back(&to_gpx("rex", &routes).unwrap());

        assert_eq!(document.version, GpxVersion::Gpx11);
        assert_eq!(document.tracks.len(), 2);
        for track in &document.tracks {
            assert_eq!(track.segments.len(), 1);
            assert_eq!(track.segments[0].points.len(), 2);
        }
    }

    #[test]
    fn writes_coordinates_elevation_and_time() {
        let route = sample_route(None);
        let document = read_back(&to_gpx("rex", std::slice::from_ref(&route)).unwrap());
        let points = &document.tracks[0].segments[0].points;

        let first = points[0].point();
        assert!((first.y() - 52.52).abs() < 1e-9);
        assert!((first.x() - 13.405).abs() < 1e-9);
        assert_eq!(points[0].elevation, Some(34.0));
        assert!(points[1].elevation.is_none());

        let time = OffsetDateTime::from(points[0].time.unwrap());
        assert_eq!(time.unix_timestamp(), route.fixes[0].timestamp.timestamp());
    }

    #[test]
    fn names_survive_xml_escaping() {
        let content = to_gpx("rex & co", &[sample_route(Some("<bob>"))]).unwrap();
        assert!(!content.contains("<bob>"));

        let document = read_back(&content);
        assert_eq!(
            document.metadata.unwrap().name.as_deref(),
            Some("rex & co")
        );
        let name = document.tracks[0].name.as_deref().unwrap();
        assert!(name.starts_with("rex & co (<bob>) 2024-05-01"), "got {name}");
    }

    #[test]
    fn empty_route_list_is_still_a_document() {
        let document = read_back(&to_gpx("rex", &[]).unwrap());
        assert!(document.tracks.is_empty());
        assert_eq!(document.creator.as_deref(), Some(CREATOR));
    }
}
