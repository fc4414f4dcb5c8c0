//! JSON export: a document wrapping the full route records.

use chrono::{DateTime, Utc};
use geotrack_tracking_models::Route;
use serde::Serialize;

use crate::ExportError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteDocument<'a> {
    entity_id: &'a str,
    exported_at: DateTime<Utc>,
    route_count: usize,
    routes: &'a [Route],
}

/// Renders routes as a pretty-printed JSON document.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_json(entity_id: &str, routes: &[Route]) -> Result<String, ExportError> {
    let document = RouteDocument {
        entity_id,
        exported_at: Utc::now(),
        route_count: routes.len(),
        routes,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_route;

    #[test]
    fn routes_keep_their_order_and_detail() {
        let routes = vec![sample_route(Some("alice")), sample_route(None)];
        let json: serde_json::Value = serde_json::from_str(&to_json("rex", &routes).unwrap()).unwrap();

        assert_eq!(json["entityId"], "rex");
        assert_eq!(json["routeCount"], 2);
        let listed = json["routes"].as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["id"], routes[0].id.to_string());
        assert_eq!(listed[1]["id"], routes[1].id.to_string());
        assert_eq!(listed[0]["walker"], "alice");
        assert_eq!(listed[0]["status"], "completed");
        assert_eq!(listed[0]["fixes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn routes_parse_back() {
        let routes = vec![sample_route(None)];
        let json: serde_json::Value = serde_json::from_str(&to_json("rex", &routes).unwrap()).unwrap();
        let parsed: Vec<Route> = serde_json::from_value(json["routes"].clone()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, routes[0].id);
        assert_eq!(parsed[0].fixes.len(), routes[0].fixes.len());
        assert_eq!(parsed[0].started_at, routes[0].started_at);
    }
}
