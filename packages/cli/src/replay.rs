//! The `replay` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geotrack_tracking::{
    ChannelSink, EventSink, ExportFormat, LogSink, TrackingError, TrackingService,
};
use geotrack_tracking_models::{Route, TrackingEvent};

use crate::config::{self, ReplayConfig};
use crate::error::CliError;
use crate::fixes::{self, LoggedFix};
use crate::snapshot::JsonFileStore;

pub struct ReplayOptions {
    pub config: PathBuf,
    pub fixes: PathBuf,
    pub walker: Option<String>,
    pub format: ExportFormat,
    pub last: usize,
    pub output: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

/// Outcome of feeding a fix log through the service.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub accepted: usize,
    pub filtered: usize,
    pub invalid: usize,
    /// Routes closed at the end of the replay, in config order.
    pub routes: Vec<Route>,
}

/// Configures every entity, opens a route for each, feeds all fixes in
/// log order and closes the routes again.
///
/// Invalid fixes are counted and skipped. Fixes for entities missing
/// from the config are still processed with default settings.
///
/// # Errors
///
/// Returns [`CliError::Tracking`] if an entity config or zone is invalid.
pub async fn replay(
    service: &TrackingService,
    config: &ReplayConfig,
    fixes: Vec<LoggedFix>,
    walker: Option<&str>,
) -> Result<ReplayReport, CliError> {
    for entity in &config.entities {
        service.configure(&entity.id, entity.config.clone())?;
        for zone in &entity.zones {
            service.setup_zone(
                &entity.id,
                &zone.name,
                zone.latitude,
                zone.longitude,
                zone.radius_meters,
                zone.zone_type,
            )?;
        }
        service
            .start_session(&entity.id, walker.or(entity.walker.as_deref()))
            .await?;
    }

    let mut report = ReplayReport::default();
    for fix in fixes {
        match service.add_fix(&fix.entity_id, fix.request) {
            Ok(true) => report.accepted += 1,
            Ok(false) => report.filtered += 1,
            Err(e) => {
                log::warn!("Skipping fix for {}: {e}", fix.entity_id);
                report.invalid += 1;
            }
        }
    }

    for entity in &config.entities {
        match service.end_session(&entity.id, true).await {
            Ok(route) => report.routes.push(route),
            Err(TrackingError::NoActiveSession { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}

/// Writes one export per configured entity with history. Returns the
/// files written (empty when printing to stdout).
///
/// # Errors
///
/// Returns [`CliError`] if serialization or writing fails.
pub fn write_exports(
    service: &TrackingService,
    config: &ReplayConfig,
    format: ExportFormat,
    last: usize,
    output: Option<&Path>,
) -> Result<Vec<PathBuf>, CliError> {
    let mut written = Vec::new();
    if let Some(dir) = output {
        std::fs::create_dir_all(dir)?;
    }

    for entity in &config.entities {
        let Some(export) = service.export_sessions(&entity.id, format, last)? else {
            log::info!("No completed routes to export for {}", entity.id);
            continue;
        };
        match output {
            Some(dir) => {
                let path = dir.join(format!("{}.{}", entity.id, format.extension()));
                std::fs::write(&path, export.content)?;
                log::info!(
                    "Wrote {format} export ({}) for {} to {}",
                    format.mime_type(),
                    entity.id,
                    path.display()
                );
                written.push(path);
            }
            None => println!("{}", export.content),
        }
    }

    Ok(written)
}

fn print_summary(service: &TrackingService, config: &ReplayConfig, report: &ReplayReport) {
    println!(
        "Fixes: {} accepted, {} filtered, {} invalid",
        report.accepted, report.filtered, report.invalid
    );
    for route in &report.routes {
        println!(
            "Route {} ({}): {} points, {:.1} m",
            route.id, route.entity_id, route.point_count, route.total_distance_meters
        );
    }

    for entity in &config.entities {
        let status = service.geofence_status(&entity.id);
        if status.zones_configured == 0 {
            continue;
        }
        println!(
            "Geofences for {}: {} zone(s), {} safe-zone breach(es)",
            entity.id, status.zones_configured, status.safe_zone_breaches
        );
        for zone in &status.zones {
            let distance = zone
                .distance_meters
                .map_or_else(String::new, |d| format!(", {d:.0} m from center"));
            println!(
                "  {} [{}] {}{distance}",
                zone.name,
                zone.zone_type,
                if zone.inside { "inside" } else { "outside" }
            );
        }
    }

    let stats = service.statistics();
    println!(
        "Statistics: {} entities, {} stored route(s), {} zone(s), {} fixes processed, {} rejected",
        stats.entities_configured,
        stats.total_sessions_stored,
        stats.zones_configured,
        stats.fixes_processed,
        stats.fixes_rejected
    );
}

/// Runs the `replay` command end to end.
///
/// # Errors
///
/// Returns [`CliError`] if an input cannot be read, the config is
/// invalid, or an export or snapshot cannot be written.
pub async fn run(options: ReplayOptions) -> Result<(), CliError> {
    let config = config::load(&options.config)?;
    let fixes = fixes::read_path(&options.fixes)?;

    let (sink, mut events) = ChannelSink::new();
    let service = TrackingService::builder()
        .settings(config.settings())
        .event_sink(Arc::new(sink))
        .build();

    let store = options.snapshot.map(JsonFileStore::new);
    if let Some(store) = &store {
        service.load_snapshot(store).await?;
    }

    let report = replay(&service, &config, fixes, options.walker.as_deref()).await?;

    while let Ok(event) = events.try_recv() {
        LogSink.publish(&event);
        if let TrackingEvent::SafetyAlert { message, .. } = &event {
            println!("ALERT: {message}");
        }
    }

    print_summary(&service, &config, &report);
    write_exports(
        &service,
        &config,
        options.format,
        options.last,
        options.output.as_deref(),
    )?;

    if let Some(store) = &store {
        service.save_snapshot(store).await?;
    }
    service.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use geotrack_tracking::TrackingSettings;

    use super::*;

    const CONFIG: &str = r#"
        [[entities]]
        id = "rex"
        walker = "alice"
        config = { minDistanceForPointMeters = 5.0, accuracyThresholdMeters = 20.0 }
        zones = [
          { name = "home", latitude = 52.52, longitude = 13.405, radiusMeters = 100.0 },
        ]

        [[entities]]
        id = "tom"
    "#;

    const FIXES: &str = "\
entity_id,timestamp,latitude,longitude,accuracy
rex,2024-05-01T08:00:00Z,52.5200,13.4050,4
rex,2024-05-01T08:01:00Z,52.5200,13.4050,4
rex,2024-05-01T08:02:00Z,52.5210,13.4050,90
rex,2024-05-01T08:03:00Z,52.5300,13.4050,4
rex,2024-05-01T08:04:00Z,95.0,13.4050,4
tom,2024-05-01T08:00:00Z,48.8566,2.3522,3
";

    fn inputs() -> (ReplayConfig, Vec<LoggedFix>) {
        (
            config::parse(CONFIG, "inline").unwrap(),
            fixes::read(FIXES.as_bytes()).unwrap(),
        )
    }

    #[tokio::test]
    async fn replay_counts_filters_and_closes_routes() {
        let (config, fixes) = inputs();
        let service = TrackingService::new(TrackingSettings::default());

        let report = replay(&service, &config, fixes, None).await.unwrap();

        // duplicate point and poor accuracy are filtered, latitude 95 is invalid
        assert_eq!(report.accepted, 3);
        assert_eq!(report.filtered, 2);
        assert_eq!(report.invalid, 1);

        assert_eq!(report.routes.len(), 2);
        let rex = &report.routes[0];
        assert_eq!(rex.entity_id, "rex");
        assert_eq!(rex.walker.as_deref(), Some("alice"));
        assert_eq!(rex.point_count, 2);
        assert!((rex.total_distance_meters - 1_112.0).abs() < 5.0);

        let status = service.geofence_status("rex");
        assert_eq!(status.safe_zone_breaches, 1);
        assert_eq!(service.statistics().active_sessions, 0);
    }

    #[tokio::test]
    async fn walker_flag_overrides_config() {
        let (config, fixes) = inputs();
        let service = TrackingService::new(TrackingSettings::default());
        let report = replay(&service, &config, fixes, Some("bob")).await.unwrap();
        assert!(
            report
                .routes
                .iter()
                .all(|r| r.walker.as_deref() == Some("bob"))
        );
    }

    #[tokio::test]
    async fn exports_are_written_per_entity() {
        let (config, fixes) = inputs();
        let service = TrackingService::new(TrackingSettings::default());
        replay(&service, &config, fixes, None).await.unwrap();

        let dir = std::env::temp_dir().join(format!("geotrack-exports-{}", std::process::id()));
        let written =
            write_exports(&service, &config, ExportFormat::Json, 0, Some(&dir)).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(written[0], dir.join("rex.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(json["routeCount"], 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn invalid_zone_aborts_replay() {
        let config = config::parse(
            r#"
            [[entities]]
            id = "rex"
            zones = [{ name = "home", latitude = 52.52, longitude = 13.405, radiusMeters = 0.0 }]
            "#,
            "inline",
        )
        .unwrap();
        let service = TrackingService::new(TrackingSettings::default());
        let err = replay(&service, &config, Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Tracking(TrackingError::Validation(_))));
    }
}
