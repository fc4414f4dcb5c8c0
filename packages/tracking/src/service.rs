//! The tracking coordinator.
//!
//! All per-entity state lives in one [`TrackingState`] behind a single
//! mutex. Every operation validates its input, takes the lock for a
//! short synchronous critical section and releases it before awaiting
//! anything (poller shutdown, snapshot I/O) or publishing events.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use geotrack_export::{ExportFormat, RouteExport};
use geotrack_tracking_models::{
    EntityTrackingConfig, FixRequest, GeofenceStatus, GeofenceZone, LocationFix, Route,
    TrackingEvent, TrackingSnapshot, TrackingStatistics, ZoneType,
};
use uuid::Uuid;

use crate::events::{EventSink, LogSink};
use crate::geofence::GeofenceTracker;
use crate::polling::{FixProvider, PollingHandle, ProviderError};
use crate::settings::TrackingSettings;
use crate::store::SnapshotStore;
use crate::{TrackingError, session, validation};

/// Minimum movement (meters) from the last known location that opens a
/// route for entities with `auto_start_on_movement`. The entity's own
/// `min_distance_for_point_meters` wins if it is larger.
pub const AUTO_START_DISTANCE_METERS: f64 = 25.0;

#[derive(Default)]
struct TrackingState {
    configs: BTreeMap<String, EntityTrackingConfig>,
    active: BTreeMap<String, Route>,
    geofences: BTreeMap<String, GeofenceTracker>,
    last_known: BTreeMap<String, LocationFix>,
    /// Oldest first.
    history: BTreeMap<String, VecDeque<Route>>,
    pollers: BTreeMap<String, PollingHandle>,
    fixes_processed: u64,
    fixes_rejected: u64,
    sessions_completed: u64,
}

/// What happened to a fix inside the critical section.
struct FixOutcome {
    accepted: bool,
    /// Set when the fix auto-started a route that wants a poller.
    poll_interval: Option<Duration>,
}

impl FixOutcome {
    const REJECTED: Self = Self {
        accepted: false,
        poll_interval: None,
    };
}

impl TrackingState {
    /// Registers the poller for an entity's active route. A route owns at
    /// most one poller; any handle still registered is stopped.
    fn install_poller(&mut self, poller: PollingHandle) {
        if let Some(stale) = self.pollers.insert(poller.entity_id().to_string(), poller) {
            log::warn!("Replacing leftover poller for {}", stale.entity_id());
            stale.abort();
        }
    }

    fn reject(&mut self, entity_id: &str, reason: &str) -> FixOutcome {
        self.fixes_rejected += 1;
        log::debug!("Rejected fix for {entity_id}: {reason}");
        FixOutcome::REJECTED
    }

    fn accept_fix(
        &mut self,
        entity_id: &str,
        fix: LocationFix,
        events: &mut Vec<TrackingEvent>,
    ) -> FixOutcome {
        let config = self.configs.get(entity_id).cloned().unwrap_or_default();

        if !config.enabled {
            return self.reject(entity_id, "tracking disabled");
        }

        if let (Some(threshold), Some(accuracy)) = (config.accuracy_threshold_meters, fix.accuracy)
        {
            if accuracy > threshold {
                return self.reject(
                    entity_id,
                    &format!("accuracy {accuracy} m is worse than threshold {threshold} m"),
                );
            }
        }

        if let Some(route) = self.active.get(entity_id) {
            if !session::is_far_enough(route, &fix, config.min_distance_for_point_meters) {
                return self.reject(
                    entity_id,
                    &format!(
                        "less than {} m from previous route point",
                        config.min_distance_for_point_meters
                    ),
                );
            }
        }

        let mut outcome = FixOutcome {
            accepted: true,
            poll_interval: None,
        };

        if config.auto_start_on_movement && !self.active.contains_key(entity_id) {
            let trigger = config
                .min_distance_for_point_meters
                .max(AUTO_START_DISTANCE_METERS);
            let moved = self.last_known.get(entity_id).is_some_and(|previous| {
                geotrack_spatial::distance_meters(
                    previous.latitude,
                    previous.longitude,
                    fix.latitude,
                    fix.longitude,
                ) >= trigger
            });
            if moved {
                let route = session::open(entity_id, None, Utc::now());
                log::info!("Auto-started route {} for {entity_id} on movement", route.id);
                events.push(TrackingEvent::SessionStarted {
                    entity_id: entity_id.to_string(),
                    route_id: route.id,
                    walker: None,
                    timestamp: route.started_at,
                });
                self.active.insert(entity_id.to_string(), route);
                if config.background_polling {
                    outcome.poll_interval =
                        Some(Duration::from_secs(config.update_interval_seconds));
                }
            }
        }

        if config.track_route {
            if let Some(route) = self.active.get_mut(entity_id) {
                session::append(route, fix.clone());
            }
        }

        if let Some(tracker) = self.geofences.get_mut(entity_id) {
            events.extend(tracker.evaluate(entity_id, &fix, config.safety_alerts));
        }

        self.last_known.insert(entity_id.to_string(), fix);
        self.fixes_processed += 1;
        outcome
    }
}

struct Inner {
    settings: TrackingSettings,
    state: Mutex<TrackingState>,
    sink: Arc<dyn EventSink>,
    provider: Option<Arc<dyn FixProvider>>,
    this: Weak<Self>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TrackingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: &[TrackingEvent]) {
        for event in events {
            self.sink.publish(event);
        }
    }

    fn add_fix(&self, entity_id: &str, request: FixRequest) -> Result<bool, TrackingError> {
        validation::validate_entity_id(entity_id)?;
        validation::validate_fix(&request)?;

        let fix = request.into_fix(Utc::now());
        let mut events = Vec::new();

        let accepted = {
            let mut state = self.lock();
            let outcome = state.accept_fix(entity_id, fix, &mut events);
            if let Some(interval) = outcome.poll_interval {
                if tokio::runtime::Handle::try_current().is_ok() {
                    state.install_poller(self.spawn_poller(entity_id, interval));
                } else {
                    log::warn!("No async runtime; background polling for {entity_id} not started");
                }
            }
            outcome.accepted
        };

        self.publish(&events);
        Ok(accepted)
    }

    /// Spawns a poller whose ticks feed provider readings back through
    /// [`Self::add_fix`]. Must be called from within a tokio runtime.
    fn spawn_poller(&self, entity_id: &str, interval: Duration) -> PollingHandle {
        let this = self.this.clone();
        let provider = self.provider.clone();
        let entity = entity_id.to_string();

        PollingHandle::spawn(entity_id, interval, move || {
            let this = this.clone();
            let provider = provider.clone();
            let entity = entity.clone();
            async move {
                let Some(provider) = provider else {
                    return Ok(());
                };
                let Some(request) = provider.poll(&entity).await? else {
                    return Ok(());
                };
                let Some(inner) = this.upgrade() else {
                    return Ok(());
                };
                let accepted = inner
                    .add_fix(&entity, request)
                    .map_err(|e| ProviderError::Rejected(e.to_string()))?;
                log::debug!("Polled fix for {entity} accepted={accepted}");
                Ok(())
            }
            .boxed()
        })
    }
}

/// Builder for [`TrackingService`].
#[derive(Default)]
pub struct TrackingServiceBuilder {
    settings: TrackingSettings,
    sink: Option<Arc<dyn EventSink>>,
    provider: Option<Arc<dyn FixProvider>>,
}

impl TrackingServiceBuilder {
    /// Overrides the service-wide settings.
    #[must_use]
    pub fn settings(mut self, settings: TrackingSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets where events go. Defaults to [`LogSink`].
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attaches a reading source for background polling.
    #[must_use]
    pub fn fix_provider(mut self, provider: Arc<dyn FixProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Builds the service.
    #[must_use]
    pub fn build(self) -> TrackingService {
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogSink));
        let inner = Arc::new_cyclic(|this| Inner {
            settings: self.settings,
            state: Mutex::new(TrackingState::default()),
            sink,
            provider: self.provider,
            this: this.clone(),
        });
        log::info!(
            "Tracking service started (history limit {})",
            self.settings.history_limit
        );
        TrackingService { inner }
    }
}

/// Owns and mutates all tracking state. Clones share the same state.
#[derive(Clone)]
pub struct TrackingService {
    inner: Arc<Inner>,
}

impl TrackingService {
    /// Starts building a service.
    #[must_use]
    pub fn builder() -> TrackingServiceBuilder {
        TrackingServiceBuilder::default()
    }

    /// Creates a service with the given settings, logging events.
    #[must_use]
    pub fn new(settings: TrackingSettings) -> Self {
        Self::builder().settings(settings).build()
    }

    /// Service-wide settings.
    #[must_use]
    pub fn settings(&self) -> &TrackingSettings {
        &self.inner.settings
    }

    /// Creates or replaces an entity's configuration. The new settings
    /// apply to subsequent fixes; an already running poller keeps its
    /// interval until the route ends.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Validation`] for an empty entity ID or
    /// negative thresholds.
    pub fn configure(
        &self,
        entity_id: &str,
        config: EntityTrackingConfig,
    ) -> Result<(), TrackingError> {
        validation::validate_entity_id(entity_id)?;
        validation::validate_config(&config)?;

        let replaced = self
            .inner
            .lock()
            .configs
            .insert(entity_id.to_string(), config)
            .is_some();
        if replaced {
            log::info!("Replaced tracking config for {entity_id}");
        } else {
            log::info!("Configured tracking for {entity_id}");
        }
        Ok(())
    }

    /// Current configuration of an entity.
    #[must_use]
    pub fn config(&self, entity_id: &str) -> Option<EntityTrackingConfig> {
        self.inner.lock().configs.get(entity_id).cloned()
    }

    /// Forgets an entity entirely, ending any active route first.
    /// Returns `true` if the entity had any state.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Validation`] for an empty entity ID.
    pub async fn remove_entity(&self, entity_id: &str) -> Result<bool, TrackingError> {
        validation::validate_entity_id(entity_id)?;

        match self.end_session(entity_id, false).await {
            Ok(_) | Err(TrackingError::NoActiveSession { .. }) => {}
            Err(e) => return Err(e),
        }

        let mut state = self.inner.lock();
        let had_config = state.configs.remove(entity_id).is_some();
        let had_zones = state.geofences.remove(entity_id).is_some();
        let had_location = state.last_known.remove(entity_id).is_some();
        let had_history = state.history.remove(entity_id).is_some();
        drop(state);

        let existed = had_config || had_zones || had_location || had_history;
        if existed {
            log::info!("Removed entity {entity_id}");
        }
        Ok(existed)
    }

    /// Submits a location fix.
    ///
    /// Returns `Ok(true)` if the fix was accepted, `Ok(false)` if it was
    /// filtered out (tracking disabled, accuracy worse than the
    /// threshold, or too close to the previous route point). Accepted
    /// fixes update the last known location, extend the active route and
    /// are evaluated against the entity's zones.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Validation`] for out-of-range
    /// coordinates or other malformed fields.
    pub fn add_fix(&self, entity_id: &str, request: FixRequest) -> Result<bool, TrackingError> {
        self.inner.add_fix(entity_id, request)
    }

    /// Opens a route for a configured entity, first closing (and saving)
    /// any route that is already active. Starts a background poller if
    /// the entity's config asks for one.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotConfigured`] if the entity has no
    /// configuration.
    pub async fn start_session(
        &self,
        entity_id: &str,
        walker: Option<&str>,
    ) -> Result<Uuid, TrackingError> {
        validation::validate_entity_id(entity_id)?;

        loop {
            let opened = {
                let mut state = self.inner.lock();
                let Some(config) = state.configs.get(entity_id).cloned() else {
                    return Err(TrackingError::NotConfigured {
                        entity_id: entity_id.to_string(),
                    });
                };
                if state.active.contains_key(entity_id) {
                    None
                } else {
                    let route = session::open(entity_id, walker, Utc::now());
                    let started = (route.id, route.started_at);
                    state.active.insert(entity_id.to_string(), route);
                    if config.background_polling {
                        state.install_poller(self.inner.spawn_poller(
                            entity_id,
                            Duration::from_secs(config.update_interval_seconds),
                        ));
                    }
                    Some(started)
                }
            };

            if let Some((route_id, started_at)) = opened {
                log::info!("Started route {route_id} for {entity_id}");
                self.inner.publish(&[TrackingEvent::SessionStarted {
                    entity_id: entity_id.to_string(),
                    route_id,
                    walker: walker.map(str::to_string),
                    timestamp: started_at,
                }]);
                return Ok(route_id);
            }

            log::info!("Closing active route for {entity_id} before starting a new one");
            match self.end_session(entity_id, true).await {
                Ok(_) | Err(TrackingError::NoActiveSession { .. }) => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Ends the entity's active route, computing its aggregates. The
    /// entity's poller is stopped and awaited before the route is
    /// finalized. With `save`, the route goes into the bounded history.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NoActiveSession`] if no route is active.
    pub async fn end_session(&self, entity_id: &str, save: bool) -> Result<Route, TrackingError> {
        validation::validate_entity_id(entity_id)?;
        let no_active = || TrackingError::NoActiveSession {
            entity_id: entity_id.to_string(),
        };

        // The route and its poller leave the state together, so a route
        // started while we wait below is untouched by this call.
        let (route, poller) = {
            let mut state = self.inner.lock();
            let route = state.active.remove(entity_id).ok_or_else(no_active)?;
            (route, state.pollers.remove(entity_id))
        };
        if let Some(poller) = poller {
            poller.cancel().await;
        }
        let route = session::finalize(route, Utc::now());

        {
            let mut state = self.inner.lock();
            state.sessions_completed += 1;
            if save {
                let limit = self.inner.settings.history_limit;
                let history = state.history.entry(entity_id.to_string()).or_default();
                let evicted = session::push_history(history, route.clone(), limit);
                if evicted > 0 {
                    log::debug!("Evicted {evicted} old route(s) from {entity_id} history");
                }
            }
        }

        log::info!(
            "Ended route {} for {entity_id}: {} points, {:.1} m in {:.0} s{}",
            route.id,
            route.point_count,
            route.total_distance_meters,
            route.total_duration_seconds,
            if save { "" } else { " (discarded)" }
        );
        self.inner.publish(&[TrackingEvent::SessionEnded {
            entity_id: entity_id.to_string(),
            route_id: route.id,
            total_distance_meters: route.total_distance_meters,
            total_duration_seconds: route.total_duration_seconds,
            point_count: route.point_count,
            saved: save,
            timestamp: route.ended_at.unwrap_or_else(Utc::now),
        }]);
        Ok(route)
    }

    /// Adds or replaces a circular zone for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Validation`] for an empty name,
    /// out-of-range center or a radius that is not positive.
    pub fn setup_zone(
        &self,
        entity_id: &str,
        name: &str,
        center_latitude: f64,
        center_longitude: f64,
        radius_meters: f64,
        zone_type: ZoneType,
    ) -> Result<(), TrackingError> {
        validation::validate_entity_id(entity_id)?;
        if name.trim().is_empty() {
            return Err(validation::ValidationError::EmptyZoneName.into());
        }
        validation::validate_coordinates(center_latitude, center_longitude)?;
        validation::validate_radius(radius_meters)?;

        let zone = GeofenceZone {
            name: name.to_string(),
            latitude: center_latitude,
            longitude: center_longitude,
            radius_meters,
            zone_type,
        };
        let replaced = self
            .inner
            .lock()
            .geofences
            .entry(entity_id.to_string())
            .or_default()
            .upsert_zone(zone);

        log::info!(
            "{} {zone_type} '{name}' for {entity_id} ({radius_meters} m around {center_latitude}, {center_longitude})",
            if replaced { "Replaced" } else { "Added" }
        );
        Ok(())
    }

    /// Shorthand for [`Self::setup_zone`] with [`ZoneType::SafeZone`].
    ///
    /// # Errors
    ///
    /// See [`Self::setup_zone`].
    pub fn setup_safe_zone(
        &self,
        entity_id: &str,
        name: &str,
        center_latitude: f64,
        center_longitude: f64,
        radius_meters: f64,
    ) -> Result<(), TrackingError> {
        self.setup_zone(
            entity_id,
            name,
            center_latitude,
            center_longitude,
            radius_meters,
            ZoneType::SafeZone,
        )
    }

    /// Removes a zone. Returns `true` if it existed. The breach counter
    /// is kept.
    #[must_use]
    pub fn remove_zone(&self, entity_id: &str, name: &str) -> bool {
        let removed = self
            .inner
            .lock()
            .geofences
            .get_mut(entity_id)
            .is_some_and(|tracker| tracker.remove_zone(name));
        if removed {
            log::info!("Removed zone '{name}' for {entity_id}");
        }
        removed
    }

    /// Zones configured for an entity.
    #[must_use]
    pub fn zones(&self, entity_id: &str) -> Vec<GeofenceZone> {
        self.inner
            .lock()
            .geofences
            .get(entity_id)
            .map(|tracker| tracker.zones().to_vec())
            .unwrap_or_default()
    }

    /// Last accepted fix for an entity.
    #[must_use]
    pub fn current_location(&self, entity_id: &str) -> Option<LocationFix> {
        self.inner.lock().last_known.get(entity_id).cloned()
    }

    /// Snapshot of the entity's active route.
    #[must_use]
    pub fn active_session(&self, entity_id: &str) -> Option<Route> {
        self.inner.lock().active.get(entity_id).cloned()
    }

    /// Completed routes in history, most recent first.
    #[must_use]
    pub fn route_history(&self, entity_id: &str) -> Vec<Route> {
        self.inner
            .lock()
            .history
            .get(entity_id)
            .map(|history| history.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Geofence summary for an entity. Entities without zones get a
    /// zero-count status whose `last_update` is the last accepted fix.
    /// `current_accuracy` uses the service's accuracy tiers.
    #[must_use]
    pub fn geofence_status(&self, entity_id: &str) -> GeofenceStatus {
        let state = self.inner.lock();
        let current = state.last_known.get(entity_id);
        let mut status = state.geofences.get(entity_id).map_or_else(
            || GeofenceTracker::default().status(entity_id, current),
            |tracker| tracker.status(entity_id, current),
        );
        // Without zones nothing is evaluated, but the location still moved.
        if status.last_update.is_none() {
            status.last_update = current.map(|fix| fix.timestamp);
        }
        status.current_accuracy =
            current.map(|fix| fix.accuracy_tier(&self.inner.settings.accuracy_tiers));
        status
    }

    /// Serializes the `last_n` most recent completed routes, most recent
    /// first (`0` means all). Returns `None` if the entity has no history.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Export`] if serialization fails.
    pub fn export_sessions(
        &self,
        entity_id: &str,
        format: ExportFormat,
        last_n: usize,
    ) -> Result<Option<RouteExport>, TrackingError> {
        let routes: Vec<Route> = {
            let state = self.inner.lock();
            let Some(history) = state.history.get(entity_id).filter(|h| !h.is_empty()) else {
                return Ok(None);
            };
            let take = if last_n == 0 { history.len() } else { last_n };
            history.iter().rev().take(take).cloned().collect()
        };

        let export = geotrack_export::export_routes(entity_id, format, &routes)?;
        log::debug!(
            "Exported {} route(s) for {entity_id} as {format}",
            routes.len()
        );
        Ok(Some(export))
    }

    /// Service-wide counters.
    #[must_use]
    pub fn statistics(&self) -> TrackingStatistics {
        let state = self.inner.lock();
        TrackingStatistics {
            entities_configured: state.configs.len(),
            active_sessions: state.active.len(),
            total_sessions_stored: state.history.values().map(VecDeque::len).sum(),
            zones_configured: state.geofences.values().map(|t| t.zones().len()).sum(),
            fixes_processed: state.fixes_processed,
            fixes_rejected: state.fixes_rejected,
            sessions_completed: state.sessions_completed,
        }
    }

    /// Captures configs, zones and history.
    #[must_use]
    pub fn snapshot(&self) -> TrackingSnapshot {
        let state = self.inner.lock();
        TrackingSnapshot {
            configs: state.configs.clone(),
            zones: state
                .geofences
                .iter()
                .filter(|(_, tracker)| !tracker.zones().is_empty())
                .map(|(id, tracker)| (id.clone(), tracker.zones().to_vec()))
                .collect(),
            history: state
                .history
                .iter()
                .map(|(id, routes)| (id.clone(), routes.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Saves a snapshot through the storage collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Store`] if the store fails.
    pub async fn save_snapshot(&self, store: &dyn SnapshotStore) -> Result<(), TrackingError> {
        let snapshot = self.snapshot();
        store.save(&snapshot).await?;
        log::info!(
            "Saved snapshot ({} configs, {} entities with zones, {} with history)",
            snapshot.configs.len(),
            snapshot.zones.len(),
            snapshot.history.len()
        );
        Ok(())
    }

    /// Loads a snapshot through the storage collaborator, replacing the
    /// configs, zones and history of every entity it mentions. Invalid
    /// configs and zones are skipped with a warning. Returns `false` if
    /// the store was empty.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Store`] if the store fails.
    pub async fn load_snapshot(&self, store: &dyn SnapshotStore) -> Result<bool, TrackingError> {
        let Some(snapshot) = store.load().await? else {
            log::info!("No snapshot to load");
            return Ok(false);
        };
        self.apply_snapshot(snapshot);
        Ok(true)
    }

    fn apply_snapshot(&self, snapshot: TrackingSnapshot) {
        let limit = self.inner.settings.history_limit;
        let mut state = self.inner.lock();

        for (entity_id, config) in snapshot.configs {
            if let Err(e) = validation::validate_config(&config) {
                log::warn!("Skipping stored config for {entity_id}: {e}");
                continue;
            }
            state.configs.insert(entity_id, config);
        }

        for (entity_id, zones) in snapshot.zones {
            let valid: Vec<GeofenceZone> = zones
                .into_iter()
                .filter(|zone| {
                    let check = validation::validate_coordinates(zone.latitude, zone.longitude)
                        .and_then(|()| validation::validate_radius(zone.radius_meters));
                    if let Err(e) = &check {
                        log::warn!("Skipping stored zone '{}' for {entity_id}: {e}", zone.name);
                    }
                    check.is_ok()
                })
                .collect();
            state
                .geofences
                .insert(entity_id, GeofenceTracker::with_zones(valid));
        }

        for (entity_id, routes) in snapshot.history {
            let mut history = VecDeque::new();
            for route in routes {
                session::push_history(&mut history, route, limit);
            }
            state.history.insert(entity_id, history);
        }

        log::info!(
            "Loaded snapshot ({} configs, {} entities with zones)",
            state.configs.len(),
            state.geofences.len()
        );
    }

    /// Stops every poller (waiting for each to finish) and clears all
    /// in-memory state. Active routes are discarded.
    pub async fn shutdown(&self) {
        let previous = std::mem::take(&mut *self.inner.lock());
        let discarded = previous.active.len();
        let stopped = previous.pollers.len();
        join_all(previous.pollers.into_values().map(|poller| {
            log::debug!("Stopping poller for {}", poller.entity_id());
            poller.cancel()
        }))
        .await;

        log::info!(
            "Tracking service shut down ({stopped} poller(s) stopped, {discarded} active route(s) discarded)"
        );
    }
}
