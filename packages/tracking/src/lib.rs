#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location tracking and geofencing for independently tracked entities.
//!
//! [`TrackingService`] owns every piece of per-entity state: tracking
//! configuration, the active route, geofence zones and their containment
//! history, the last known fix, bounded route history and service-wide
//! counters. Callers feed it fixes and drive route start/end; it filters
//! the fixes, grows routes, detects zone transitions and hands events to
//! an [`EventSink`].
//!
//! The service is constructed explicitly and shared by reference (it is
//! cheap to clone). Call [`TrackingService::shutdown`] to stop background
//! pollers and clear state.
//!
//! ```ignore
//! let service = TrackingService::builder().build();
//! service.configure("rex", EntityTrackingConfig::default())?;
//! service.start_session("rex", Some("alice")).await?;
//! service.add_fix("rex", FixRequest::new(52.52, 13.405).accuracy(5.0))?;
//! let route = service.end_session("rex", true).await?;
//! ```

pub mod events;
pub mod geofence;
pub mod polling;
pub mod service;
pub mod session;
pub mod settings;
pub mod store;
pub mod validation;

pub use events::{ChannelSink, EventSink, LogSink};
pub use geotrack_export::{ExportFormat, RouteExport};
pub use polling::{FixProvider, ProviderError};
pub use service::{TrackingService, TrackingServiceBuilder};
pub use settings::TrackingSettings;
pub use store::{MemoryStore, SnapshotStore, StoreError};
pub use validation::ValidationError;

use thiserror::Error;

/// Errors returned by [`TrackingService`] operations.
///
/// Fixes rejected for accuracy or spacing are not errors; `add_fix`
/// reports them as `Ok(false)`.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The request was structurally invalid.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The entity has no active route.
    #[error("No active session for entity {entity_id}")]
    NoActiveSession {
        /// Entity that was asked to end its route.
        entity_id: String,
    },

    /// The operation needs a configuration the entity does not have.
    #[error("Entity {entity_id} is not configured")]
    NotConfigured {
        /// Entity that has no configuration.
        entity_id: String,
    },

    /// Route serialization failed.
    #[error("Export error: {0}")]
    Export(#[from] geotrack_export::ExportError),

    /// The snapshot store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
