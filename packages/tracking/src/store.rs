//! Snapshot load/save seam for an external storage collaborator.
//!
//! The core defines only the contract and the [`TrackingSnapshot`]
//! shape; where and how a snapshot is persisted is up to the
//! implementation.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use geotrack_tracking_models::TrackingSnapshot;
use thiserror::Error;

/// Errors reported by a [`SnapshotStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("Snapshot store error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads and saves tracking snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the stored snapshot, or `None` if nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn load(&self) -> Result<Option<TrackingSnapshot>, StoreError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn save(&self, snapshot: &TrackingSnapshot) -> Result<(), StoreError>;
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<TrackingSnapshot>>,
}

impl MemoryStore {
    /// Creates a store pre-loaded with a snapshot.
    #[must_use]
    pub const fn with_snapshot(snapshot: TrackingSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Option<TrackingSnapshot>, StoreError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, snapshot: &TrackingSnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
