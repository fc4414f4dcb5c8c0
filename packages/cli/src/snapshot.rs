//! Snapshot persistence in a single JSON file.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use geotrack_tracking::{SnapshotStore, StoreError};
use geotrack_tracking_models::TrackingSnapshot;

/// Stores the snapshot as pretty-printed JSON at `path`. A missing file
/// loads as "no snapshot".
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Option<TrackingSnapshot>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, snapshot: &TrackingSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        // Rename over the old file so readers never see a partial write.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!("Wrote snapshot to {}", self.path.display());
        Ok(())
    }
}
