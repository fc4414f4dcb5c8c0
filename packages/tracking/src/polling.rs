//! Per-entity background polling tasks.
//!
//! A poller wakes up every interval and runs one tick. It does not
//! produce fixes itself; the tick asks a [`FixProvider`] (if one is
//! attached) for a reading and feeds it back into the service.
//! Stopping is always "signal, then await" through
//! [`PollingHandle::cancel`], so no tick can run after the caller
//! resumes.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use geotrack_tracking_models::FixRequest;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shortest interval a poller will sleep between ticks.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors raised inside a polling tick. They are logged, never fatal.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not produce a reading.
    #[error("Fix provider unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// The reading was rejected by the service.
    #[error("Polled fix rejected: {0}")]
    Rejected(String),
}

/// Source of readings for background polling (device APIs, HTTP
/// trackers, ...). Retries and timeouts are the provider's business.
#[async_trait]
pub trait FixProvider: Send + Sync {
    /// Returns a fresh reading for the entity, or `None` if there is
    /// nothing new.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the reading could not be obtained.
    async fn poll(&self, entity_id: &str) -> Result<Option<FixRequest>, ProviderError>;
}

/// A running poller and the means to stop it.
#[derive(Debug)]
pub struct PollingHandle {
    entity_id: String,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollingHandle {
    /// Spawns a poller on the current tokio runtime.
    ///
    /// `tick` is called once per interval; an `Err` is logged and the
    /// loop keeps going. Cancellation is observed both while sleeping
    /// and while a tick is in flight.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn<F>(entity_id: &str, interval: Duration, tick: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), ProviderError>> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let interval = interval.max(MIN_POLL_INTERVAL);
        let label = entity_id.to_string();

        let task = tokio::spawn(async move {
            log::debug!("Poller for {label} started ({interval:?} interval)");
            loop {
                tokio::select! {
                    _ = cancelled.changed() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                if *cancelled.borrow() {
                    break;
                }
                tokio::select! {
                    _ = cancelled.changed() => break,
                    result = tick() => {
                        if let Err(e) = result {
                            log::warn!("Polling tick for {label} failed: {e}");
                        }
                    }
                }
            }
            log::debug!("Poller for {label} stopped");
        });

        Self {
            entity_id: entity_id.to_string(),
            cancel,
            task,
        }
    }

    /// Entity this poller belongs to.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Stops the poller without waiting. A tick already in flight is
    /// dropped at its next await point.
    pub fn abort(self) {
        let _ = self.cancel.send(true);
        self.task.abort();
        log::debug!("Aborted poller for {}", self.entity_id);
    }

    /// Signals the poller to stop and waits until it has.
    pub async fn cancel(self) {
        // Err only means the task already exited and dropped its receiver.
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            log::warn!("Poller for {} ended abnormally: {e}", self.entity_id);
        }
    }
}
