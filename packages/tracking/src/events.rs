//! Outbound event delivery seam.
//!
//! The tracking service never talks to a notification transport
//! directly; it hands every [`TrackingEvent`] to an [`EventSink`].
//! Sinks are called after the service releases its state lock.

use geotrack_tracking_models::TrackingEvent;
use tokio::sync::mpsc;

/// Receives tracking events. Implementations must not block for long;
/// anything slow belongs behind a channel.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn publish(&self, event: &TrackingEvent);
}

/// Writes every event to the log. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: &TrackingEvent) {
        match event {
            TrackingEvent::SafetyAlert { message, .. } => {
                log::warn!("Safety alert: {message}");
            }
            TrackingEvent::SessionStarted { .. } | TrackingEvent::SessionEnded { .. } => {
                log::info!("{}: {event:?}", event.entity_id());
            }
            TrackingEvent::ZoneEntered { .. } | TrackingEvent::ZoneExited { .. } => {
                log::debug!("{}: {event:?}", event.entity_id());
            }
        }
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TrackingEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrackingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: &TrackingEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::debug!("Event receiver dropped, discarding {event:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();
        let event = TrackingEvent::SessionStarted {
            entity_id: "rex".to_string(),
            route_id: Uuid::new_v4(),
            walker: None,
            timestamp: Utc::now(),
        };
        sink.publish(&event);
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(&TrackingEvent::SafetyAlert {
            entity_id: "rex".to_string(),
            zone: "home".to_string(),
            message: "left".to_string(),
            timestamp: Utc::now(),
        });
    }
}
