//! Event types for the Veggie Vision event system
//!
//! Components publish what happened (telemetry accepted or rejected,
//! subscriber connection changes, finished analyses) on the [`EventBus`];
//! the HTTP layer streams these to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::EstimateSource;

/// Telemetry subscriber connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    /// Not started, or stopped
    Disconnected,
    /// Opening (or re-opening) the broker connection
    Connecting,
    /// Connected and subscribed to the telemetry topic
    Subscribed,
}

impl SubscriberState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberState::Disconnected => "disconnected",
            SubscriberState::Connecting => "connecting",
            SubscriberState::Subscribed => "subscribed",
        }
    }
}

/// Veggie Vision event types
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VeggieEvent {
    /// A telemetry message was normalized and cached
    AmbientUpdated {
        temperature: f64,
        humidity: f64,
        timestamp: DateTime<Utc>,
    },

    /// A telemetry payload that is not a JSON object was cached as an opaque value
    TelemetryOpaque {
        raw: String,
        timestamp: DateTime<Utc>,
    },

    /// A structured telemetry message failed normalization and was dropped
    TelemetryRejected {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Subscriber moved to a new connection state
    SubscriberStateChanged {
        old_state: SubscriberState,
        new_state: SubscriberState,
        timestamp: DateTime<Utc>,
    },

    /// Ripeness estimate produced for a label
    EstimateProduced {
        label: String,
        source: EstimateSource,
        timestamp: DateTime<Utc>,
    },

    /// An analysis request finished (successfully or not)
    AnalysisCompleted {
        request_id: Uuid,
        prediction: Option<String>,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl VeggieEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            VeggieEvent::AmbientUpdated { .. } => "AmbientUpdated",
            VeggieEvent::TelemetryOpaque { .. } => "TelemetryOpaque",
            VeggieEvent::TelemetryRejected { .. } => "TelemetryRejected",
            VeggieEvent::SubscriberStateChanged { .. } => "SubscriberStateChanged",
            VeggieEvent::EstimateProduced { .. } => "EstimateProduced",
            VeggieEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
        }
    }
}

/// Broadcast bus for [`VeggieEvent`]s
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged subscribers lose the oldest events
///
/// # Examples
///
/// ```
/// use veggie_common::events::{EventBus, VeggieEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(VeggieEvent::TelemetryRejected {
///     reason: "missing field 'humedad'".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VeggieEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<VeggieEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VeggieEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_dropped() {
        let bus = EventBus::new(10);
        bus.emit_lossy(VeggieEvent::TelemetryOpaque {
            raw: "sensor-offline".to_string(),
            timestamp: Utc::now(),
        });

        // Late subscribers only see later events
        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(VeggieEvent::SubscriberStateChanged {
            old_state: SubscriberState::Connecting,
            new_state: SubscriberState::Subscribed,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "SubscriberStateChanged");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = VeggieEvent::EstimateProduced {
            label: "ripe_mango".to_string(),
            source: EstimateSource::Fallback,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "EstimateProduced");
        assert_eq!(json["source"], "fallback");
    }
}
