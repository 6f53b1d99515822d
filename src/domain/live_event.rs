//! Events pushed to live dashboard subscribers.
//!
//! The ingestion worker emits a [`LiveEvent`] through the
//! [`super::EventBus`] whenever the barrier state changes or a count is
//! persisted. Nothing here is durable; lagging receivers lose events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SensorState;

/// Domain event broadcast to WebSocket subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A crossing was detected and its row committed.
    CountRecorded {
        /// Storage-assigned identifier.
        id: i64,
        /// Stored event time.
        timestamp: DateTime<Utc>,
    },

    /// The tracker accepted a state different from the previous one.
    SensorStateChanged {
        /// New barrier state.
        state: SensorState,
        /// Receipt time of the reading.
        timestamp: DateTime<Utc>,
    },
}

impl LiveEvent {
    /// Every discriminator [`event_type_str`](Self::event_type_str) can return.
    pub const EVENT_TYPES: [&'static str; 2] = ["count_recorded", "sensor_state_changed"];

    /// Returns the event type discriminator string.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::CountRecorded { .. } => "count_recorded",
            Self::SensorStateChanged { .. } => "sensor_state_changed",
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::CountRecorded { timestamp, .. } | Self::SensorStateChanged { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_type_tag() {
        let event = LiveEvent::SensorStateChanged {
            state: SensorState::Interrupted,
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(json["event_type"], "sensor_state_changed");
        assert_eq!(json["state"], "interrupted");
        assert_eq!(event.event_type_str(), "sensor_state_changed");
    }

    #[test]
    fn count_recorded_carries_id() {
        let event = LiveEvent::CountRecorded {
            id: 42,
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(json["id"], 42);
        assert_eq!(json["event_type"], "count_recorded");
    }
}
