//! Domain layer: barrier states, edge detection, and live events.
//!
//! This module contains the in-memory model of the light barrier: the
//! state vocabulary, the edge-detecting tracker that decides when an
//! object crossed, and the event bus feeding live dashboards.

pub mod event_bus;
pub mod live_event;
pub mod sensor_state;
pub mod tracker;

pub use event_bus::EventBus;
pub use live_event::LiveEvent;
pub use sensor_state::{SensorReading, SensorState};
pub use tracker::{SensorSnapshot, SensorStateTracker, Transition};
