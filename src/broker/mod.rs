//! MQTT ingestion edge.
//!
//! - [`payload`]: decoding sensor messages into readings
//! - [`subscriber`]: the broker session and its status link

pub mod payload;
pub mod subscriber;

pub use payload::{PayloadError, decode};
pub use subscriber::{BrokerLink, BrokerSubscriber, Dispatch, SubscriberCounters};
