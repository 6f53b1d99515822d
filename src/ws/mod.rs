//! WebSocket layer: live count and sensor-state feed.
//!
//! The endpoint at `/ws` pushes every [`LiveEvent`](crate::domain::LiveEvent)
//! to connected clients. Clients may narrow the feed by event type and ask
//! for the tracker's current state.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
