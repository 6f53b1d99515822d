//! # barrier-counter
//!
//! Counts objects passing a light barrier. A sensor publishes its state
//! (`free` / `interrupted`) over MQTT; every `interrupted → free` edge is
//! one crossing, stored as a row in PostgreSQL and served back as
//! aggregated time series for dashboards.
//!
//! ## Architecture
//!
//! ```text
//! MQTT broker
//!     │
//!     ├── BrokerSubscriber (broker/)        decode, forward in order
//!     │       │ bounded mpsc
//!     ├── IngestionWorker (service/)        SensorStateTracker edge rule
//!     │       │
//!     ├── CountWriter (persistence/)  ──►  ConnectionPool ──► PostgreSQL
//!     ├── EventBus (domain/)          ──►  WS feed (ws/)
//!     │
//! Clients (HTTP, WebSocket)
//!     ├── REST Handlers (api/)
//!     ├── AggregationQueryService     ──►  ConnectionPool ──► views
//!     └── HealthMonitor
//! ```

pub mod api;
pub mod app_state;
pub mod broker;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
