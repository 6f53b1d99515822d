//! Service layer: ingestion, read queries, and health reporting.
//!
//! [`IngestionWorker`] turns the reading queue into stored counts,
//! [`AggregationQueryService`] serves the read path, and
//! [`HealthMonitor`] reports connectivity on demand. All three share the
//! same [`crate::persistence::PgConnectionPool`].
//! [`record_broker_transitions`] keeps broker session changes in
//! `system_logs`.

pub mod dashboard;
pub mod health;
pub mod ingestion;
pub mod query_service;
pub mod system_log;

pub use dashboard::{DashboardResponse, DashboardTarget};
pub use health::{BrokerStatus, HealthMonitor, HealthStatus};
pub use ingestion::{IngestionSummary, IngestionWorker};
pub use query_service::AggregationQueryService;
pub use system_log::record_broker_transitions;
