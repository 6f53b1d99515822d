//! Persistence layer: connection pool, count writes, and view catalog.
//!
//! Provides the bounded [`pool::ConnectionPool`] shared by the ingestion
//! and read paths, the [`writer::CountWriter`] that appends one row per
//! crossing, and the allow-listed [`views::AggregationView`] catalog that
//! read queries are built from.

pub mod models;
pub mod pool;
pub mod postgres;
pub mod views;
pub mod writer;

pub use models::{
    CountEvent, CountStatistics, Datapoint, LogLevel, NewCountEvent, SystemLog, TodaySummary,
};
pub use pool::{ConnectionPool, Connector, PoolOptions, PoolStatus, PooledConnection};
pub use postgres::{PgConnectionPool, PgConnector};
pub use views::AggregationView;
pub use writer::{CountSink, CountWriter, SystemLogWriter};
