//! On-demand health report: database, broker, and last sensor state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use utoipa::ToSchema;

use crate::broker::{BrokerLink, SubscriberCounters};
use crate::domain::SensorSnapshot;
use crate::error::CounterError;
use crate::persistence::PgConnectionPool;
use crate::persistence::postgres::is_connection_fatal;

/// Result of one health check. Connectivity problems are fields, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthStatus {
    /// A pooled connection answered `SELECT 1` within the probe timeout.
    pub database_reachable: bool,
    /// The broker session is currently up.
    pub broker_connected: bool,
    /// Tracker state as last published by the ingestion worker.
    pub last_known_sensor_state: String,
    /// When the tracker accepted that state.
    pub sensor_updated_at: Option<DateTime<Utc>>,
    /// When this report was produced.
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// `true` when both the database and the broker are reachable.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.database_reachable && self.broker_connected
    }
}

/// Broker session report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BrokerStatus {
    /// `"connected"` or `"disconnected"`.
    pub status: &'static str,
    /// Whether the broker session is up.
    pub connected: bool,
    /// Broker `host:port`.
    pub broker: String,
    /// Topic the subscriber listens on.
    pub subscribed_topic: String,
    /// Tracker state as last published.
    pub last_sensor_state: String,
    /// When the tracker accepted that state.
    pub last_sensor_update: Option<DateTime<Utc>>,
    /// Message counters since start.
    pub counters: SubscriberCounters,
}

/// Reports connectivity on demand; reads shared state without mutating it.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    pool: PgConnectionPool,
    broker: BrokerLink,
    sensor: watch::Receiver<SensorSnapshot>,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Creates a monitor over the shared pool, broker link and sensor feed.
    #[must_use]
    pub fn new(
        pool: PgConnectionPool,
        broker: BrokerLink,
        sensor: watch::Receiver<SensorSnapshot>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            broker,
            sensor,
            probe_timeout,
        }
    }

    /// Produces a health report. Never fails.
    pub async fn status(&self) -> HealthStatus {
        let database_reachable = self.probe_database().await;
        let snapshot = *self.sensor.borrow();
        HealthStatus {
            database_reachable,
            broker_connected: self.broker.is_connected(),
            last_known_sensor_state: snapshot.state.to_string(),
            sensor_updated_at: snapshot.updated_at,
            checked_at: Utc::now(),
        }
    }

    /// Returns the broker link this monitor reads from.
    #[must_use]
    pub const fn broker(&self) -> &BrokerLink {
        &self.broker
    }

    /// Reports the broker session, subscribed topic, last sensor state
    /// and message counters.
    #[must_use]
    pub fn broker_status(&self) -> BrokerStatus {
        let snapshot = self.sensor_snapshot();
        let connected = self.broker.is_connected();
        BrokerStatus {
            status: if connected { "connected" } else { "disconnected" },
            connected,
            broker: self.broker.broker().to_string(),
            subscribed_topic: self.broker.topic().to_string(),
            last_sensor_state: snapshot.state.to_string(),
            last_sensor_update: snapshot.updated_at,
            counters: self.broker.counters(),
        }
    }

    /// Returns the latest tracker snapshot.
    #[must_use]
    pub fn sensor_snapshot(&self) -> SensorSnapshot {
        *self.sensor.borrow()
    }

    async fn probe_database(&self) -> bool {
        let probe = async {
            let mut conn = self.pool.acquire().await?;
            if let Err(e) = sqlx::query("SELECT 1").execute(&mut *conn).await {
                if is_connection_fatal(&e) {
                    conn.mark_broken();
                }
                return Err(CounterError::from(e));
            }
            Ok::<(), CounterError>(())
        };

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "database health probe failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "database health probe timed out"
                );
                false
            }
        }
    }
}
