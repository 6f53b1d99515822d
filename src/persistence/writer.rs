//! Count persistence: one committed row per detected crossing.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::Connection;
use sqlx::postgres::PgConnection;

use super::models::{CountEvent, LogLevel, NewCountEvent};
use super::postgres::{PgConnectionPool, is_connection_fatal};
use crate::error::CounterError;

/// Destination for detected counts.
///
/// Implemented by [`CountWriter`]; the ingestion worker only depends on
/// this seam.
pub trait CountSink: Send + Sync + 'static {
    /// Stores one count and returns the stored row.
    fn record(
        &self,
        event: NewCountEvent,
    ) -> impl Future<Output = Result<CountEvent, CounterError>> + Send;
}

/// Appends count rows through the shared [`PgConnectionPool`].
///
/// Every call inserts exactly one new row. There is no deduplication
/// key, so a caller that retries after an ambiguous failure may store
/// the same crossing twice.
#[derive(Debug, Clone)]
pub struct CountWriter {
    pool: PgConnectionPool,
}

impl CountWriter {
    /// Creates a writer over the given pool.
    #[must_use]
    pub fn new(pool: PgConnectionPool) -> Self {
        Self { pool }
    }

    /// Inserts and commits one count row.
    ///
    /// The pooled connection is released on every path; it is discarded
    /// instead of reused when the failure left the session unusable.
    ///
    /// # Errors
    ///
    /// Returns a [`CounterError`] if no connection can be acquired or the
    /// insert/commit fails. The count is lost in that case.
    pub async fn write(&self, event: &NewCountEvent) -> Result<CountEvent, CounterError> {
        let mut conn = self.pool.acquire().await?;
        match insert_count(&mut conn, event).await {
            Ok(stored) => {
                tracing::info!(id = stored.id, timestamp = %stored.timestamp, "count stored");
                Ok(stored)
            }
            Err(e) => {
                if is_connection_fatal(&e) {
                    conn.mark_broken();
                }
                tracing::error!(
                    error = %e,
                    occurred_at = %event.occurred_at,
                    "failed to store count"
                );
                Err(e.into())
            }
        }
    }
}

impl CountSink for CountWriter {
    async fn record(&self, event: NewCountEvent) -> Result<CountEvent, CounterError> {
        self.write(&event).await
    }
}

/// Appends rows to `system_logs`.
#[derive(Debug, Clone)]
pub struct SystemLogWriter {
    pool: PgConnectionPool,
}

impl SystemLogWriter {
    /// Creates a writer over the given pool.
    #[must_use]
    pub fn new(pool: PgConnectionPool) -> Self {
        Self { pool }
    }

    /// Inserts one log row.
    ///
    /// # Errors
    ///
    /// Returns a [`CounterError`] if no connection can be acquired or the
    /// insert fails.
    pub async fn write(
        &self,
        level: LogLevel,
        message: &str,
        source: &str,
    ) -> Result<(), CounterError> {
        let mut conn = self.pool.acquire().await?;
        let result =
            sqlx::query("INSERT INTO system_logs (level, message, source) VALUES ($1, $2, $3)")
                .bind(level.as_str())
                .bind(message)
                .bind(source)
                .execute(&mut *conn)
                .await;
        if let Err(e) = result {
            if is_connection_fatal(&e) {
                conn.mark_broken();
            }
            return Err(e.into());
        }
        Ok(())
    }
}

async fn insert_count(
    conn: &mut PgConnection,
    event: &NewCountEvent,
) -> Result<CountEvent, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let (id, timestamp) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        "INSERT INTO count_events (timestamp) VALUES ($1) RETURNING id, timestamp",
    )
    .bind(event.occurred_at)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(CountEvent { id, timestamp })
}
