//! Read queries over stored counts and their aggregation views.

use chrono::{DateTime, Utc};

use crate::error::CounterError;
use crate::persistence::postgres::{PgConnector, is_connection_fatal};
use crate::persistence::views::{
    COUNT_TODAY_SQL, LAST_EVENT_SQL, RECENT_COUNTS_SQL, SYSTEM_LOGS_SQL, TODAY_SUMMARY_SQL,
    TOTAL_COUNT_SQL,
};
use crate::persistence::{
    AggregationView, CountEvent, CountStatistics, Datapoint, LogLevel, PgConnectionPool,
    PooledConnection, SystemLog, TodaySummary,
};

/// Widest day window a series query may request.
pub const MAX_DAYS_LIMIT: u32 = 3_660;

/// Largest page of raw counts returned at once.
pub const MAX_PAGE_SIZE: u32 = 1_000;

/// Most system log rows one request may ask for.
pub const MAX_LOG_LIMIT: u32 = 500;

/// Executes allow-listed read queries through the shared pool.
///
/// Each method checks out one connection for its duration; it goes back
/// to the pool on every path and is discarded if the session broke.
#[derive(Debug, Clone)]
pub struct AggregationQueryService {
    pool: PgConnectionPool,
}

impl AggregationQueryService {
    /// Creates a query service over the given pool.
    #[must_use]
    pub fn new(pool: PgConnectionPool) -> Self {
        Self { pool }
    }

    /// Returns `(value, timestampMillis)` datapoints of `view_name`,
    /// ascending by time, for the last `days_limit` days.
    ///
    /// Both names are validated before any connection is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::InvalidIdentifier`] for names outside the
    /// allow-list, [`CounterError::InvalidRequest`] for an oversized
    /// window, or a database error.
    pub async fn query(
        &self,
        view_name: &str,
        value_column: &str,
        days_limit: u32,
    ) -> Result<Vec<Datapoint>, CounterError> {
        let (view, column) = AggregationView::resolve(view_name, value_column)?;
        self.query_view(view, column, days_limit).await
    }

    /// Same as [`query`](Self::query) for an already-resolved view.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::InvalidIdentifier`] if `column` does not
    /// belong to `view`, [`CounterError::InvalidRequest`] for an oversized
    /// window, or a database error.
    pub async fn query_view(
        &self,
        view: AggregationView,
        column: &'static str,
        days_limit: u32,
    ) -> Result<Vec<Datapoint>, CounterError> {
        if !view.value_columns().contains(&column) {
            return Err(CounterError::InvalidIdentifier(column.to_string()));
        }
        let days = days_window(days_limit)?;
        let sql = view.series_sql(column);

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_as::<_, (f64, i64)>(&sql)
            .bind(days)
            .fetch_all(&mut *conn)
            .await;
        let rows = settle(&mut conn, result)?;

        tracing::debug!(view = view.view_name(), days, rows = rows.len(), "series query");
        Ok(rows
            .into_iter()
            .map(|(value, ts_ms)| Datapoint(value, ts_ms))
            .collect())
    }

    /// Reads the single-row summary of the current day.
    ///
    /// # Errors
    ///
    /// Returns a [`CounterError`] on database failure.
    pub async fn today_summary(&self) -> Result<TodaySummary, CounterError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_as::<_, (i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
            TODAY_SUMMARY_SQL,
        )
        .fetch_optional(&mut *conn)
        .await;

        Ok(settle(&mut conn, result)?
            .map(|(total_count, first_event_at, last_event_at)| TodaySummary {
                total_count,
                first_event_at,
                last_event_at,
            })
            .unwrap_or_default())
    }

    /// Reads total count, today's count, and the newest timestamp.
    ///
    /// These are three separate aggregate reads, not one snapshot; a
    /// concurrent write may land between them.
    ///
    /// # Errors
    ///
    /// Returns a [`CounterError`] on database failure.
    pub async fn statistics(&self) -> Result<CountStatistics, CounterError> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query_scalar::<_, i64>(TOTAL_COUNT_SQL)
            .fetch_one(&mut *conn)
            .await;
        let total_count = settle(&mut conn, result)?;

        let result = sqlx::query_scalar::<_, i64>(COUNT_TODAY_SQL)
            .fetch_one(&mut *conn)
            .await;
        let count_today = settle(&mut conn, result)?;

        let result = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(LAST_EVENT_SQL)
            .fetch_one(&mut *conn)
            .await;
        let last_event_timestamp = settle(&mut conn, result)?;

        Ok(CountStatistics {
            total_count,
            count_today,
            last_event_timestamp,
            query_timestamp: Utc::now(),
        })
    }

    /// Returns a page of raw counts, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns a [`CounterError`] on database failure.
    pub async fn recent_counts(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CountEvent>, CounterError> {
        let limit = i64::from(limit.clamp(1, MAX_PAGE_SIZE));
        let offset = i64::from(offset);

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_as::<_, (i64, DateTime<Utc>)>(RECENT_COUNTS_SQL)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await;

        Ok(settle(&mut conn, result)?
            .into_iter()
            .map(|(id, timestamp)| CountEvent { id, timestamp })
            .collect())
    }

    /// Returns up to `limit` system log rows, newest first, optionally
    /// restricted to one level.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::InvalidRequest`] when `limit` exceeds
    /// [`MAX_LOG_LIMIT`], or a database error.
    pub async fn system_logs(
        &self,
        limit: u32,
        level: Option<LogLevel>,
    ) -> Result<Vec<SystemLog>, CounterError> {
        if limit > MAX_LOG_LIMIT {
            return Err(CounterError::InvalidRequest(format!(
                "limit must be at most {MAX_LOG_LIMIT}, got {limit}"
            )));
        }

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query_as::<_, (String, String, String, DateTime<Utc>)>(SYSTEM_LOGS_SQL)
            .bind(level.map(LogLevel::as_str))
            .bind(i64::from(limit))
            .fetch_all(&mut *conn)
            .await;

        Ok(settle(&mut conn, result)?
            .into_iter()
            .map(|(level, message, source, timestamp)| SystemLog {
                level,
                message,
                source,
                timestamp,
            })
            .collect())
    }
}

/// Converts a day window to the bound parameter type.
fn days_window(days_limit: u32) -> Result<i32, CounterError> {
    if days_limit > MAX_DAYS_LIMIT {
        return Err(CounterError::InvalidRequest(format!(
            "days must be at most {MAX_DAYS_LIMIT}, got {days_limit}"
        )));
    }
    i32::try_from(days_limit).map_err(|e| CounterError::InvalidRequest(e.to_string()))
}

/// Maps a query result, discarding the connection on session-level errors.
fn settle<T>(
    conn: &mut PooledConnection<PgConnector>,
    result: Result<T, sqlx::Error>,
) -> Result<T, CounterError> {
    result.map_err(|e| {
        if is_connection_fatal(&e) {
            conn.mark_broken();
        }
        CounterError::from(e)
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::persistence::postgres::connect_pool_lazy;

    fn unreachable_service() -> (PgConnectionPool, AggregationQueryService) {
        let config = DatabaseConfig {
            url: "postgres://u:p@127.0.0.1:1/db".to_string(),
            min_connections: 0,
            max_connections: 2,
            run_migrations: false,
        };
        let Ok(pool) = connect_pool_lazy(&config) else {
            panic!("lazy pool build failed");
        };
        (pool.clone(), AggregationQueryService::new(pool))
    }

    #[tokio::test]
    async fn invalid_identifier_rejected_before_connecting() {
        let (pool, service) = unreachable_service();
        let result = service.query("; DROP TABLE x", "total_counts", 7).await;
        assert!(matches!(result, Err(CounterError::InvalidIdentifier(_))));

        let result = service.query("hourly_counts", "total_counts; --", 7).await;
        assert!(matches!(result, Err(CounterError::InvalidIdentifier(_))));

        assert_eq!(pool.status().outstanding, 0);
    }

    #[tokio::test]
    async fn oversized_window_rejected() {
        let (_, service) = unreachable_service();
        let result = service
            .query("daily_counts", "total_counts", MAX_DAYS_LIMIT + 1)
            .await;
        assert!(matches!(result, Err(CounterError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn column_must_belong_to_view() {
        let (_, service) = unreachable_service();
        let result = service
            .query_view(AggregationView::RecentCounts, "total_counts", 1)
            .await;
        assert!(matches!(result, Err(CounterError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn unreachable_database_surfaces_as_error() {
        let (pool, service) = unreachable_service();
        assert!(service.query("hourly_counts", "total_counts", 7).await.is_err());
        assert!(service.statistics().await.is_err());
        assert_eq!(pool.status().outstanding, 0);
    }

    #[tokio::test]
    async fn oversized_log_limit_rejected_before_connecting() {
        let (pool, service) = unreachable_service();
        let result = service.system_logs(MAX_LOG_LIMIT + 1, None).await;
        assert!(matches!(result, Err(CounterError::InvalidRequest(_))));
        assert_eq!(pool.status().outstanding, 0);

        let result = service.system_logs(MAX_LOG_LIMIT, Some(LogLevel::Error)).await;
        assert!(result.is_err());
        assert_eq!(pool.status().outstanding, 0);
    }

    #[test]
    fn day_window_bounds() {
        assert_eq!(days_window(0).ok(), Some(0));
        assert_eq!(days_window(365).ok(), Some(365));
        assert!(days_window(MAX_DAYS_LIMIT + 1).is_err());
    }
}
