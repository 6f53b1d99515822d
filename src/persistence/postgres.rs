//! PostgreSQL plumbing: connector, pool construction, and migrations.

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::ConnectOptions;

use super::pool::{ConnectionPool, Connector, PoolOptions};
use crate::config::DatabaseConfig;
use crate::error::CounterError;

/// Embedded schema migrations (`./migrations`).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Connection pool over PostgreSQL sessions.
pub type PgConnectionPool = ConnectionPool<PgConnector>;

/// Opens single PostgreSQL sessions for the [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    /// Creates a connector from a `postgres://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Config`] if the URL cannot be parsed.
    pub fn from_url(url: &str) -> Result<Self, CounterError> {
        let options = url
            .parse::<PgConnectOptions>()
            .map_err(|e| CounterError::Config(format!("invalid database url: {e}")))?;
        Ok(Self { options })
    }
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, CounterError> {
        let conn = self.options.connect().await?;
        Ok(conn)
    }
}

/// Builds the pool described by `config`, pre-warming its minimum size.
///
/// # Errors
///
/// Returns a [`CounterError`] if the URL or bounds are invalid, or if the
/// database cannot be reached to open the pre-warmed connections.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgConnectionPool, CounterError> {
    ConnectionPool::connect(PgConnector::from_url(&config.url)?, pool_options(config)).await
}

/// Builds the pool described by `config` without touching the database.
///
/// # Errors
///
/// Returns a [`CounterError`] if the URL or bounds are invalid.
pub fn connect_pool_lazy(config: &DatabaseConfig) -> Result<PgConnectionPool, CounterError> {
    ConnectionPool::connect_lazy(PgConnector::from_url(&config.url)?, pool_options(config))
}

fn pool_options(config: &DatabaseConfig) -> PoolOptions {
    PoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
}

/// Applies the embedded migrations through one pooled connection.
///
/// # Errors
///
/// Returns a [`CounterError::Database`] if a connection cannot be
/// acquired or a migration fails.
pub async fn run_migrations(pool: &PgConnectionPool) -> Result<(), CounterError> {
    let mut conn = pool.acquire().await?;
    if let Err(e) = MIGRATOR.run(&mut *conn).await {
        conn.mark_broken();
        return Err(e.into());
    }
    tracing::info!("database migrations applied");
    Ok(())
}

/// Returns `true` when `err` means the session itself is unusable, as
/// opposed to a statement-level failure on a healthy session.
#[must_use]
pub fn is_connection_fatal(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
    )
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn config(url: &str, min: u32, max: u32) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            min_connections: min,
            max_connections: max,
            run_migrations: false,
        }
    }

    #[test]
    fn lazy_pool_does_not_connect() {
        let pool = connect_pool_lazy(&config("postgres://u:p@127.0.0.1:1/db", 1, 4));
        let Ok(pool) = pool else {
            panic!("lazy pool build failed");
        };
        assert_eq!(pool.max_connections(), 4);
        assert_eq!(pool.status().idle, 0);
    }

    #[test]
    fn rejects_unparsable_url() {
        let result = connect_pool_lazy(&config("not a url", 1, 4));
        assert!(matches!(result, Err(CounterError::Config(_))));
    }

    #[test]
    fn classifies_io_errors_as_fatal() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(is_connection_fatal(&io));
        assert!(!is_connection_fatal(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn unreachable_database_fails_acquire() {
        let Ok(pool) = connect_pool_lazy(&config("postgres://u:p@127.0.0.1:1/db", 0, 1)) else {
            panic!("lazy pool build failed");
        };
        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.status().outstanding, 0);
    }
}
