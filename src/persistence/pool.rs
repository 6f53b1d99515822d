//! Bounded pool of reusable database connections.
//!
//! [`ConnectionPool`] lends connections produced by a [`Connector`] and
//! takes them back when the [`PooledConnection`] guard is dropped. A
//! [`tokio::sync::Semaphore`] bounds the number of outstanding guards;
//! the idle set sits behind a short-lived [`std::sync::Mutex`] so that
//! release can happen synchronously in `Drop`, on every exit path.
//!
//! # Concurrency
//!
//! - `acquire` waits (without a timeout) while `max_connections` guards
//!   are outstanding. Wrap it in [`tokio::time::timeout`] for a bounded wait.
//! - A guard is owned by exactly one caller; connections are never shared.
//! - A guard marked broken is dropped instead of returned, and the next
//!   `acquire` opens a replacement.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::CounterError;

/// Opens new connections for a [`ConnectionPool`].
pub trait Connector: Send + Sync + 'static {
    /// Connection type handed out by the pool.
    type Connection: Send + 'static;

    /// Opens one new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, CounterError>> + Send;
}

/// Size bounds for a [`ConnectionPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    min_connections: u32,
    max_connections: u32,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
        }
    }
}

impl PoolOptions {
    /// Creates options with the default bounds (1..=10).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of connections opened when the pool is built.
    #[must_use]
    pub const fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the hard upper bound on outstanding connections.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    fn validate(&self) -> Result<(), CounterError> {
        if self.max_connections == 0 {
            return Err(CounterError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(CounterError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Counters describing the pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Configured capacity.
    pub max_connections: u32,
    /// Connections currently checked out.
    pub outstanding: usize,
    /// Open connections waiting to be reused.
    pub idle: usize,
    /// Connections dropped because they were marked broken.
    pub discarded: usize,
}

struct PoolInner<C: Connector> {
    connector: C,
    idle: Mutex<VecDeque<C::Connection>>,
    permits: Arc<Semaphore>,
    max_connections: u32,
    outstanding: AtomicUsize,
    discarded: AtomicUsize,
}

impl<C: Connector> PoolInner<C> {
    fn take_idle(&self) -> Option<C::Connection> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn put_idle(&self, conn: C::Connection) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(conn);
    }

    fn idle_len(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Bounded, shareable pool of connections.
///
/// Cloning is cheap and yields a handle to the same pool.
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Builds a pool and opens `min_connections` connections up front.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Config`] for invalid bounds, or the
    /// connector's error if a pre-warmed connection cannot be opened.
    pub async fn connect(connector: C, options: PoolOptions) -> Result<Self, CounterError> {
        let pool = Self::connect_lazy(connector, options)?;
        for _ in 0..options.min_connections {
            let conn = pool.inner.connector.connect().await?;
            pool.inner.put_idle(conn);
        }
        tracing::info!(
            min = options.min_connections,
            max = options.max_connections,
            "connection pool ready"
        );
        Ok(pool)
    }

    /// Builds a pool without opening any connection.
    ///
    /// Connections are opened on first demand.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Config`] for invalid bounds.
    pub fn connect_lazy(connector: C, options: PoolOptions) -> Result<Self, CounterError> {
        options.validate()?;
        let max = options.max_connections;
        Ok(Self {
            inner: Arc::new(PoolInner {
                connector,
                idle: Mutex::new(VecDeque::with_capacity(max as usize)),
                permits: Arc::new(Semaphore::new(max as usize)),
                max_connections: max,
                outstanding: AtomicUsize::new(0),
                discarded: AtomicUsize::new(0),
            }),
        })
    }

    /// Checks out a connection, waiting while the pool is at capacity.
    ///
    /// Reuses an idle connection when one exists, otherwise opens a new
    /// one. The connection returns to the pool when the guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::PoolClosed`] if the pool was closed, or the
    /// connector's error if a new connection cannot be opened. In both
    /// cases the capacity slot is released.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, CounterError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| CounterError::PoolClosed)?;

        let conn = match self.inner.take_idle() {
            Some(conn) => conn,
            None => {
                tracing::debug!("opening new pooled connection");
                self.inner.connector.connect().await?
            }
        };

        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            broken: false,
            _permit: permit,
        })
    }

    /// Returns a connection to the pool.
    ///
    /// Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection<C>) {
        drop(conn);
    }

    /// Closes the pool: pending and future `acquire` calls fail and idle
    /// connections are dropped. Outstanding guards are discarded on return.
    pub fn close(&self) {
        self.inner.permits.close();
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.inner.max_connections
    }

    /// Returns a snapshot of the pool counters.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_connections: self.inner.max_connections,
            outstanding: self.inner.outstanding.load(Ordering::Acquire),
            idle: self.inner.idle_len(),
            discarded: self.inner.discarded.load(Ordering::Acquire),
        }
    }
}

/// Exclusive handle to a pooled connection.
///
/// Dereferences to the underlying connection. Dropping the guard returns
/// the connection to its pool, or discards it if it was marked broken.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    pool: Arc<PoolInner<C>>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    /// Marks the connection unusable; it is discarded instead of reused.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Returns `true` if [`mark_broken`](Self::mark_broken) was called.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.broken
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken in drop"),
        }
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken in drop"),
        }
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.broken {
            self.pool.discarded.fetch_add(1, Ordering::AcqRel);
            tracing::warn!("discarding broken pooled connection");
            drop(conn);
        } else if !self.pool.permits.is_closed() {
            self.pool.put_idle(conn);
        }
        // `_permit` drops after this body, so the slot frees only once the
        // connection is back in the idle set.
    }
}
