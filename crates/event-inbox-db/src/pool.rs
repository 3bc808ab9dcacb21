//! Connection pool management for `PostgreSQL`.
//!
//! Provides a configurable connection pool using `SQLx`'s `PgPool`.

use crate::error::DbError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// A wrapper around `SQLx`'s `PostgreSQL` connection pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect to `PostgreSQL` using the provided database URL.
    ///
    /// Uses default pool options (min: 2, max: 10, timeout: 5s).
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if the connection cannot be
    /// established.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with_options(database_url, DbPoolOptions::default()).await
    }

    /// Connect to `PostgreSQL` with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        options: DbPoolOptions,
    ) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .min_connections(options.min_connections)
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { inner: pool })
    }

    /// Connect, retrying until the database becomes reachable or the window
    /// elapses.
    ///
    /// Container orchestration starts the database and the server together;
    /// `depends_on` does not wait for readiness, so the first attempts may
    /// land before `PostgreSQL` accepts connections.
    ///
    /// # Errors
    ///
    /// Returns the last `DbError::ConnectionFailed` once the window elapses.
    pub async fn connect_with_retry(
        database_url: &str,
        options: DbPoolOptions,
        window: Duration,
    ) -> Result<Self, DbError> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match Self::connect_with_options(database_url, options.clone()).await {
                Ok(pool) => return Ok(pool),
                Err(e) if tokio::time::Instant::now() < deadline => {
                    tracing::warn!(error = %e, "Database not ready, retrying");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get a reference to the inner `SQLx` pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

/// Configuration options for the database connection pool.
#[derive(Debug, Clone)]
pub struct DbPoolOptions {
    /// Minimum number of connections to maintain in the pool.
    ///
    /// Default: 2
    pub min_connections: u32,

    /// Maximum number of connections allowed in the pool.
    ///
    /// Default: 10
    pub max_connections: u32,

    /// Maximum time to wait when acquiring a connection.
    ///
    /// Default: 5 seconds
    pub acquire_timeout: Duration,
}

impl Default for DbPoolOptions {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}
