//! Database pool management
//!
//! The lifecycle manager opens a pool at startup when `database.enabled` is
//! set and closes it during shutdown. Services that manage their own pool
//! can use [`Database::open`] directly.

use once_cell::sync::OnceCell;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{sanitize_url, Error, Result};

/// An open connection pool with its lifecycle owned by the caller
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open a pool using the configured limits.
    ///
    /// Connection failures surface immediately rather than on first use, so
    /// a service with a bad database URL fails at startup.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        if config.driver != "postgres" {
            return Err(Error::Internal(format!(
                "unsupported driver {}",
                config.driver
            )));
        }
        tracing::info!(url = %sanitize_url(&config.url), "connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Borrow the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }
}

static DEFAULT_POOL: OnceCell<PgPool> = OnceCell::new();

/// Install a process-wide default pool for integration tests.
///
/// Intended for test harnesses that open one pool and share it across
/// fixtures. The first call wins; later calls are ignored.
pub fn set_default_for_tests(pool: PgPool) {
    let _ = DEFAULT_POOL.set(pool);
}

/// The pool installed by [`set_default_for_tests`], if any
pub fn default_pool() -> Option<&'static PgPool> {
    DEFAULT_POOL.get()
}
