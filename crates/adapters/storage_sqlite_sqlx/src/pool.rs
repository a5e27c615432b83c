//! `SQLite` connection pool setup and migration runner.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StorageError;

/// Configuration for the `SQLite` storage adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:cadence.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(self.database_url).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
#[derive(Debug, Clone)]
pub struct Database {
    url: String,
    pool: SqlitePool,
    others: Arc<Mutex<HashMap<String, SqlitePool>>>,
}

impl Database {
    async fn initialize(url: String) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        let pool = pool_options(&url).connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(%url, "database ready");

        Ok(Self {
            url,
            pool,
            others: Arc::default(),
        })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pool for `url`: this database's own pool when `url` is empty or names
    /// this database, otherwise a pool opened lazily on the first request
    /// for `url` and shared by every later one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when `url` is not a valid `SQLite` URL.
    pub fn resolve(&self, url: &str) -> Result<SqlitePool, StorageError> {
        if url.is_empty() || url == self.url {
            return Ok(self.pool.clone());
        }
        let mut others = self.others.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = others.get(url) {
            return Ok(pool.clone());
        }
        let options = SqliteConnectOptions::from_str(url)?;
        let pool = pool_options(url).connect_lazy_with(options);
        tracing::debug!(%url, "secondary pool opened");
        others.insert(url.to_string(), pool.clone());
        Ok(pool)
    }
}

/// A `:memory:` database disappears with its last connection, so one is kept open.
fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
    }
}
