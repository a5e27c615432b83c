//! `SQLite` implementation of [`ScalarStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use cadence_app::ports::{Scalar, ScalarStore};
use cadence_domain::error::CadenceError;
use cadence_domain::time::{self, Timestamp};

use crate::error::StorageError;

struct Wrapper(Scalar);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let updated_at: String = row.try_get("updated_at")?;
        Ok(Self(Scalar {
            value: row.try_get("value")?,
            timestamp: time::parse(&updated_at).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO scalars (path, value, updated_at) VALUES (?, ?, ?)
    ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
";

/// Audit values kept in the `scalars` table, one row per path.
#[derive(Debug, Clone)]
pub struct SqliteScalarStore {
    pool: SqlitePool,
}

impl SqliteScalarStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every stored path under `prefix`, in path order.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the query fails.
    pub async fn list(&self, prefix: &str) -> Result<Vec<(String, Scalar)>, CadenceError> {
        let rows = sqlx::query(
            "SELECT path, value, updated_at FROM scalars WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        rows.iter()
            .map(|row| Ok((row.try_get("path")?, Wrapper::from_row(row)?.0)))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|err| StorageError::from(err).into())
    }
}

impl ScalarStore for SqliteScalarStore {
    async fn set(&self, path: &str, value: bool, timestamp: Timestamp) -> Result<(), CadenceError> {
        sqlx::query(UPSERT)
            .bind(path)
            .bind(value)
            .bind(time::format(timestamp))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Scalar>, CadenceError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT value, updated_at FROM scalars WHERE path = ?")
                .bind(path)
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::{TimeDelta, TimeZone, Utc};

    async fn store() -> SqliteScalarStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteScalarStore::new(db.pool().clone())
    }

    fn at(minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, minute, 0).unwrap()
            + TimeDelta::microseconds(250)
    }

    #[tokio::test]
    async fn should_return_none_for_unknown_path() {
        let store = store().await;
        assert!(store.get("Automations/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_replace_previous_value() {
        let store = store().await;
        store.set("Automations/a", true, at(1)).await.unwrap();
        store.set("Automations/a", false, at(2)).await.unwrap();

        assert_eq!(
            store.get("Automations/a").await.unwrap(),
            Some(Scalar {
                value: false,
                timestamp: at(2),
            })
        );
    }

    #[tokio::test]
    async fn should_list_paths_under_prefix() {
        let store = store().await;
        store.set("Automations/etl/a", true, at(1)).await.unwrap();
        store.set("Automations/etl/a/hourly", true, at(1)).await.unwrap();
        store.set("Automations/web/b", false, at(1)).await.unwrap();

        let listed = store.list("Automations/etl/").await.unwrap();
        let paths: Vec<&str> = listed.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(paths, ["Automations/etl/a", "Automations/etl/a/hourly"]);
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }
}
