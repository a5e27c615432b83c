//! `SQLite` implementation of [`JobRepository`] and [`JobSubmitter`].

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use cadence_app::ports::{JobRepository, JobRepositoryProviders, JobSubmitter};
use cadence_domain::error::{CadenceError, NotFoundError};
use cadence_domain::id::JobId;
use cadence_domain::job::{Job, JobStatus};
use cadence_domain::time::{self, Timestamp};

use crate::error::StorageError;
use crate::pool::Database;

/// Job repository kind under which this adapter registers.
pub const KIND: &str = "sqlite";

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Job);

fn decode<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

fn timestamp(text: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    text.map(|text| time::parse(&text).map_err(decode)).transpose()
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let parameters: String = row.try_get("parameters")?;
        let requested: String = row.try_get("requested")?;

        let parameters: BTreeMap<String, String> =
            serde_json::from_str(&parameters).map_err(decode)?;

        Ok(Self(Job {
            id: JobId::from_uuid(id),
            task_id: row.try_get("task_id")?,
            status: JobStatus::from_str(&status).map_err(decode)?,
            host_group: row.try_get("host_group")?,
            priority: row.try_get("priority")?,
            tag: row.try_get("tag")?,
            parameters,
            requested: time::parse(&requested).map_err(decode)?,
            started: timestamp(row.try_get("started")?)?,
            finished: timestamp(row.try_get("finished")?)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO jobs (id, task_id, status, host_group, priority, tag, parameters, requested, started, finished)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_TASK: &str = r"
    SELECT * FROM jobs
    WHERE task_id = ? AND (? IS NULL OR status = ?)
    ORDER BY requested ASC
";

const UPDATE_STATUS: &str = r"
    UPDATE jobs
    SET status = ?,
        started = COALESCE(started, ?),
        finished = ?
    WHERE id = ?
";

/// `SQLite`-backed job store.
#[derive(Debug, Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Job repository table holding the `sqlite` kind.
    ///
    /// An empty connection string, or the database's own URL, reuses its
    /// pool; any other string opens a separate database lazily.
    #[must_use]
    pub fn providers(database: Database) -> JobRepositoryProviders {
        JobRepositoryProviders::new().with(KIND, move |connection_string: &str| {
            let pool = database.resolve(connection_string)?;
            Ok(Arc::new(Self::new(pool)) as Arc<dyn JobRepository>)
        })
    }

    /// Look up a job by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the query fails.
    pub async fn get(&self, id: JobId) -> Result<Option<Job>, CadenceError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    /// Move a job to `status` at `at`.
    ///
    /// The first transition records `started`; finished states record `finished`.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::NotFound`] when no job has this id, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: JobId,
        status: JobStatus,
        at: Timestamp,
    ) -> Result<(), CadenceError> {
        let at = time::format(at);
        let started = (status != JobStatus::Pending).then(|| at.clone());
        let finished = status.is_finished().then_some(at);
        let result = sqlx::query(UPDATE_STATUS)
            .bind(status.to_string())
            .bind(started)
            .bind(finished)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Job",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn find_by_task(
        &self,
        task_id: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, CadenceError> {
        let status = status.map(|s| s.to_string());
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_TASK)
            .bind(task_id)
            .bind(&status)
            .bind(&status)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl JobSubmitter for SqliteJobRepository {
    #[tracing::instrument(skip_all, fields(task_id = %job.task_id))]
    async fn submit(&self, job: Job) -> Result<Job, CadenceError> {
        let parameters = serde_json::to_string(&job.parameters).map_err(StorageError::from)?;
        sqlx::query(INSERT)
            .bind(job.id.as_uuid())
            .bind(&job.task_id)
            .bind(job.status.to_string())
            .bind(&job.host_group)
            .bind(job.priority)
            .bind(&job.tag)
            .bind(&parameters)
            .bind(time::format(job.requested))
            .bind(job.started.map(time::format))
            .bind(job.finished.map(time::format))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(job)
    }
}
