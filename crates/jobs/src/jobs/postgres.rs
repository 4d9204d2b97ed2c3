//! Postgres-backed job store.
//!
//! ## Schema
//!
//! One row per undecoded job in `comic_jobs`; parameters are a flat JSON object of
//! strings. Rows are deleted by the decoder, so the table is normally empty.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | JobStoreError |
//! |------------|----------------------|---------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` (on insert) |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed | N/A | `Storage` |
//! | Other | N/A | `Storage` |
//!
//! Rows that cannot be turned back into a [`JobRecord`] (unknown job type, parameters
//! that are not a string map) are logged and skipped by `load_pending`; they stay in
//! the table for inspection.
//!
//! ## Sync bridge
//!
//! [`JobStore`] is synchronous. The store keeps the runtime handle it was created on and
//! blocks on it. Trait calls made from inside any tokio runtime fail with `Storage`
//! instead of blocking; async callers use the inherent methods.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tokio::runtime::Handle;
use tracing::{Span, error, instrument};
use uuid::Uuid;

use comicshelf_core::ComicId;

use super::store::{JobStore, JobStoreError};
use super::types::{JobId, JobRecord, JobType};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS comic_jobs (
    id UUID PRIMARY KEY,
    job_type TEXT NOT NULL,
    comic_id BIGINT NULL,
    parameters JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
    handle: Handle,
}

impl PostgresJobStore {
    /// Must be called inside a tokio runtime; the current handle is captured.
    pub fn new(pool: PgPool) -> Result<Self, JobStoreError> {
        let handle = Handle::try_current().map_err(|_| {
            JobStoreError::Storage(
                "PostgresJobStore requires a tokio runtime at construction".to_string(),
            )
        })?;
        Ok(Self::with_handle(pool, handle))
    }

    pub fn with_handle(pool: PgPool, handle: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            handle,
        }
    }

    /// Connect to `database_url` and make sure the jobs table exists.
    pub async fn connect(database_url: &str) -> Result<Self, JobStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool)?;
        store.ensure_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), JobStoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, record),
        fields(job_id = %record.id, job_type = %record.job_type),
        err
    )]
    pub async fn insert(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let parameters = serde_json::to_value(&record.parameters)
            .map_err(|e| JobStoreError::Storage(format!("failed to encode parameters: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO comic_jobs (id, job_type, comic_id, parameters, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.job_type.as_str())
        .bind(record.subject.map(ComicId::get))
        .bind(parameters)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                JobStoreError::AlreadyExists(record.id)
            } else {
                map_sqlx_error("insert", e)
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_count = tracing::field::Empty), err)]
    pub async fn load_pending(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_type, comic_id, parameters, created_at
            FROM comic_jobs
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_pending", e))?;

        let rows = rows
            .iter()
            .map(JobRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobStoreError::Corrupt(format!("failed to read job row: {e}")))?;
        let records = readable_records(rows);

        Span::current().record("job_count", records.len());
        Ok(records)
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    pub async fn remove(&self, id: JobId) -> Result<(), JobStoreError> {
        let result = sqlx::query("DELETE FROM comic_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove", e))?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_type = %job_type), err)]
    pub async fn count_by_type(&self, job_type: JobType) -> Result<usize, JobStoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comic_jobs WHERE job_type = $1")
            .bind(job_type.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_by_type", e))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl PostgresJobStore {
    fn block_on<T>(
        &self,
        operation: &str,
        future: impl Future<Output = Result<T, JobStoreError>>,
    ) -> Result<T, JobStoreError> {
        if Handle::try_current().is_ok() {
            return Err(JobStoreError::Storage(format!(
                "{operation} called from inside an async runtime; use the async store methods"
            )));
        }
        self.handle.block_on(future)
    }
}

impl JobStore for PostgresJobStore {
    fn create(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        self.block_on("create", self.insert(record))
    }

    fn find_all_pending(&self) -> Result<Vec<JobRecord>, JobStoreError> {
        self.block_on("find_all_pending", self.load_pending())
    }

    fn delete(&self, id: JobId) -> Result<(), JobStoreError> {
        self.block_on("delete", self.remove(id))
    }

    fn count_pending(&self, job_type: JobType) -> Result<usize, JobStoreError> {
        self.block_on("count_pending", self.count_by_type(job_type))
    }
}

/// Convert rows in order, dropping the ones that no longer describe a job.
fn readable_records(rows: Vec<JobRow>) -> Vec<JobRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match row.into_record() {
                Ok(record) => Some(record),
                Err(err) => {
                    error!(job_id = %id, error = %err, "skipping unreadable job row");
                    None
                }
            }
        })
        .collect()
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => JobStoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => JobStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

// SQLx row types

#[derive(Debug)]
struct JobRow {
    id: Uuid,
    job_type: String,
    comic_id: Option<i64>,
    parameters: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            job_type: row.try_get("job_type")?,
            comic_id: row.try_get("comic_id")?,
            parameters: row.try_get("parameters")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord, JobStoreError> {
        let job_type = JobType::from_name(&self.job_type).ok_or_else(|| {
            JobStoreError::Corrupt(format!(
                "job {} has unknown job type `{}`",
                self.id, self.job_type
            ))
        })?;

        let parameters: HashMap<String, String> = serde_json::from_value(self.parameters)
            .map_err(|e| {
                JobStoreError::Corrupt(format!("job {} has malformed parameters: {e}", self.id))
            })?;

        Ok(JobRecord {
            id: JobId::from_uuid(self.id),
            job_type,
            subject: self.comic_id.map(ComicId::new),
            parameters,
            created_at: self.created_at,
        })
    }
}
