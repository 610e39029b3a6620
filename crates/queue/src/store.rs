//! Job Store: the authoritative durable queue. All writes are
//! serialized through the same transaction discipline the Credential
//! Store uses (`pool.begin()` … `tx.commit()`), with `FOR UPDATE SKIP
//! LOCKED` claiming so the single-flight invariant holds at the storage
//! layer, not only in-process.

use async_trait::async_trait;
use resume_spine_shared::{JobId, PayloadRef, PrincipalId};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::QueueResult;
use crate::model::{estimate_wait_seconds, CancelOutcome, EnqueueResult, Job, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn enqueue(
        &self,
        principal_id: PrincipalId,
        payload_ref: PayloadRef,
    ) -> QueueResult<EnqueueResult>;

    async fn peek_next(&self) -> QueueResult<Option<Job>>;

    /// Atomically transitions at most one `queued` job to `processing`,
    /// refusing to claim while another job is already `processing`
    /// (single-flight).
    async fn claim_next(&self) -> QueueResult<Option<Job>>;

    async fn complete_success(
        &self,
        job_id: JobId,
        result: serde_json::Value,
        processing_seconds: f64,
    ) -> QueueResult<()>;

    async fn complete_failure(
        &self,
        job_id: JobId,
        error_kind: &str,
        user_facing_message: &str,
        processing_seconds: f64,
    ) -> QueueResult<()>;

    async fn cancel(&self, job_id: JobId, principal_id: PrincipalId) -> QueueResult<CancelOutcome>;

    /// Rewrites position to 1..N for all `queued` rows ordered by
    /// created-at ascending. Idempotent.
    async fn recompute_positions(&self) -> QueueResult<()>;

    async fn get(&self, job_id: JobId) -> QueueResult<Option<Job>>;

    /// Deletes terminal jobs older than `age`. Returns the count removed.
    async fn sweep_terminal(&self, age: std::time::Duration) -> QueueResult<u64>;

    /// Startup recovery: fails forward any job left `processing` by a
    /// crash. Returns the ids recovered; under the single-flight
    /// invariant this is at most one.
    async fn recover_interrupted(&self, error_kind: &str, message: &str) -> QueueResult<Vec<JobId>>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: uuid::Uuid,
    principal_id: uuid::Uuid,
    payload_ref: String,
    status: String,
    position: i32,
    created_at: OffsetDateTime,
    started_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
    result: Option<serde_json::Value>,
    error_kind: Option<String>,
    error_message: Option<String>,
    processing_seconds: Option<f64>,
    estimated_wait_seconds: f64,
}

impl From<JobRow> for Job {
    fn from(r: JobRow) -> Self {
        Job {
            job_id: JobId(r.job_id),
            principal_id: PrincipalId(r.principal_id),
            payload_ref: PayloadRef(r.payload_ref),
            status: JobStatus::from_str(&r.status).unwrap_or(JobStatus::Failed),
            position: r.position,
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
            result: r.result,
            error_kind: r.error_kind,
            error_message: r.error_message,
            processing_seconds: r.processing_seconds,
            estimated_wait_seconds: r.estimated_wait_seconds,
        }
    }
}

const JOB_COLUMNS: &str = "job_id, principal_id, payload_ref, status, position, created_at, \
    started_at, completed_at, result, error_kind, error_message, processing_seconds, \
    estimated_wait_seconds";

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(
        &self,
        principal_id: PrincipalId,
        payload_ref: PayloadRef,
    ) -> QueueResult<EnqueueResult> {
        let mut tx = self.pool.begin().await?;

        let queued_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = 'queued' FOR UPDATE")
                .fetch_one(&mut *tx)
                .await?;

        let position = (queued_count.0 + 1) as i32;
        let wait = estimate_wait_seconds(position);

        let job_id: (uuid::Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO jobs (principal_id, payload_ref, status, position, estimated_wait_seconds)
            VALUES ($1, $2, 'queued', $3, $4)
            RETURNING job_id
            "#,
        )
        .bind(principal_id)
        .bind(&payload_ref.0)
        .bind(position)
        .bind(wait)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(EnqueueResult {
            job_id: JobId(job_id.0),
            position,
            estimated_wait_seconds: wait,
        })
    }

    async fn peek_next(&self) -> QueueResult<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'queued' ORDER BY created_at ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Job::from))
    }

    async fn claim_next(&self) -> QueueResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let already_processing: Option<(uuid::Uuid,)> = sqlx::query_as(
            "SELECT job_id FROM jobs WHERE status = 'processing' FOR UPDATE SKIP LOCKED LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        if already_processing.is_some() {
            return Ok(None);
        }

        let candidate: Option<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            SELECT job_id FROM jobs
            WHERE status = 'queued'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((job_id,)) = candidate else {
            return Ok(None);
        };

        let row: Option<JobRow> = sqlx::query_as(&format!(
            r#"
            UPDATE jobs SET status = 'processing', position = 0, started_at = NOW()
            WHERE job_id = $1 AND status = 'queued'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.map(Job::from))
    }

    async fn complete_success(
        &self,
        job_id: JobId,
        result: serde_json::Value,
        processing_seconds: f64,
    ) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', result = $2, completed_at = NOW(), processing_seconds = $3
            WHERE job_id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(result)
        .bind(processing_seconds)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_failure(
        &self,
        job_id: JobId,
        error_kind: &str,
        user_facing_message: &str,
        processing_seconds: f64,
    ) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_kind = $2, error_message = $3,
                completed_at = NOW(), processing_seconds = $4
            WHERE job_id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(error_kind)
        .bind(user_facing_message)
        .bind(processing_seconds)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cancel(&self, job_id: JobId, principal_id: PrincipalId) -> QueueResult<CancelOutcome> {
        let cancelled: Option<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            UPDATE jobs SET status = 'cancelled'
            WHERE job_id = $1 AND principal_id = $2 AND status = 'queued'
            RETURNING job_id
            "#,
        )
        .bind(job_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        if cancelled.is_some() {
            return Ok(CancelOutcome::Ok);
        }

        let exists: Option<(uuid::Uuid,)> =
            sqlx::query_as("SELECT job_id FROM jobs WHERE job_id = $1 AND principal_id = $2")
                .bind(job_id)
                .bind(principal_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(if exists.is_some() {
            CancelOutcome::NoLongerCancellable
        } else {
            CancelOutcome::NotFound
        })
    }

    async fn recompute_positions(&self) -> QueueResult<()> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<(uuid::Uuid,)> = sqlx::query_as(
            "SELECT job_id FROM jobs WHERE status = 'queued' ORDER BY created_at ASC FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await?;

        for (i, (job_id,)) in ids.into_iter().enumerate() {
            sqlx::query("UPDATE jobs SET position = $2 WHERE job_id = $1")
                .bind(job_id)
                .bind((i + 1) as i32)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> QueueResult<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1"))
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut job = Job::from(row);

        if job.status == JobStatus::Queued {
            let earlier: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM jobs WHERE status = 'queued' AND created_at < $1",
            )
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await?;
            job.position = (earlier.0 + 1) as i32;
        }

        Ok(Some(job))
    }

    async fn sweep_terminal(&self, age: std::time::Duration) -> QueueResult<u64> {
        let cutoff = OffsetDateTime::now_utc() - age;
        let removed = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND COALESCE(completed_at, created_at) < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(removed)
    }

    async fn recover_interrupted(&self, error_kind: &str, message: &str) -> QueueResult<Vec<JobId>> {
        let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'failed', error_kind = $1, error_message = $2, completed_at = NOW()
            WHERE status = 'processing'
            RETURNING job_id
            "#,
        )
        .bind(error_kind)
        .bind(message)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| JobId(id)).collect())
    }
}
