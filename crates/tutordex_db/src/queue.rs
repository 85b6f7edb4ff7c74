//! Work queue adapter.
//!
//! Claiming is grounded on `casparian_sentinel::db::queue::JobQueue::pop_job`'s
//! atomic `UPDATE ... WHERE status = 'pending'` pattern, extended to claim a
//! batch of jobs in one transaction since SQLite has no `UPDATE ... RETURNING`
//! across multiple rows the way Postgres does.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use tutordex_protocol::{ErrorKind, ExtractionJob, JobStatus};

use crate::util::parse_rfc3339;

use crate::error::DbError;

#[derive(Clone)]
pub struct QueueAdapter {
    pool: SqlitePool,
}

#[derive(Debug, Default, sqlx::FromRow)]
pub struct QueueCounts {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl QueueAdapter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue an extraction job for a raw message, idempotent on
    /// `(raw_id, pipeline_version)`: re-enqueuing is a no-op if a job
    /// already exists for that pair.
    pub async fn enqueue(&self, raw_id: i64, pipeline_version: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO extraction_jobs (raw_id, pipeline_version, status, attempts, meta, created_at)
            VALUES (?, ?, 'pending', 0, '{}', ?)
            ON CONFLICT(raw_id, pipeline_version) DO NOTHING
            "#,
        )
        .bind(raw_id)
        .bind(pipeline_version)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically claim up to `batch_size` pending jobs for `claimant`.
    ///
    /// SQLite can't express `UPDATE ... LIMIT n RETURNING *` so this loops a
    /// single-row claim inside one transaction, mirroring `pop_job`'s
    /// select-then-conditional-update shape but batched.
    pub async fn claim(
        &self,
        batch_size: usize,
        claimant: &str,
    ) -> Result<Vec<ExtractionJob>, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut claimed = Vec::with_capacity(batch_size);
        let now = Utc::now().to_rfc3339();

        for _ in 0..batch_size {
            let job_id: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT id FROM extraction_jobs
                WHERE status = 'pending'
                ORDER BY id ASC
                LIMIT 1
                "#,
            )
            .fetch_optional(&mut *tx)
            .await?;

            let Some(job_id) = job_id else { break };

            let rows_affected = sqlx::query(
                r#"
                UPDATE extraction_jobs
                SET status = 'processing', claimed_at = ?, claimed_by = ?
                WHERE id = ? AND status = 'pending'
                "#,
            )
            .bind(&now)
            .bind(claimant)
            .bind(job_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows_affected == 0 {
                // Raced with another claimant between SELECT and UPDATE.
                continue;
            }

            let row = sqlx::query_as::<_, JobRow>(
                "SELECT * FROM extraction_jobs WHERE id = ?",
            )
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;
            claimed.push(row.into_job()?);
        }

        tx.commit().await?;
        if !claimed.is_empty() {
            info!(count = claimed.len(), claimant, "Claimed extraction jobs");
        }
        Ok(claimed)
    }

    /// Mark a job done. Ownership is checked so a job whose claim was stolen
    /// by the stale sweep can't be completed twice.
    pub async fn complete(&self, job_id: i64, claimant: &str) -> Result<(), DbError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE extraction_jobs SET status = 'done'
            WHERE id = ? AND claimed_by = ? AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(claimant)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(DbError::NotOwner(job_id, claimant.to_string()));
        }
        Ok(())
    }

    /// Mark a job `done` and persist the enrichment/LLM audit trail onto
    /// `meta` in the same update.
    pub async fn complete_with_meta(
        &self,
        job_id: i64,
        claimant: &str,
        meta: &serde_json::Value,
    ) -> Result<(), DbError> {
        self.complete_as(job_id, claimant, JobStatus::Done, meta).await
    }

    /// Mark a job `skipped` (filter/triage short-circuit, spec.md §4.4) with
    /// the skip reason recorded in `meta`. A terminal transition like `done`,
    /// not retried by the stale sweep.
    pub async fn complete_skipped(
        &self,
        job_id: i64,
        claimant: &str,
        meta: &serde_json::Value,
    ) -> Result<(), DbError> {
        self.complete_as(job_id, claimant, JobStatus::Skipped, meta).await
    }

    async fn complete_as(
        &self,
        job_id: i64,
        claimant: &str,
        status: JobStatus,
        meta: &serde_json::Value,
    ) -> Result<(), DbError> {
        let meta_str = serde_json::to_string(meta)?;
        let rows_affected = sqlx::query(
            r#"
            UPDATE extraction_jobs SET status = ?, meta = ?
            WHERE id = ? AND claimed_by = ?
            "#,
        )
        .bind(status.as_str())
        .bind(&meta_str)
        .bind(job_id)
        .bind(claimant)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(DbError::NotOwner(job_id, claimant.to_string()));
        }
        Ok(())
    }

    /// Record a failure. Retryable errors go back to `pending` (bumping
    /// `attempts`) unless `max_attempts` is exceeded, in which case the job
    /// is parked as `failed`.
    pub async fn fail(
        &self,
        job_id: i64,
        claimant: &str,
        error_kind: ErrorKind,
        error_msg: &str,
        max_attempts: i32,
    ) -> Result<(), DbError> {
        let attempts: i32 = sqlx::query_scalar(
            "SELECT attempts FROM extraction_jobs WHERE id = ? AND claimed_by = ? AND status = 'processing'",
        )
        .bind(job_id)
        .bind(claimant)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotOwner(job_id, claimant.to_string()))?;

        let next_attempts = attempts + 1;
        let next_status = if error_kind.is_retryable() && next_attempts < max_attempts {
            JobStatus::Pending
        } else {
            JobStatus::Failed
        };

        sqlx::query(
            r#"
            UPDATE extraction_jobs
            SET status = ?, attempts = ?, claimed_at = NULL, claimed_by = NULL,
                last_error_kind = ?, last_error_msg = ?
            WHERE id = ? AND claimed_by = ?
            "#,
        )
        .bind(next_status.as_str())
        .bind(next_attempts)
        .bind(error_kind.as_str())
        .bind(error_msg)
        .bind(job_id)
        .bind(claimant)
        .execute(&self.pool)
        .await?;

        warn!(job_id, %error_kind, next_attempts, "Extraction job failed");
        Ok(())
    }

    /// Return jobs stuck `processing` longer than `stale_after_s` back to
    /// `pending`, incrementing `attempts` (spec.md §4.2 / §5 "stale
    /// recovery"). Jobs whose incremented `attempts` would reach
    /// `max_attempts` are parked `failed` instead, per §5's "attempts ≥
    /// max_attempts transitions to failed terminally".
    pub async fn requeue_stale(&self, stale_after_s: i64, max_attempts: i32) -> Result<u64, DbError> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(stale_after_s)).to_rfc3339();

        let exhausted = sqlx::query(
            r#"
            UPDATE extraction_jobs
            SET status = 'failed', claimed_at = NULL, claimed_by = NULL,
                attempts = attempts + 1
            WHERE status = 'processing' AND claimed_at < ? AND attempts + 1 >= ?
            "#,
        )
        .bind(&cutoff)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let requeued = sqlx::query(
            r#"
            UPDATE extraction_jobs
            SET status = 'pending', claimed_at = NULL, claimed_by = NULL,
                attempts = attempts + 1
            WHERE status = 'processing' AND claimed_at < ? AND attempts + 1 < ?
            "#,
        )
        .bind(&cutoff)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let count = requeued + exhausted;
        if count > 0 {
            warn!(requeued, exhausted, "Requeued stale extraction jobs");
        }
        Ok(count)
    }

    pub async fn queue_counts(&self) -> Result<QueueCounts, DbError> {
        let counts: QueueCounts = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'done') as done,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'skipped') as skipped
            FROM extraction_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    pub async fn oldest_pending_age_seconds(&self) -> Result<Option<i64>, DbError> {
        let oldest: Option<String> =
            sqlx::query_scalar("SELECT created_at FROM extraction_jobs WHERE status = 'pending' ORDER BY id ASC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(match oldest {
            Some(ts) => {
                let created = chrono::DateTime::parse_from_rfc3339(&ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Some((Utc::now() - created).num_seconds())
            }
            None => None,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    raw_id: i64,
    pipeline_version: String,
    status: String,
    claimed_at: Option<String>,
    claimed_by: Option<String>,
    attempts: i32,
    last_error_kind: Option<String>,
    last_error_msg: Option<String>,
    meta: String,
    created_at: String,
}

impl JobRow {
    fn into_job(self) -> Result<ExtractionJob, DbError> {
        Ok(ExtractionJob {
            id: self.id,
            raw_id: self.raw_id,
            pipeline_version: self.pipeline_version,
            status: self.status.parse().unwrap_or(JobStatus::Pending),
            claimed_at: self.claimed_at.as_deref().map(parse_rfc3339),
            claimed_by: self.claimed_by,
            attempts: self.attempts,
            last_error_kind: self.last_error_kind.and_then(|k| k.parse().ok()),
            last_error_msg: self.last_error_msg,
            meta: serde_json::from_str(&self.meta)?,
            created_at: parse_rfc3339(&self.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, DbConfig};

    async fn seeded_pool() -> SqlitePool {
        create_pool(DbConfig::sqlite_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn claim_is_idempotent_and_exclusive() {
        let pool = seeded_pool().await;
        let queue = QueueAdapter::new(pool);
        queue.enqueue(1, "v1").await.unwrap();
        queue.enqueue(1, "v1").await.unwrap(); // no-op, same (raw_id, pipeline_version)

        let claimed_a = queue.claim(10, "worker-a").await.unwrap();
        assert_eq!(claimed_a.len(), 1);

        let claimed_b = queue.claim(10, "worker-b").await.unwrap();
        assert!(claimed_b.is_empty());
    }

    #[tokio::test]
    async fn complete_requires_ownership() {
        let pool = seeded_pool().await;
        let queue = QueueAdapter::new(pool);
        queue.enqueue(1, "v1").await.unwrap();
        let claimed = queue.claim(1, "worker-a").await.unwrap();
        let job_id = claimed[0].id;

        let result = queue.complete(job_id, "worker-b").await;
        assert!(matches!(result, Err(DbError::NotOwner(_, _))));

        queue.complete(job_id, "worker-a").await.unwrap();
    }

    #[tokio::test]
    async fn retryable_failure_returns_to_pending_until_max_attempts() {
        let pool = seeded_pool().await;
        let queue = QueueAdapter::new(pool);
        queue.enqueue(1, "v1").await.unwrap();

        for _ in 0..3 {
            let claimed = queue.claim(1, "worker-a").await.unwrap();
            assert_eq!(claimed.len(), 1);
            queue
                .fail(claimed[0].id, "worker-a", ErrorKind::LlmNetworkTimeout, "timed out", 3)
                .await
                .unwrap();
        }

        let counts = queue.queue_counts().await.unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);
    }

    #[tokio::test]
    async fn requeue_stale_reclaims_abandoned_jobs() {
        let pool = seeded_pool().await;
        let queue = QueueAdapter::new(pool);
        queue.enqueue(1, "v1").await.unwrap();
        queue.claim(1, "worker-a").await.unwrap();

        let requeued = queue.requeue_stale(-1, 3).await.unwrap();
        assert_eq!(requeued, 1);

        let counts = queue.queue_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
    }

    #[tokio::test]
    async fn requeue_stale_fails_job_once_attempts_exhausted() {
        let pool = seeded_pool().await;
        let queue = QueueAdapter::new(pool);
        queue.enqueue(1, "v1").await.unwrap();
        queue.claim(1, "worker-a").await.unwrap();

        let requeued = queue.requeue_stale(-1, 1).await.unwrap();
        assert_eq!(requeued, 1);

        let counts = queue.queue_counts().await.unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);
    }
}
