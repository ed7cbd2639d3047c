//! Job repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use genqueue_core::error::{AppError, ErrorKind};
use genqueue_core::result::AppResult;
use genqueue_core::types::id::JobId;
use genqueue_entity::job::{Job, JobStatus};

use crate::traits::{JobFilter, JobStore};

/// Repository for generation job records.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete terminal jobs last touched before the given instant.
    pub async fn cleanup_old(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM generation_jobs \
             WHERE status IN ('completed', 'failed', 'cancelled') AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to cleanup jobs", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn upsert(&self, job: &Job) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO generation_jobs (\
                id, user_id, model_id, params, plan_tier, base_priority, priority, \
                retry_count, max_retries, batch_id, status, credits_charged, result, \
                error_message, processing_time_ms, created_at, started_at, completed_at, \
                estimated_completion, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             ON CONFLICT (id) DO UPDATE SET \
                priority = EXCLUDED.priority, \
                retry_count = EXCLUDED.retry_count, \
                batch_id = EXCLUDED.batch_id, \
                status = EXCLUDED.status, \
                result = EXCLUDED.result, \
                error_message = EXCLUDED.error_message, \
                processing_time_ms = EXCLUDED.processing_time_ms, \
                started_at = EXCLUDED.started_at, \
                completed_at = EXCLUDED.completed_at, \
                estimated_completion = EXCLUDED.estimated_completion, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(job.id)
        .bind(&job.user_id)
        .bind(&job.model_id)
        .bind(Json(&job.params))
        .bind(job.plan_tier)
        .bind(job.base_priority)
        .bind(job.priority)
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.batch_id)
        .bind(job.status)
        .bind(job.credits_charged)
        .bind(&job.result)
        .bind(&job.error_message)
        .bind(job.processing_time_ms)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.estimated_completion)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert job", e))?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM generation_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    async fn list_recent(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM generation_jobs \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
               AND ($2::generation_job_status IS NULL OR status = $2) \
               AND ($3::text IS NULL OR user_id = $3) \
             ORDER BY created_at DESC \
             LIMIT $4",
        )
        .bind(filter.since)
        .bind(filter.status)
        .bind(filter.user_id.as_deref())
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    async fn status_counts(&self, since: DateTime<Utc>) -> AppResult<HashMap<JobStatus, u64>> {
        let rows: Vec<(JobStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM generation_jobs \
             WHERE created_at >= $1 GROUP BY status",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, count.max(0) as u64))
            .collect())
    }
}
