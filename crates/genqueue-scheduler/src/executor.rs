//! Batch executor: runs a batch's jobs through the cache and the backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use genqueue_cache::ResultCache;
use genqueue_core::types::id::{BatchId, JobId};
use genqueue_entity::job::Job;

use crate::backend::{GenerationBackend, GenerationError};

/// Receives the outcome of each job the executor runs.
///
/// Implementations own job state; the executor only decides which
/// transition applies.
#[async_trait]
pub trait JobLifecycle: Send + Sync {
    /// The job produced a result.
    async fn complete(&self, job_id: JobId, result: Value, processing_time_ms: i64);

    /// The job failed transiently and has retries left.
    async fn retry(&self, job_id: JobId, error: String);

    /// The job failed for good.
    async fn fail(&self, job_id: JobId, error: String, processing_time_ms: i64);
}

/// What happened to one job in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Result attached.
    Completed,
    /// Sent back for another attempt.
    Retried,
    /// Terminal failure.
    Failed,
}

/// Tally of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Jobs completed.
    pub completed: u32,
    /// Jobs requeued.
    pub retried: u32,
    /// Jobs failed.
    pub failed: u32,
}

impl ExecutionSummary {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Retried => self.retried += 1,
            JobOutcome::Failed => self.failed += 1,
        }
    }
}

/// Runs batches with bounded per-batch concurrency.
#[derive(Debug)]
pub struct BatchExecutor {
    /// Result cache consulted before every backend call.
    cache: ResultCache,
    /// Remote generation capability.
    backend: Arc<dyn GenerationBackend>,
    /// Upper bound on one backend call.
    generation_timeout: Duration,
    /// Jobs run concurrently within a chunk.
    max_concurrent_jobs: usize,
    /// One lock per fingerprint currently being generated.
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl BatchExecutor {
    /// Create a new batch executor
    pub fn new(
        cache: ResultCache,
        backend: Arc<dyn GenerationBackend>,
        generation_timeout: Duration,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            cache,
            backend,
            generation_timeout,
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            inflight: DashMap::new(),
        }
    }

    /// Run every job of a batch.
    ///
    /// Jobs run in chunks of `max_concurrent_jobs`; a chunk starts only
    /// after the previous one has fully resolved. Each outcome is reported
    /// through `lifecycle` as soon as the job resolves.
    pub async fn execute<L>(&self, batch_id: BatchId, jobs: &[Job], lifecycle: &L) -> ExecutionSummary
    where
        L: JobLifecycle + ?Sized,
    {
        let mut summary = ExecutionSummary::default();
        let chunks = jobs.len().div_ceil(self.max_concurrent_jobs);

        for (index, chunk) in jobs.chunks(self.max_concurrent_jobs).enumerate() {
            tracing::debug!(
                batch_id = %batch_id,
                chunk = index + 1,
                chunks,
                size = chunk.len(),
                "Running batch chunk"
            );
            let outcomes = join_all(chunk.iter().map(|job| self.run_job(job, lifecycle))).await;
            for outcome in outcomes {
                summary.record(outcome);
            }
        }

        summary
    }

    async fn run_job<L>(&self, job: &Job, lifecycle: &L) -> JobOutcome
    where
        L: JobLifecycle + ?Sized,
    {
        let started = Instant::now();
        let outcome = self.attempt(job).await;
        let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        match outcome {
            Ok(result) => {
                lifecycle.complete(job.id, result, elapsed_ms).await;
                JobOutcome::Completed
            }
            Err(err) if err.is_retryable() && job.can_retry() => {
                tracing::warn!(
                    job_id = %job.id,
                    model_id = %job.model_id,
                    attempt = job.retry_count + 1,
                    max_retries = job.max_retries,
                    "Job failed, will retry: {}",
                    err
                );
                lifecycle.retry(job.id, err.to_string()).await;
                JobOutcome::Retried
            }
            Err(err) => {
                tracing::error!(
                    job_id = %job.id,
                    model_id = %job.model_id,
                    retries = job.retry_count,
                    "Job failed permanently: {}",
                    err
                );
                lifecycle.fail(job.id, err.to_string(), elapsed_ms).await;
                JobOutcome::Failed
            }
        }
    }

    /// One attempt, serialized with any other attempt for the same
    /// fingerprint so the second one can reuse the first one's result.
    async fn attempt(&self, job: &Job) -> Result<Value, GenerationError> {
        let fingerprint = ResultCache::fingerprint(&job.model_id, &job.user_id, &job.params);
        let slot = self.inflight.entry(fingerprint.clone()).or_default().clone();

        let result = {
            let _guard = slot.lock().await;
            self.generate_or_reuse(job, &fingerprint).await
        };

        drop(slot);
        self.inflight
            .remove_if(&fingerprint, |_, slot| Arc::strong_count(slot) == 1);
        result
    }

    async fn generate_or_reuse(&self, job: &Job, fingerprint: &str) -> Result<Value, GenerationError> {
        match self.cache.get(fingerprint).await {
            Ok(Some(hit)) => {
                tracing::debug!(job_id = %job.id, "Serving job from result cache");
                return Ok(hit.result);
            }
            Ok(None) => {}
            Err(e) => {
                let message = format!("result cache unavailable: {e}");
                return Err(if e.kind.is_transient() {
                    GenerationError::Transient(message)
                } else {
                    GenerationError::Permanent(message)
                });
            }
        }

        let started = Instant::now();
        let result = tokio::time::timeout(
            self.generation_timeout,
            self.backend.generate(&job.model_id, &job.params),
        )
        .await
        .map_err(|_| GenerationError::Timeout(self.generation_timeout))??;
        let generation_time_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        if let Err(e) = self
            .cache
            .put(
                fingerprint,
                result.clone(),
                &job.model_id,
                generation_time_ms,
                job.credits_charged,
            )
            .await
        {
            tracing::warn!(job_id = %job.id, "Failed to cache generation result: {}", e);
        }

        Ok(result)
    }
}
