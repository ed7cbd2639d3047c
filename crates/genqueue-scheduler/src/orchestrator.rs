//! Queue orchestrator: admission, status, cancellation, health and dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

use genqueue_cache::ResultCache;
use genqueue_core::config::{AppConfig, GenerationConfig, ModelCatalog, QueueConfig};
use genqueue_core::error::AppError;
use genqueue_core::result::AppResult;
use genqueue_core::types::id::{BatchId, JobId};
use genqueue_database::{CreditLedger, JobFilter, JobStore};
use genqueue_entity::job::{CreateJob, GenerationParams, Job, JobStatus, PlanTier};
use genqueue_entity::report::{JobStatusReport, QueueHealth};

use crate::assembler::{BatchAssembler, Placement};
use crate::backend::GenerationBackend;
use crate::batch::{Batch, BatchStatus};
use crate::executor::{BatchExecutor, ExecutionSummary, JobLifecycle};
use crate::pricing::credit_cost;
use crate::priority::{MAX_PRIORITY, MIN_PRIORITY, PriorityCalculator};
use crate::status;

/// A generation request as received from a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Submitting user.
    pub user_id: String,
    /// Target model.
    pub model_id: String,
    /// Raw input parameters; must be an object with a `prompt`.
    pub params: Value,
    /// Plan tier of the user.
    pub plan_tier: PlanTier,
    /// Base priority in 1..=10; the configured default when absent.
    #[serde(default)]
    pub base_priority: Option<i32>,
}

/// Identifiers of an admitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// The new job.
    pub job_id: JobId,
    /// The batch it joined.
    pub batch_id: BatchId,
}

/// Why a submission was refused. No job exists after any of these.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The user's balance cannot cover the request.
    #[error("insufficient credits: {required} required")]
    InsufficientCredits {
        /// Credits the request would cost.
        required: i64,
    },

    /// The input parameters are malformed or out of range.
    #[error("invalid input parameters: {0}")]
    InvalidParams(String),

    /// The model is not in the catalog.
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// A collaborator failed.
    #[error(transparent)]
    Internal(#[from] AppError),
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::InsufficientCredits { .. } => {
                AppError::insufficient_credits(err.to_string())
            }
            SubmitError::InvalidParams(_) | SubmitError::UnknownModel(_) => {
                AppError::validation(err.to_string())
            }
            SubmitError::Internal(inner) => inner,
        }
    }
}

/// Live scheduling state. Never locked across an await.
#[derive(Debug, Default)]
struct QueueState {
    batches: HashMap<BatchId, Batch>,
    jobs: HashMap<JobId, Job>,
}

#[derive(Debug)]
struct OrchestratorInner {
    queue: QueueConfig,
    generation: GenerationConfig,
    catalog: ModelCatalog,
    priority: PriorityCalculator,
    assembler: BatchAssembler,
    executor: BatchExecutor,
    store: Arc<dyn JobStore>,
    credits: Arc<dyn CreditLedger>,
    state: Mutex<QueueState>,
    /// Batch runs in flight.
    running: AtomicUsize,
    /// Signalled when the last batch run finishes.
    idle: Notify,
}

impl OrchestratorInner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the live batch table and coordinates admission, batching and
/// execution. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct QueueOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl QueueOrchestrator {
    /// Build an orchestrator over its collaborators.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn JobStore>,
        credits: Arc<dyn CreditLedger>,
        cache: ResultCache,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        let queue = config.queue.clone();
        let priority = PriorityCalculator::new(config.priority.clone(), config.models.clone());
        let assembler =
            BatchAssembler::new(queue.max_batch_size, i32::from(queue.priority_tolerance));
        let executor = BatchExecutor::new(
            cache,
            backend,
            config.generation.timeout(),
            queue.max_concurrent_jobs,
        );

        Self {
            inner: Arc::new(OrchestratorInner {
                queue,
                generation: config.generation.clone(),
                catalog: config.models.clone(),
                priority,
                assembler,
                executor,
                store,
                credits,
                state: Mutex::new(QueueState::default()),
                running: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Admit a job: validate, charge credits, prioritise, persist and batch.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, SubmitError> {
        let inner = &self.inner;
        let profile = inner
            .catalog
            .get(&request.model_id)
            .ok_or_else(|| SubmitError::UnknownModel(request.model_id.clone()))?;

        let params =
            GenerationParams::from_value(request.params).map_err(SubmitError::InvalidParams)?;
        params
            .validate(
                inner.generation.max_outputs_per_request,
                inner.generation.max_prompt_length,
            )
            .map_err(SubmitError::InvalidParams)?;

        let base_priority = request
            .base_priority
            .unwrap_or_else(|| i32::from(inner.queue.default_base_priority));
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&base_priority) {
            return Err(SubmitError::InvalidParams(format!(
                "base priority {base_priority} is outside {MIN_PRIORITY}..={MAX_PRIORITY}"
            )));
        }

        let cost = credit_cost(profile, &params);
        let reason = format!("generation on {}", request.model_id);
        if !inner.credits.deduct(&request.user_id, cost, &reason).await? {
            tracing::info!(
                user_id = %request.user_id,
                model_id = %request.model_id,
                cost,
                "Submission refused: insufficient credits"
            );
            return Err(SubmitError::InsufficientCredits { required: cost });
        }

        let priority = inner.priority.calculate(
            request.plan_tier,
            &request.model_id,
            base_priority,
            0,
            Duration::ZERO,
        );
        let job = Job::new(CreateJob {
            user_id: request.user_id,
            model_id: request.model_id,
            params,
            plan_tier: request.plan_tier,
            base_priority,
            priority,
            max_retries: i32::try_from(inner.queue.max_retries).unwrap_or(i32::MAX),
            credits_charged: cost,
        });

        if let Err(e) = inner.store.upsert(&job).await {
            tracing::error!(job_id = %job.id, "Failed to create job record: {}", e);
            self.refund(&job, "job record could not be created").await;
            return Err(SubmitError::Internal(e));
        }

        let job_id = job.id;
        let model_id = job.model_id.clone();
        let batch_id = self.place(job).await;

        tracing::info!(
            job_id = %job_id,
            batch_id = %batch_id,
            model_id = %model_id,
            priority,
            cost,
            "Job admitted"
        );
        self.warn_on_backpressure();

        Ok(SubmitResponse { job_id, batch_id })
    }

    /// Current status of a job, from live state or the job store.
    pub async fn get_status(&self, job_id: JobId) -> AppResult<JobStatusReport> {
        let job = self
            .job(job_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))?;
        Ok(status::report(&job, Utc::now()))
    }

    /// Full job record, from live state or the job store.
    pub async fn job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        let live = self.inner.lock_state().jobs.get(&job_id).cloned();
        match live {
            Some(job) => Ok(Some(job)),
            None => self.inner.store.get(job_id).await,
        }
    }

    /// Cancel a job that has not been claimed by an executor.
    ///
    /// Returns `true` when the job is now cancelled, including when it was
    /// already cancelled. Returns `false` for another user's job, a job
    /// that is processing or finished, or an unknown job.
    pub async fn cancel(&self, job_id: JobId, user_id: &str) -> AppResult<bool> {
        let cancelled = {
            let mut guard = self.inner.lock_state();
            let state = &mut *guard;
            let verdict = state
                .jobs
                .get(&job_id)
                .map(|job| job.user_id == user_id && job.status.is_cancellable());

            match verdict {
                Some(false) => return Ok(false),
                None => None,
                Some(true) => state.jobs.remove(&job_id).map(|mut job| {
                    if let Some(batch_id) = job.batch_id {
                        let drained = state.batches.get_mut(&batch_id).is_some_and(|batch| {
                            batch.remove_job(job_id);
                            batch.is_empty() && batch.status == BatchStatus::Pending
                        });
                        if drained {
                            state.batches.remove(&batch_id);
                        }
                    }
                    job.mark_cancelled();
                    job
                }),
            }
        };

        match cancelled {
            Some(job) => {
                tracing::info!(job_id = %job_id, user_id, "Job cancelled");
                self.persist(&job).await;
                self.refund(&job, "job cancelled").await;
                Ok(true)
            }
            None => Ok(self
                .inner
                .store
                .get(job_id)
                .await?
                .is_some_and(|job| job.user_id == user_id && job.status == JobStatus::Cancelled)),
        }
    }

    /// Load and throughput snapshot.
    ///
    /// Status counts cover the history window; waiting and processing
    /// counts come from live state; throughput and processing time cover
    /// the throughput window.
    pub async fn queue_health(&self) -> AppResult<QueueHealth> {
        let queue = &self.inner.queue;
        let now = Utc::now();
        let history_start = queue.history_start(now)?;
        let window_start = queue.throughput_start(now)?;

        let mut health = QueueHealth::default();
        for (status, count) in self.inner.store.status_counts(history_start).await? {
            health.record(status, count);
        }

        let completed = self
            .inner
            .store
            .list_recent(&JobFilter::since(history_start).with_status(JobStatus::Completed))
            .await?;
        health.apply_history(&completed, window_start, queue.throughput_window_minutes);

        let (waiting, processing, live_jobs, active_batches) = {
            let state = self.inner.lock_state();
            let waiting = state
                .jobs
                .values()
                .filter(|job| job.status.is_cancellable())
                .count();
            let processing = state
                .jobs
                .values()
                .filter(|job| job.status == JobStatus::Processing)
                .count();
            (waiting, processing, state.jobs.len(), state.batches.len())
        };

        health.pending_jobs = waiting as u64;
        health.processing_jobs = processing as u64;
        health.active_batch_count = active_batches as u64;

        health.estimated_wait_seconds = if health.pending_jobs == 0 {
            0
        } else if health.throughput_per_minute > 0.0 {
            (health.pending_jobs as f64 / health.throughput_per_minute * 60.0).ceil() as u64
        } else {
            queue.batch_timeout_seconds
        };
        health.backpressure = self.over_ceiling(live_jobs, active_batches);

        Ok(health)
    }

    /// Dispatch every open batch that is full or has outlived the batch
    /// timeout. Returns how many batches were dispatched.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let timeout = self.inner.queue.batch_timeout();
        let capacity = self.inner.assembler.max_batch_size();

        let due: Vec<BatchId> = self
            .inner
            .lock_state()
            .batches
            .values()
            .filter(|batch| {
                batch.status == BatchStatus::Pending
                    && (batch.is_full(capacity) || batch.is_expired(timeout, now))
            })
            .map(|batch| batch.id)
            .collect();

        due.into_iter().filter(|id| self.dispatch(*id)).count()
    }

    /// Claim a pending batch and start executing it.
    ///
    /// Safe to call any number of times from any trigger: only the first
    /// call for a batch in `pending` dispatches it; the rest return `false`.
    pub fn dispatch(&self, batch_id: BatchId) -> bool {
        let (model_id, claimed) = {
            let mut guard = self.inner.lock_state();
            let state = &mut *guard;
            let Some(batch) = state.batches.get_mut(&batch_id) else {
                return false;
            };
            if batch.status == BatchStatus::Pending && batch.is_empty() {
                state.batches.remove(&batch_id);
                return false;
            }
            if !batch.start() {
                return false;
            }

            let estimated = self
                .inner
                .catalog
                .get(&batch.model_id)
                .and_then(|profile| chrono::Duration::from_std(profile.estimated_duration()).ok())
                .map(|duration| Utc::now() + duration);

            let mut claimed = Vec::with_capacity(batch.job_ids.len());
            for id in &batch.job_ids {
                if let Some(job) = state.jobs.get_mut(id) {
                    if job.status == JobStatus::Batched {
                        job.mark_processing(estimated);
                        claimed.push(job.clone());
                    }
                }
            }
            (batch.model_id.clone(), claimed)
        };

        tracing::info!(
            batch_id = %batch_id,
            model_id = %model_id,
            jobs = claimed.len(),
            "Dispatching batch"
        );

        self.inner.running.fetch_add(1, Ordering::SeqCst);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_batch(batch_id, claimed).await;
        });
        true
    }

    /// Wait until no batch is executing, up to `timeout`.
    ///
    /// Returns `false` if batches were still running when it elapsed.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.inner.idle.notified();
                if self.inner.running.load(Ordering::SeqCst) == 0 {
                    break;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    /// Number of batches held in memory.
    pub fn active_batch_count(&self) -> usize {
        self.inner.lock_state().batches.len()
    }

    /// Configured sweep cadence.
    pub fn sweep_interval(&self) -> Duration {
        self.inner.queue.sweep_interval()
    }

    /// Put a job that failed transiently back into the batching path.
    ///
    /// Unlike [`submit`](Self::submit) this never charges credits again.
    /// Runs under the state lock so the job is never absent from live
    /// state between attempts.
    fn requeue(&self, state: &mut QueueState, job: &mut Job) -> Placement {
        self.enqueue(state, job)
    }

    fn enqueue(&self, state: &mut QueueState, job: &mut Job) -> Placement {
        let placement = self.inner.assembler.assign(
            &mut state.batches,
            &job.model_id,
            job.priority,
            job.id,
        );
        job.mark_batched(placement.batch_id);
        state.jobs.insert(job.id, job.clone());
        placement
    }

    async fn place(&self, mut job: Job) -> BatchId {
        let placement = {
            let mut state = self.inner.lock_state();
            self.enqueue(&mut state, &mut job)
        };
        self.settle(&job, placement).await
    }

    /// Persist a freshly batched job and fire any dispatch it triggered.
    async fn settle(&self, job: &Job, placement: Placement) -> BatchId {
        tracing::debug!(
            job_id = %job.id,
            batch_id = %placement.batch_id,
            new_batch = placement.created,
            full = placement.full,
            "Job batched"
        );
        self.persist(job).await;

        if placement.created {
            self.schedule_timeout(placement.batch_id);
        }
        if placement.full {
            self.dispatch(placement.batch_id);
        }
        placement.batch_id
    }

    /// Force dispatch once the batch timeout elapses.
    fn schedule_timeout(&self, batch_id: BatchId) {
        let inner = Arc::downgrade(&self.inner);
        let timeout = self.inner.queue.batch_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = inner.upgrade() {
                let orchestrator = QueueOrchestrator { inner };
                if orchestrator.dispatch(batch_id) {
                    tracing::debug!(batch_id = %batch_id, "Batch dispatched by timeout");
                }
            }
        });
    }

    async fn run_batch(self, batch_id: BatchId, jobs: Vec<Job>) {
        for job in &jobs {
            self.persist(job).await;
        }

        let summary = self.inner.executor.execute(batch_id, &jobs, &self).await;
        self.finish_batch(batch_id, summary);

        if self.inner.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }

    fn finish_batch(&self, batch_id: BatchId, summary: ExecutionSummary) {
        let finished = self.inner.lock_state().batches.remove(&batch_id);
        let Some(mut batch) = finished else {
            return;
        };
        batch.completed_count = summary.completed;
        batch.failed_count = summary.failed;
        batch.retried_count = summary.retried;
        batch.finish();

        let elapsed_ms = batch
            .started_at
            .map(|started| started.elapsed().as_millis())
            .unwrap_or(0);
        tracing::info!(
            batch_id = %batch_id,
            model_id = %batch.model_id,
            status = %batch.status,
            completed = batch.completed_count,
            failed = batch.failed_count,
            retried = batch.retried_count,
            elapsed_ms = elapsed_ms as u64,
            "Batch finished"
        );
    }

    async fn persist(&self, job: &Job) {
        if let Err(e) = self.inner.store.upsert(job).await {
            tracing::error!(
                job_id = %job.id,
                status = %job.status,
                "Failed to persist job record: {}",
                e
            );
        }
    }

    async fn refund(&self, job: &Job, reason: &str) {
        if job.credits_charged <= 0 {
            return;
        }
        if let Err(e) = self
            .inner
            .credits
            .refund(&job.user_id, job.credits_charged, reason)
            .await
        {
            tracing::error!(
                job_id = %job.id,
                user_id = %job.user_id,
                amount = job.credits_charged,
                "Failed to refund credits: {}",
                e
            );
        }
    }

    fn over_ceiling(&self, live_jobs: usize, active_batches: usize) -> bool {
        live_jobs > self.inner.queue.max_live_jobs
            || active_batches > self.inner.queue.max_active_batches
    }

    fn warn_on_backpressure(&self) {
        let (live_jobs, active_batches) = {
            let state = self.inner.lock_state();
            (state.jobs.len(), state.batches.len())
        };
        if self.over_ceiling(live_jobs, active_batches) {
            tracing::warn!(
                live_jobs,
                active_batches,
                max_live_jobs = self.inner.queue.max_live_jobs,
                max_active_batches = self.inner.queue.max_active_batches,
                "Queue above advisory ceilings"
            );
        }
    }
}

#[async_trait]
impl JobLifecycle for QueueOrchestrator {
    async fn complete(&self, job_id: JobId, result: Value, processing_time_ms: i64) {
        let finished = self.inner.lock_state().jobs.remove(&job_id);
        let Some(mut job) = finished else {
            return;
        };
        job.mark_completed(result, processing_time_ms);
        tracing::info!(job_id = %job_id, processing_time_ms, "Job completed");
        self.persist(&job).await;
    }

    async fn retry(&self, job_id: JobId, error: String) {
        let outcome = {
            let mut guard = self.inner.lock_state();
            let state = &mut *guard;
            let Some(mut job) = state.jobs.remove(&job_id) else {
                return;
            };

            let waited = (Utc::now() - job.created_at).to_std().unwrap_or_default();
            let priority = self.inner.priority.calculate(
                job.plan_tier,
                &job.model_id,
                job.base_priority,
                job.retry_count + 1,
                waited,
            );

            if job.reset_for_retry(priority, error.clone()) {
                let placement = self.requeue(state, &mut job);
                Ok((job, placement, priority))
            } else {
                Err(job)
            }
        };

        match outcome {
            Ok((job, placement, priority)) => {
                let batch_id = self.settle(&job, placement).await;
                tracing::debug!(job_id = %job_id, batch_id = %batch_id, priority, "Job requeued");
            }
            Err(mut job) => {
                job.mark_failed(error, job.processing_time_ms.unwrap_or(0));
                self.persist(&job).await;
                self.refund(&job, "generation failed").await;
            }
        }
    }

    async fn fail(&self, job_id: JobId, error: String, processing_time_ms: i64) {
        let failed = self.inner.lock_state().jobs.remove(&job_id);
        let Some(mut job) = failed else {
            return;
        };
        job.mark_failed(error, processing_time_ms);
        self.persist(&job).await;
        self.refund(&job, "generation failed").await;
    }
}
