//! Shared test helpers for integration tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use genqueue_cache::memory::MemoryCacheProvider;
use genqueue_cache::{CacheManager, ResultCache};
use genqueue_core::config::AppConfig;
use genqueue_core::error::AppError;
use genqueue_core::result::AppResult;
use genqueue_core::traits::cache::CacheProvider;
use genqueue_core::types::id::JobId;
use genqueue_database::memory::{MemoryCreditLedger, MemoryJobStore};
use genqueue_database::{CreditLedger, JobFilter, JobStore};
use genqueue_entity::job::{GenerationParams, Job, PlanTier};
use genqueue_scheduler::{GenerationBackend, GenerationError, QueueOrchestrator, SubmitRequest};

/// Generation backend that replays a script of outcomes, then falls back
/// to a fixed behaviour.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<(), GenerationError>>>,
    fallback: Result<(), GenerationError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    /// Always succeeds.
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new(), Ok(()))
    }

    /// Fails `times` times with a transient error, then succeeds.
    pub fn failing_then_ok(times: usize) -> Self {
        let script = (0..times)
            .map(|i| Err(GenerationError::Transient(format!("backend returned 503 (call {i})"))))
            .collect();
        Self::scripted(script, Ok(()))
    }

    /// Always fails with the given error.
    pub fn always_failing(error: GenerationError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    fn scripted(script: Vec<Result<(), GenerationError>>, fallback: Result<(), GenerationError>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::from_secs(1),
            calls: AtomicUsize::new(0),
        }
    }

    /// Simulated generation time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of generate calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        model_id: &str,
        params: &GenerationParams,
    ) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.map(|()| json!({"images": [format!("{model_id}/{}.png", params.prompt)]}))
    }
}

/// Cache provider whose reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct BrokenCache {
    /// Fail `get`.
    pub fail_reads: AtomicBool,
    /// Fail `set`.
    pub fail_writes: AtomicBool,
}

#[async_trait]
impl CacheProvider for BrokenCache {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::cache("connection refused"));
        }
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::cache("connection refused"));
        }
        Ok(())
    }

    async fn remove(&self, _key: &str) -> AppResult<bool> {
        Ok(false)
    }

    async fn ping(&self) -> AppResult<bool> {
        Ok(!self.fail_reads.load(Ordering::SeqCst))
    }
}

/// Job store whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    /// Records that made it through.
    pub inner: MemoryJobStore,
    /// Fail `upsert`.
    pub fail_writes: AtomicBool,
    /// Milliseconds each `upsert` takes.
    pub write_delay_ms: AtomicU64,
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn upsert(&self, job: &Job) -> AppResult<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::database("connection reset"));
        }
        self.inner.upsert(job).await
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        self.inner.get(id).await
    }

    async fn list_recent(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        self.inner.list_recent(filter).await
    }
}

/// Configuration used by most tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.queue.max_batch_size = 5;
    config.queue.batch_timeout_seconds = 30;
    config.queue.sweep_interval_seconds = 5;
    config.queue.max_concurrent_jobs = 3;
    config.queue.max_retries = 3;
    config.credits.initial_balance = 100;
    config
}

/// Test queue context
pub struct TestQueue {
    /// The orchestrator under test
    pub orchestrator: QueueOrchestrator,
    /// Job records
    pub store: Arc<FlakyStore>,
    /// Credit balances
    pub credits: Arc<MemoryCreditLedger>,
    /// Generation backend
    pub backend: Arc<ScriptedBackend>,
    /// Configuration the queue was built with
    pub config: AppConfig,
}

impl TestQueue {
    /// Queue with default test configuration and an in-memory cache.
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::with_config(test_config(), backend)
    }

    /// Queue with a custom configuration and an in-memory cache.
    pub fn with_config(config: AppConfig, backend: ScriptedBackend) -> Self {
        let provider = MemoryCacheProvider::new(&config.cache.memory);
        Self::build(config, backend, Arc::new(provider))
    }

    /// Queue over a specific cache provider.
    pub fn with_cache(backend: ScriptedBackend, cache: Arc<dyn CacheProvider>) -> Self {
        Self::build(test_config(), backend, cache)
    }

    fn build(config: AppConfig, backend: ScriptedBackend, cache: Arc<dyn CacheProvider>) -> Self {
        let store = Arc::new(FlakyStore::default());
        let credits = Arc::new(MemoryCreditLedger::new(config.credits.initial_balance));
        let backend = Arc::new(backend);
        let cache = ResultCache::new(
            CacheManager::from_provider(cache),
            config.cache.result_ttl(),
        );

        let orchestrator = QueueOrchestrator::new(
            &config,
            store.clone(),
            credits.clone(),
            cache,
            backend.clone(),
        );

        Self {
            orchestrator,
            store,
            credits,
            backend,
            config,
        }
    }

    /// A basic-tier request for `sdxl`.
    pub fn request(user_id: &str, prompt: &str) -> SubmitRequest {
        SubmitRequest {
            user_id: user_id.to_string(),
            model_id: "sdxl".to_string(),
            params: json!({"prompt": prompt}),
            plan_tier: PlanTier::Basic,
            base_priority: None,
        }
    }

    /// Current job record.
    pub async fn job(&self, job_id: JobId) -> Job {
        self.orchestrator
            .job(job_id)
            .await
            .expect("job lookup failed")
            .expect("job exists")
    }

    /// Poll until the job is terminal, failing the test after `limit`.
    pub async fn wait_terminal(&self, job_id: JobId, limit: Duration) -> Job {
        let deadline = Instant::now() + limit;
        loop {
            let job = self.job(job_id).await;
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "job {job_id} still {} after {limit:?}",
                job.status
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Current balance of a user.
    pub async fn balance(&self, user_id: &str) -> i64 {
        self.credits.balance(user_id).await.unwrap()
    }
}
