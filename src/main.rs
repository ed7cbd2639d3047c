//! GenQueue Server: batched AI generation job scheduler.
//!
//! Main entry point that wires the store, ledger, cache, generation
//! backend and orchestrator together and runs the sweep loop until
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use genqueue_cache::{CacheManager, ResultCache};
use genqueue_core::config::{AppConfig, LogFormat, PersistenceBackend};
use genqueue_core::error::AppError;
use genqueue_database::memory::{MemoryCreditLedger, MemoryJobStore};
use genqueue_database::{CreditLedger, DatabasePool, JobStore};
use genqueue_scheduler::{HttpGenerationBackend, QueueOrchestrator, QueueSweeper};

/// Upper bound on how long shutdown waits for running batches.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("GENQUEUE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting GenQueue v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let database = if config.store.needs_database(&config.credits) {
        tracing::info!("Connecting to database...");
        let db = DatabasePool::connect(&config.database).await?;

        tracing::info!("Running database migrations...");
        genqueue_database::migration::run_migrations(db.pool()).await?;
        tracing::info!("Database migrations complete");
        Some(db)
    } else {
        None
    };

    // ── Step 2: Job store and credit ledger ──────────────────────
    let store: Arc<dyn JobStore> = match (&database, config.store.provider) {
        (Some(db), PersistenceBackend::Postgres) => Arc::new(db.job_repository()),
        _ => Arc::new(MemoryJobStore::new()),
    };
    let credits: Arc<dyn CreditLedger> = match (&database, config.credits.provider) {
        (Some(db), PersistenceBackend::Postgres) => Arc::new(db.credit_repository()),
        _ => Arc::new(MemoryCreditLedger::new(config.credits.initial_balance)),
    };
    tracing::info!(
        "Job store: {}, credit ledger: {}",
        config.store.provider,
        config.credits.provider
    );

    // ── Step 3: Initialize result cache ──────────────────────────
    tracing::info!(
        "Initializing cache (provider: {})...",
        config.cache.provider
    );
    let cache = CacheManager::connect(&config.cache).await?;
    let cache = ResultCache::new(cache, config.cache.result_ttl());
    match cache.health_check().await {
        Ok(true) => tracing::info!("Cache initialized"),
        Ok(false) => tracing::warn!("Cache health check failed; results may not be reused"),
        Err(e) => tracing::warn!("Cache health check error: {}", e),
    }

    // ── Step 4: Generation backend ───────────────────────────────
    let backend = Arc::new(HttpGenerationBackend::new(&config.generation)?);
    tracing::info!(
        "Generation backend at {} (timeout {}s)",
        config.generation.base_url,
        config.generation.timeout_seconds
    );

    // ── Step 5: Orchestrator ─────────────────────────────────────
    let orchestrator = QueueOrchestrator::new(&config, store, credits, cache, backend);

    // ── Step 6: Shutdown channel + sweeper ───────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = QueueSweeper::new(orchestrator.clone());
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(shutdown_rx).await;
    });

    tracing::info!(
        "GenQueue ready (batch size {}, batch timeout {}s, concurrency {})",
        config.queue.max_batch_size,
        config.queue.batch_timeout_seconds,
        config.queue.max_concurrent_jobs
    );

    // ── Step 7: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(Duration::from_secs(10), sweeper_handle).await;

    // ── Step 8: Wait for running batches ─────────────────────────
    tracing::info!("Waiting for running batches to complete...");
    if !orchestrator.wait_idle(DRAIN_TIMEOUT).await {
        tracing::warn!(
            "Batches still running after {:?}; their jobs stay in 'processing'",
            DRAIN_TIMEOUT
        );
    }

    if let Some(db) = database {
        db.close().await;
    }

    tracing::info!("GenQueue server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
