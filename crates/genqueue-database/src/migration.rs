//! Schema migrations for `generation_jobs`, `user_credits` and
//! `credit_transactions`.

use sqlx::PgPool;
use tracing::info;

use genqueue_core::error::{AppError, ErrorKind};
use genqueue_core::result::AppResult;

/// Apply every migration under `migrations/` that has not run yet.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(available = migrator.iter().count(), "Applying schema migrations");

    migrator
        .run(pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Schema migration failed", e))?;

    info!("Schema is up to date");
    Ok(())
}
