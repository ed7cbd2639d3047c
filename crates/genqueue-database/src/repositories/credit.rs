//! Credit ledger repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use genqueue_core::error::{AppError, ErrorKind};
use genqueue_core::result::AppResult;

use crate::traits::CreditLedger;

/// Repository for user credit balances and the transaction log.
#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: PgPool,
}

impl CreditRepository {
    /// Create a new credit repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |e| AppError::with_source(ErrorKind::Database, context, e)
    }

    /// Apply a signed balance change and log it in one transaction.
    async fn apply(&self, user_id: &str, delta: i64, reason: &str) -> AppResult<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Self::map_err("Failed to begin credit transaction"))?;

        let balance: i64 = sqlx::query_scalar(
            "INSERT INTO user_credits (user_id, balance, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO UPDATE \
             SET balance = user_credits.balance + EXCLUDED.balance, updated_at = NOW() \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(Self::map_err("Failed to update credit balance"))?;

        sqlx::query("INSERT INTO credit_transactions (user_id, amount, reason) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(delta)
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err("Failed to record credit transaction"))?;

        tx.commit()
            .await
            .map_err(Self::map_err("Failed to commit credit transaction"))?;
        Ok(balance)
    }
}

#[async_trait]
impl CreditLedger for CreditRepository {
    async fn deduct(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Self::map_err("Failed to begin credit transaction"))?;

        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE user_credits SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2 \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Self::map_err("Failed to deduct credits"))?;

        let Some(remaining) = remaining else {
            debug!(user_id, amount, "Credit deduction refused");
            return Ok(false);
        };

        sqlx::query("INSERT INTO credit_transactions (user_id, amount, reason) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(-amount)
            .bind(reason)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err("Failed to record credit transaction"))?;

        tx.commit()
            .await
            .map_err(Self::map_err("Failed to commit credit transaction"))?;

        debug!(user_id, amount, remaining, "Credits deducted");
        Ok(true)
    }

    async fn refund(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<()> {
        self.apply(user_id, amount, reason).await?;
        Ok(())
    }

    async fn grant(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::validation("Grant amount must be positive"));
        }
        self.apply(user_id, amount, reason).await
    }

    async fn balance(&self, user_id: &str) -> AppResult<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM user_credits WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::map_err("Failed to read credit balance"))?;
        Ok(balance.unwrap_or(0))
    }
}
