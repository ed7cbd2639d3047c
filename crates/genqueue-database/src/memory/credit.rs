//! DashMap-backed credit ledger.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use genqueue_core::error::AppError;
use genqueue_core::result::AppResult;

use crate::traits::CreditLedger;

/// Credit ledger kept in process memory.
///
/// Users seen for the first time start with `initial_balance`.
#[derive(Debug)]
pub struct MemoryCreditLedger {
    balances: DashMap<String, i64>,
    initial_balance: i64,
}

impl MemoryCreditLedger {
    /// Create a ledger that provisions new users with `initial_balance`.
    pub fn new(initial_balance: i64) -> Self {
        Self {
            balances: DashMap::new(),
            initial_balance: initial_balance.max(0),
        }
    }

    /// Set a user's balance directly.
    pub fn set_balance(&self, user_id: impl Into<String>, balance: i64) {
        self.balances.insert(user_id.into(), balance.max(0));
    }

    fn entry(&self, user_id: &str) -> dashmap::mapref::one::RefMut<'_, String, i64> {
        match self.balances.entry(user_id.to_string()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => entry.insert(self.initial_balance),
        }
    }
}

impl Default for MemoryCreditLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn deduct(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<bool> {
        let mut balance = self.entry(user_id);
        if *balance < amount {
            debug!(user_id, amount, balance = *balance, reason, "Credit deduction refused");
            return Ok(false);
        }
        *balance -= amount;
        debug!(user_id, amount, remaining = *balance, reason, "Credits deducted");
        Ok(true)
    }

    async fn refund(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<()> {
        let mut balance = self.entry(user_id);
        *balance += amount.max(0);
        debug!(user_id, amount, balance = *balance, reason, "Credits refunded");
        Ok(())
    }

    async fn grant(&self, user_id: &str, amount: i64, reason: &str) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::validation("Grant amount must be positive"));
        }
        let mut balance = self.entry(user_id);
        *balance += amount;
        debug!(user_id, amount, balance = *balance, reason, "Credits granted");
        Ok(*balance)
    }

    async fn balance(&self, user_id: &str) -> AppResult<i64> {
        Ok(self
            .balances
            .get(user_id)
            .map(|b| *b)
            .unwrap_or(self.initial_balance))
    }
}
