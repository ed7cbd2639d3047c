//! Job record store and credit ledger backend selection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend for durable job records or credit balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Process-local maps; contents are lost on restart.
    #[default]
    Memory,
    /// PostgreSQL through the shared connection pool.
    Postgres,
}

impl fmt::Display for PersistenceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        })
    }
}

/// Which backend persists job records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Job record backend.
    pub provider: PersistenceBackend,
}

/// Which backend holds user credit balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditsConfig {
    /// Ledger backend.
    pub provider: PersistenceBackend,
    /// Balance the in-memory ledger gives a user it has not seen before.
    pub initial_balance: i64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            provider: PersistenceBackend::default(),
            initial_balance: 100,
        }
    }
}

impl StoreConfig {
    /// Whether either persistence concern needs a database pool.
    pub fn needs_database(&self, credits: &CreditsConfig) -> bool {
        self.provider == PersistenceBackend::Postgres
            || credits.provider == PersistenceBackend::Postgres
    }
}
