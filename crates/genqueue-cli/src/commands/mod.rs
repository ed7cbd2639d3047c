//! CLI command definitions and dispatch.

pub mod config;
pub mod credits;
pub mod health;
pub mod job;
pub mod migrate;

use clap::{Parser, Subcommand};

use genqueue_core::config::AppConfig;
use genqueue_core::error::AppError;
use genqueue_database::DatabasePool;

use crate::output::OutputFormat;

/// GenQueue: batched AI generation job scheduler
#[derive(Debug, Parser)]
#[command(name = "genqueue", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Configuration inspection
    Config(config::ConfigArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Job record lookup and maintenance
    Job(job::JobArgs),
    /// Queue history summary
    Health(health::HealthArgs),
    /// Credit balances
    Credits(credits::CreditsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
            Commands::Migrate(args) => migrate::execute(args, &self.config).await,
            Commands::Job(args) => job::execute(args, &self.config, self.format).await,
            Commands::Health(args) => health::execute(args, &self.config, self.format).await,
            Commands::Credits(args) => credits::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: connect to the database named in the configuration
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}
