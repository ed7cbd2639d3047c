//! Configuration inspection commands.

use clap::{Args, Subcommand};

use genqueue_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// List the model catalog
    Models,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = super::load_config(config_path)?;
            config.database.url = config.database.redacted_url();
            config.cache.redis.url = config.cache.redis.redacted_url();
            if config.generation.api_key.is_some() {
                config.generation.api_key = Some("****".to_string());
            }
            match format {
                OutputFormat::Json => output::print_record(&config, format),
                OutputFormat::Table => println!("{config:#?}"),
            }
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                output::print_success(&format!("Configuration '{config_path}' is valid"));
                output::print_kv("Store", &config.store.provider.to_string());
                output::print_kv("Credits", &config.credits.provider.to_string());
                output::print_kv("Cache", &config.cache.provider.to_string());
                output::print_kv("Database", &config.database.redacted_url());
                output::print_kv("Backend", &config.generation.base_url);
                output::print_kv(
                    "Batching",
                    &format!(
                        "size {} / timeout {}s / concurrency {}",
                        config.queue.max_batch_size,
                        config.queue.batch_timeout_seconds,
                        config.queue.max_concurrent_jobs
                    ),
                );
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {e}"));
                return Err(e);
            }
        },
        ConfigCommand::Models => {
            let config = super::load_config(config_path)?;
            let mut rows: Vec<ModelRow> = config
                .models
                .ids()
                .filter_map(|id| {
                    config.models.get(id).map(|profile| ModelRow {
                        model_id: id.to_string(),
                        credits_per_output: profile.credits_per_output,
                        complexity_weight: profile.complexity_weight,
                        estimated_seconds: profile.estimated_duration_seconds,
                    })
                })
                .collect();
            rows.sort_by(|a, b| a.model_id.cmp(&b.model_id));
            output::print_list(&rows, format);
        }
    }

    Ok(())
}

/// Model catalog row
#[derive(Debug, serde::Serialize, tabled::Tabled)]
struct ModelRow {
    model_id: String,
    credits_per_output: i64,
    complexity_weight: i32,
    estimated_seconds: u64,
}
