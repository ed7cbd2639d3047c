//! Credit balance commands.

use clap::{Args, Subcommand};

use genqueue_core::error::AppError;
use genqueue_database::CreditLedger;

use crate::output::{self, OutputFormat};

/// Arguments for credit commands
#[derive(Debug, Args)]
pub struct CreditsArgs {
    /// Credits subcommand
    #[command(subcommand)]
    pub command: CreditsCommand,
}

/// Credit subcommands
#[derive(Debug, Subcommand)]
pub enum CreditsCommand {
    /// Show a user's balance
    Balance {
        /// User ID
        user: String,
    },
    /// Add credits to a user's balance
    Grant {
        /// User ID
        user: String,
        /// Amount to add
        amount: i64,
        /// Ledger note
        #[arg(short, long, default_value = "manual grant")]
        reason: String,
    },
}

#[derive(Debug, serde::Serialize)]
struct BalanceView<'a> {
    user_id: &'a str,
    balance: i64,
}

/// Execute credit commands
pub async fn execute(
    args: &CreditsArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let db = super::connect(&config).await?;
    let ledger = db.credit_repository();

    match &args.command {
        CreditsCommand::Balance { user } => {
            let balance = ledger.balance(user).await?;
            output::print_record(&BalanceView { user_id: user, balance }, format);
        }
        CreditsCommand::Grant {
            user,
            amount,
            reason,
        } => {
            let balance = ledger.grant(user, *amount, reason).await?;
            output::print_success(&format!(
                "Granted {amount} credit(s) to '{user}'; balance is now {balance}"
            ));
        }
    }

    db.close().await;
    Ok(())
}
