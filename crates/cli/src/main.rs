//! Helix CLI - Database migrations and payment reconciliation.
//!
//! # Usage
//!
//! ```bash
//! # Run checkout ledger migrations
//! helix-cli migrate
//!
//! # Settle payments completed at PayPal but still pending locally
//! helix-cli reconcile --older-than-minutes 30
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "helix-cli")]
#[command(author, version, about = "Helix checkout CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run checkout database migrations
    Migrate,
    /// Settle pending payments whose gateway intent has completed
    Reconcile {
        /// Only examine payments created at least this many minutes ago
        #[arg(long, default_value_t = 30)]
        older_than_minutes: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::checkout().await?,
        Commands::Reconcile { older_than_minutes } => {
            let report = commands::reconcile::run(older_than_minutes).await?;
            if report.errors > 0 {
                return Err(format!("{} payment(s) could not be reconciled", report.errors).into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_default_window() {
        let cli = Cli::try_parse_from(["helix-cli", "reconcile"]).expect("parses");
        assert!(matches!(
            cli.command,
            Commands::Reconcile {
                older_than_minutes: 30
            }
        ));
    }

    #[test]
    fn test_reconcile_custom_window() {
        let cli = Cli::try_parse_from(["helix-cli", "reconcile", "--older-than-minutes", "5"])
            .expect("parses");
        assert!(matches!(
            cli.command,
            Commands::Reconcile {
                older_than_minutes: 5
            }
        ));
    }
}
