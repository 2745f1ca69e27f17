//! Payment reconciliation command.
//!
//! Settles pending payments whose `PayPal` intent has already completed,
//! for example when the customer closed the browser before the return
//! callback reached the service.
//!
//! # Usage
//!
//! ```bash
//! helix-cli reconcile --older-than-minutes 30
//! ```
//!
//! Uses the same environment as the checkout service.

use std::sync::Arc;

use chrono::Duration;

use helix_checkout::config::{CheckoutConfig, ConfigError};
use helix_checkout::db::{self, PgLedger};
use helix_checkout::gateway::{GatewayError, PayPalClient};
use helix_checkout::services::email::SmtpError;
use helix_checkout::services::{
    InvoiceGenerator, PaymentPipeline, PipelineSettings, ReconcileReport, SettlementError,
    SmtpNotifier,
};

/// Errors that can occur while reconciling.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Reconciliation failed: {0}")]
    Settlement(#[from] SettlementError),
}

/// Run one reconciliation pass over payments older than `older_than_minutes`.
///
/// # Errors
///
/// Returns error if configuration is invalid or the pass could not start.
pub async fn run(older_than_minutes: u32) -> Result<ReconcileReport, ReconcileError> {
    let config = CheckoutConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let gateway = PayPalClient::from_config(&config.gateway)?;
    let notifier = SmtpNotifier::new(&config.email)?;

    let pipeline = PaymentPipeline::new(
        Arc::new(PgLedger::new(pool)),
        Arc::new(gateway),
        Arc::new(notifier),
        InvoiceGenerator::new(config.public_dir.clone()),
        PipelineSettings::from_config(&config),
    );

    let report = pipeline
        .reconcile_pending(Duration::minutes(i64::from(older_than_minutes)))
        .await?;

    tracing::info!(
        examined = report.examined,
        settled = report.settled,
        already_settled = report.already_settled,
        still_pending = report.still_pending,
        errors = report.errors,
        "Reconciliation complete"
    );
    Ok(report)
}
