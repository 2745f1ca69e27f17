//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! helix-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! Migrations are embedded from `crates/checkout/migrations/`.

use sqlx::PgPool;

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

fn database_url() -> Result<String, MigrationError> {
    std::env::var("CHECKOUT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingEnvVar("CHECKOUT_DATABASE_URL"))
}

/// Run the checkout ledger migrations.
///
/// # Errors
///
/// Returns error if the database is unreachable or a migration fails.
pub async fn checkout() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = database_url()?;

    tracing::info!("Connecting to checkout database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running checkout migrations...");
    sqlx::migrate!("../checkout/migrations").run(&pool).await?;

    tracing::info!("Checkout migrations complete!");
    Ok(())
}
