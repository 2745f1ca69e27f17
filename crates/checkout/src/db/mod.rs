//! Ledger storage for customers, orders, payments and invoices.
//!
//! # Schema: `checkout`
//!
//! - `customers` - unique by normalized email
//! - `orders` - one product snapshot per order, `total_price = unit_price * quantity`
//! - `payments` - at most one non-`Failed` payment per order
//! - `invoices` - at most one per payment
//!
//! The pipeline talks to storage through [`LedgerStore`] and [`LedgerTx`].
//! [`PgLedger`] is the production implementation; [`MemoryLedger`] keeps the
//! same invariants in process for tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/checkout/migrations/` and run via:
//! ```bash
//! cargo run -p helix-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use helix_core::{CustomerId, Email, OrderId, OrderStatus, PaymentId, PaymentStatus};

use crate::models::{Customer, Invoice, NewCustomer, NewInvoice, NewOrder, Order, Payment};

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store violates an expected shape.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    #[error("Not found")]
    NotFound,

    /// A uniqueness or integrity constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Entry point to the ledger: opens transactions and serves committed reads.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn find_customer_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError>;

    async fn get_invoice_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Invoice>, RepositoryError>;

    /// Pending payments that already carry a gateway intent and were created
    /// before `created_before`, oldest first.
    async fn pending_payments(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Payment>, RepositoryError>;
}

/// Writes and reads inside one ledger transaction.
#[async_trait]
pub trait LedgerTx: Send {
    async fn find_customer_by_email(
        &mut self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError>;

    /// Insert a customer. If a customer with the same email was committed
    /// concurrently, that row is returned instead.
    async fn insert_customer(&mut self, customer: &NewCustomer)
    -> Result<Customer, RepositoryError>;

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// Insert an order in `Pending`/`Pending` with its computed total.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn set_order_status(
        &mut self,
        id: OrderId,
        payment_status: PaymentStatus,
        order_status: OrderStatus,
    ) -> Result<(), RepositoryError>;

    /// Insert a `Pending` payment with an empty transaction id.
    ///
    /// Fails with `Conflict` if the order already has a non-`Failed` payment.
    async fn insert_payment(
        &mut self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<Payment, RepositoryError>;

    /// Load a payment and hold it against concurrent settlement until the
    /// transaction ends.
    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;

    async fn set_transaction_id(
        &mut self,
        id: PaymentId,
        transaction_id: &str,
    ) -> Result<(), RepositoryError>;

    async fn set_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError>;

    /// Fails with `Conflict` if the payment already has an invoice.
    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<Invoice, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}
