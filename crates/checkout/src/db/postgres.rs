//! `PostgreSQL` ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use helix_core::{CustomerId, Email, OrderId, OrderStatus, PaymentId, PaymentStatus};

use super::{LedgerStore, LedgerTx, RepositoryError};
use crate::models::{Customer, Invoice, NewCustomer, NewInvoice, NewOrder, Order, Payment};

const CUSTOMER_COLUMNS: &str = "id, first_name, last_name, email, phone_number, country, \
     street_address, town_city, region, postcode, is_deleted, created_at";

const ORDER_COLUMNS: &str = "id, customer_id, product_name, product_description, product_image, \
     unit_price, quantity, total_price, payment_status, order_status, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, order_id, amount, payment_status, transaction_id, created_at, updated_at";

const INVOICE_COLUMNS: &str =
    "id, payment_id, invoice_number, price, invoice_link, created_at";

/// Ledger backed by the `checkout` schema.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique/check violations to `Conflict`, everything else to `Database`.
fn map_write_error(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_check_violation())
    {
        return RepositoryError::Conflict(format!("{what}: {}", db_err.message()));
    }
    RepositoryError::Database(e)
}

const fn expect_one_row(rows_affected: u64) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM checkout.payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM checkout.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    #[instrument(skip(self, email))]
    async fn find_customer_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM checkout.customers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn get_invoice_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM checkout.invoices WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn pending_payments(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM checkout.payments \
             WHERE payment_status = 'Pending' AND transaction_id <> '' AND created_at < $1 \
             ORDER BY id"
        ))
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;
        debug!(count = payments.len(), "Loaded pending payments");
        Ok(payments)
    }
}

/// An open `PostgreSQL` transaction. Rolled back by sqlx when dropped.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_customer_by_email(
        &mut self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM checkout.customers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(customer)
    }

    #[instrument(skip(self, customer))]
    async fn insert_customer(
        &mut self,
        customer: &NewCustomer,
    ) -> Result<Customer, RepositoryError> {
        // ON CONFLICT keeps the transaction usable when another checkout
        // created the same customer first.
        let inserted = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO checkout.customers \
                 (first_name, last_name, email, phone_number, country, \
                  street_address, town_city, region, postcode) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone_number)
        .bind(&customer.country)
        .bind(&customer.street_address)
        .bind(&customer.town_city)
        .bind(&customer.region)
        .bind(&customer.postcode)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "customer"))?;

        if let Some(customer) = inserted {
            debug!(customer_id = %customer.id, "Inserted customer");
            return Ok(customer);
        }

        self.find_customer_by_email(&customer.email)
            .await?
            .ok_or_else(|| {
                RepositoryError::DataCorruption("customer conflict without existing row".into())
            })
    }

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM checkout.customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(customer)
    }

    #[instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let inserted = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO checkout.orders \
                 (customer_id, product_name, product_description, product_image, \
                  unit_price, quantity, total_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.customer_id)
        .bind(&order.product_name)
        .bind(&order.product_description)
        .bind(&order.product_image)
        .bind(order.unit_price)
        .bind(order.quantity)
        .bind(order.total_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "order"))?;

        debug!(order_id = %inserted.id, "Inserted order");
        Ok(inserted)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM checkout.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn set_order_status(
        &mut self,
        id: OrderId,
        payment_status: PaymentStatus,
        order_status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE checkout.orders
            SET payment_status = $2, order_status = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(payment_status)
        .bind(order_status)
        .execute(&mut *self.tx)
        .await?;
        expect_one_row(result.rows_affected())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn insert_payment(
        &mut self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<Payment, RepositoryError> {
        let inserted = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO checkout.payments (order_id, amount) \
             VALUES ($1, $2) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(order_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "payment"))?;

        debug!(payment_id = %inserted.id, "Inserted payment");
        Ok(inserted)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM checkout.payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(payment)
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn set_transaction_id(
        &mut self,
        id: PaymentId,
        transaction_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE checkout.payments
            SET transaction_id = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(transaction_id)
        .execute(&mut *self.tx)
        .await?;
        expect_one_row(result.rows_affected())
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn set_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE checkout.payments
            SET payment_status = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .execute(&mut *self.tx)
        .await?;
        expect_one_row(result.rows_affected())
    }

    #[instrument(skip(self, invoice), fields(payment_id = %invoice.payment_id))]
    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<Invoice, RepositoryError> {
        let inserted = sqlx::query_as::<_, Invoice>(&format!(
            "INSERT INTO checkout.invoices (payment_id, invoice_number, price, invoice_link) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(invoice.payment_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.price)
        .bind(&invoice.invoice_link)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "invoice"))?;

        debug!(invoice_number = %inserted.invoice_number, "Inserted invoice");
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
