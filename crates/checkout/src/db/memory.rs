//! In-process ledger for tests and local runs without `PostgreSQL`.
//!
//! A transaction takes the table lock for its whole lifetime and works on a
//! staged copy of the tables. `commit` swaps the copy in; dropping or rolling
//! back discards it. Transactions are therefore fully serialized.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use helix_core::{
    CustomerId, Email, InvoiceId, OrderId, OrderStatus, PaymentId, PaymentStatus,
};

use super::{LedgerStore, LedgerTx, RepositoryError};
use crate::models::{Customer, Invoice, NewCustomer, NewInvoice, NewOrder, Order, Payment};

#[derive(Debug, Clone, Default)]
struct LedgerTables {
    customers: Vec<Customer>,
    orders: Vec<Order>,
    payments: Vec<Payment>,
    invoices: Vec<Invoice>,
    next_id: i32,
}

impl LedgerTables {
    // One sequence shared by all tables keeps ids distinct across entities,
    // which makes mixed-up ids show up in tests.
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn customer_by_email(&self, email: &Email) -> Option<&Customer> {
        self.customers.iter().find(|c| &c.email == email)
    }

    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }

    fn payment_mut(&mut self, id: PaymentId) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.id == id)
    }
}

/// Ledger kept in memory behind an async mutex.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    tables: Arc<Mutex<LedgerTables>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.tables.lock().await.customers.clone()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.tables.lock().await.orders.clone()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.lock().await.payments.clone()
    }

    pub async fn invoices(&self) -> Vec<Invoice> {
        self.tables.lock().await.invoices.clone()
    }

    /// Move a payment's creation time, for exercising age-based queries.
    pub async fn backdate_payment(&self, id: PaymentId, created_at: DateTime<Utc>) {
        if let Some(payment) = self.tables.lock().await.payment_mut(id) {
            payment.created_at = created_at;
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, RepositoryError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = LedgerTables::clone(&guard);
        Ok(Box::new(MemoryLedgerTx { guard, staged }))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_customer_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.customer_by_email(email).cloned())
    }

    async fn get_invoice_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .invoices
            .iter()
            .find(|i| i.payment_id == payment_id)
            .cloned())
    }

    async fn pending_payments(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut pending: Vec<Payment> = tables
            .payments
            .iter()
            .filter(|p| {
                p.payment_status == PaymentStatus::Pending
                    && !p.transaction_id.is_empty()
                    && p.created_at < created_before
            })
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.id);
        Ok(pending)
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerTables>,
    staged: LedgerTables,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn find_customer_by_email(
        &mut self,
        email: &Email,
    ) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.staged.customer_by_email(email).cloned())
    }

    async fn insert_customer(
        &mut self,
        customer: &NewCustomer,
    ) -> Result<Customer, RepositoryError> {
        if let Some(existing) = self.staged.customer_by_email(&customer.email) {
            return Ok(existing.clone());
        }
        let id = CustomerId::new(self.staged.next_id());
        let row = customer.clone().into_customer(id, Utc::now());
        self.staged.customers.push(row.clone());
        Ok(row)
    }

    async fn get_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.staged.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if !self.staged.customers.iter().any(|c| c.id == order.customer_id) {
            return Err(RepositoryError::Conflict(format!(
                "order: customer {} does not exist",
                order.customer_id
            )));
        }
        if order.quantity < 1 || order.unit_price <= Decimal::ZERO {
            return Err(RepositoryError::Conflict(
                "order: price and quantity must be positive".into(),
            ));
        }

        let now = Utc::now();
        let row = Order {
            id: OrderId::new(self.staged.next_id()),
            customer_id: order.customer_id,
            product_name: order.product_name.clone(),
            product_description: order.product_description.clone(),
            product_image: order.product_image.clone(),
            unit_price: order.unit_price,
            quantity: order.quantity,
            total_price: order.total_price,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.push(row.clone());
        Ok(row)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.staged.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        payment_status: PaymentStatus,
        order_status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let order = self.staged.order_mut(id).ok_or(RepositoryError::NotFound)?;
        order.payment_status = payment_status;
        order.order_status = order_status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_payment(
        &mut self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<Payment, RepositoryError> {
        if !self.staged.orders.iter().any(|o| o.id == order_id) {
            return Err(RepositoryError::Conflict(format!(
                "payment: order {order_id} does not exist"
            )));
        }
        let active = self
            .staged
            .payments
            .iter()
            .any(|p| p.order_id == order_id && p.payment_status != PaymentStatus::Failed);
        if active {
            return Err(RepositoryError::Conflict(format!(
                "payment: order {order_id} already has an active payment"
            )));
        }

        let now = Utc::now();
        let row = Payment {
            id: PaymentId::new(self.staged.next_id()),
            order_id,
            amount,
            payment_status: PaymentStatus::Pending,
            transaction_id: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.staged.payments.push(row.clone());
        Ok(row)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.staged.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn set_transaction_id(
        &mut self,
        id: PaymentId,
        transaction_id: &str,
    ) -> Result<(), RepositoryError> {
        let payment = self.staged.payment_mut(id).ok_or(RepositoryError::NotFound)?;
        transaction_id.clone_into(&mut payment.transaction_id);
        payment.updated_at = Utc::now();
        Ok(())
    }

    async fn set_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let payment = self.staged.payment_mut(id).ok_or(RepositoryError::NotFound)?;
        payment.payment_status = status;
        payment.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> Result<Invoice, RepositoryError> {
        if !self.staged.payments.iter().any(|p| p.id == invoice.payment_id) {
            return Err(RepositoryError::Conflict(format!(
                "invoice: payment {} does not exist",
                invoice.payment_id
            )));
        }
        let duplicate = self.staged.invoices.iter().any(|i| {
            i.payment_id == invoice.payment_id || i.invoice_number == invoice.invoice_number
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "invoice: payment {} already invoiced",
                invoice.payment_id
            )));
        }

        let row = Invoice {
            id: InvoiceId::new(self.staged.next_id()),
            payment_id: invoice.payment_id,
            invoice_number: invoice.invoice_number.clone(),
            price: invoice.price,
            invoice_link: invoice.invoice_link.clone(),
            created_at: Utc::now(),
        };
        self.staged.invoices.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use helix_core::InvoiceNumber;
    use rust_decimal_macros::dec;

    use super::*;

    fn new_customer(email: &str) -> NewCustomer {
        NewCustomer {
            first_name: "Ada".into(),
            last_name: Some("Lovelace".into()),
            email: Email::parse(email).unwrap(),
            phone_number: "5551234567".into(),
            country: "United Kingdom".into(),
            street_address: "12 St James Square".into(),
            town_city: "London".into(),
            region: None,
            postcode: None,
        }
    }

    async fn seed_order(tx: &mut dyn LedgerTx) -> Order {
        let customer = tx.insert_customer(&new_customer("ada@example.com")).await.unwrap();
        tx.insert_order(&NewOrder {
            customer_id: customer.id,
            product_name: "Widget".into(),
            product_description: None,
            product_image: None,
            unit_price: dec!(10.00),
            quantity: 3,
            total_price: dec!(30.00),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_rows() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let order = seed_order(tx.as_mut()).await;
        tx.commit().await.unwrap();

        let orders = ledger.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, order.id);
        assert_eq!(orders[0].total_price, dec!(30.00));
    }

    #[tokio::test]
    async fn test_drop_discards_rows() {
        let ledger = MemoryLedger::new();
        {
            let mut tx = ledger.begin().await.unwrap();
            seed_order(tx.as_mut()).await;
        }
        assert!(ledger.customers().await.is_empty());
        assert!(ledger.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_customer_returns_existing_row() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let first = tx.insert_customer(&new_customer("ada@example.com")).await.unwrap();
        let second = tx.insert_customer(&new_customer("ADA@example.com")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.customers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_second_active_payment_conflicts() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let order = seed_order(tx.as_mut()).await;
        let payment = tx.insert_payment(order.id, dec!(30.00)).await.unwrap();

        let err = tx.insert_payment(order.id, dec!(30.00)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        tx.set_payment_status(payment.id, PaymentStatus::Failed).await.unwrap();
        assert!(tx.insert_payment(order.id, dec!(30.00)).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_invoice_conflicts() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let order = seed_order(tx.as_mut()).await;
        let payment = tx.insert_payment(order.id, dec!(30.00)).await.unwrap();
        let invoice = NewInvoice {
            payment_id: payment.id,
            invoice_number: InvoiceNumber::for_payment(payment.id),
            price: dec!(30.00),
            invoice_link: format!("invoices/invoice_{}.pdf", payment.id),
        };

        tx.insert_invoice(&invoice).await.unwrap();
        let err = tx.insert_invoice(&invoice).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_pending_payments_filters_by_age_and_intent() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();
        let order = seed_order(tx.as_mut()).await;
        let payment = tx.insert_payment(order.id, dec!(30.00)).await.unwrap();
        tx.commit().await.unwrap();

        let later = Utc::now() + chrono::Duration::minutes(1);
        // No intent recorded yet
        assert!(ledger.pending_payments(later).await.unwrap().is_empty());

        let mut tx = ledger.begin().await.unwrap();
        tx.set_transaction_id(payment.id, "5O190127TN364715T").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.pending_payments(later).await.unwrap().len(), 1);
        let earlier = Utc::now() - chrono::Duration::minutes(1);
        assert!(ledger.pending_payments(earlier).await.unwrap().is_empty());
    }
}
