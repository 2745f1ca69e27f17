//! Invoice records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use helix_core::{InvoiceId, InvoiceNumber, PaymentId};

/// Proof that a payment was settled, one per payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: InvoiceId,
    pub payment_id: PaymentId,
    pub invoice_number: InvoiceNumber,
    pub price: Decimal,
    /// Path of the generated document relative to the public directory.
    pub invoice_link: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub payment_id: PaymentId,
    pub invoice_number: InvoiceNumber,
    pub price: Decimal,
    pub invoice_link: String,
}
