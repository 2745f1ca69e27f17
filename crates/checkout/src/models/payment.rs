//! Payment records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use helix_core::{OrderId, PaymentId, PaymentStatus};

/// A payment attempt for an order.
///
/// `transaction_id` holds the gateway intent id. It is empty until the
/// intent has been opened, which happens inside the same transaction that
/// inserts the row, so committed rows always carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
