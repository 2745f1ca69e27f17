//! Order records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use helix_core::{CustomerId, OrderId, OrderStatus, PaymentStatus};

/// A single-product order with its price snapshot.
///
/// `total_price` equals `unit_price * quantity`; the database enforces this
/// with a check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product snapshot for an order about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    /// `unit_price * quantity`, checked against the ledger's bounds when
    /// the order was validated.
    pub total_price: Decimal,
}
