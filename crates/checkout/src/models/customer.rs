//! Customer records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use helix_core::{CustomerId, Email};

/// A customer, unique by normalized email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Email,
    pub phone_number: String,
    pub country: String,
    pub street_address: String,
    pub town_city: String,
    pub region: Option<String>,
    pub postcode: Option<String>,
    /// Soft-delete flag, never set by checkout.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Name as printed on invoices and emails.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// Contact details for a customer about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Email,
    pub phone_number: String,
    pub country: String,
    pub street_address: String,
    pub town_city: String,
    pub region: Option<String>,
    pub postcode: Option<String>,
}

impl NewCustomer {
    #[must_use]
    pub fn into_customer(self, id: CustomerId, created_at: DateTime<Utc>) -> Customer {
        Customer {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            country: self.country,
            street_address: self.street_address,
            town_city: self.town_city,
            region: self.region,
            postcode: self.postcode,
            is_deleted: false,
            created_at,
        }
    }
}
