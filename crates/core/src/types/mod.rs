//! Domain types for the checkout pipeline.

pub mod email;
pub mod id;
pub mod invoice;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use invoice::InvoiceNumber;
pub use money::{
    CurrencyCode, MAX_TOTAL, MAX_UNIT_PRICE, MoneyError, format_amount, line_total, parse_price,
};
pub use status::*;
