//! Ledger row types.
//!
//! Each entity has a row type (`Customer`, `Order`, ...) read back from the
//! store and, where the pipeline inserts it, a `New*` type carrying the
//! caller-supplied columns.

pub mod customer;
pub mod invoice;
pub mod order;
pub mod payment;

pub use customer::{Customer, NewCustomer};
pub use invoice::{Invoice, NewInvoice};
pub use order::{NewOrder, Order};
pub use payment::Payment;
