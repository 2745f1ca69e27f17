//! Helix Core - shared domain types for the checkout pipeline.
//!
//! Used by:
//! - `checkout` - HTTP service that assembles orders and settles payments
//! - `cli` - migrations and the reconciliation job
//!
//! # Architecture
//!
//! Only types live here: no I/O, no database access, no HTTP clients.
//! Database encodings are behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - ids, emails, money, statuses and invoice numbers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
