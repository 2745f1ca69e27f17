//! Helix Genomics checkout service.
//!
//! Takes a customer order, opens a `PayPal` payment for it, settles the
//! payment when the customer returns from the gateway, writes the invoice
//! and notifies the customer and the operator.
//!
//! The crate is a library so the pipeline can be driven in tests with an
//! in-memory ledger and a mock gateway; `main.rs` wires the production
//! collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
