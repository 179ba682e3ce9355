//! Order fulfilment.
//!
//! Orders move through a fixed lifecycle and drive the stock ledger as they
//! go: creation reserves, delivery commits, cancellation releases. Checkout
//! happens in one transaction so a half-reserved cart can never be observed.

pub mod data;
pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::FulfillmentServiceError;
pub use service::*;
