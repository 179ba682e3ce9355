//! Stock ledger
//!
//! Tracks physical stock, reservations and lifetime sales per product, with
//! an append-only movement log as the audit trail. `available` is always
//! derived from `stock - reserved` and is the only number a shopper-facing
//! caller should trust.

pub mod data;
pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::LedgerServiceError;
pub use service::*;
