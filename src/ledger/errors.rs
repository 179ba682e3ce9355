//! Stock ledger errors.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{ledger::records::ProductUuid, quantity::QuantityError};

#[derive(Debug, Error)]
pub enum LedgerServiceError {
    #[error("product already exists")]
    AlreadyExists,

    #[error("product not found")]
    NotFound,

    #[error("invalid data")]
    InvalidData,

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("invalid quantity")]
    Quantity(#[from] QuantityError),

    #[error("adjustment by {delta} would leave stock at {would_be} with {reserved} reserved")]
    InvalidAdjustment {
        delta: Decimal,
        would_be: Decimal,
        reserved: Decimal,
    },

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(#[from] StockViolation),

    #[error("concurrent modification")]
    ConcurrentModification,
}

/// A product whose counters are in a forbidden state, or an operation that
/// would put them there. Surfaced by audits and refused writes; never
/// repaired silently.
#[derive(Debug, Clone, Error)]
#[error("product {product}: {kind}")]
pub struct StockViolation {
    pub product: ProductUuid,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Copy, Error)]
pub enum ViolationKind {
    #[error("stock is negative ({stock})")]
    NegativeStock { stock: Decimal },

    #[error("reserved is negative ({reserved})")]
    NegativeReserved { reserved: Decimal },

    #[error("reserved {reserved} exceeds stock {stock}")]
    ReservedExceedsStock { stock: Decimal, reserved: Decimal },

    #[error("commit of {requested} exceeds the {reserved} outstanding")]
    CommitExceedsReserved {
        requested: Decimal,
        reserved: Decimal,
    },
}
