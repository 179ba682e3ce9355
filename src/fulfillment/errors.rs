//! Fulfilment errors

use thiserror::Error;

use crate::{fulfillment::records::OrderStatus, ledger::LedgerServiceError};

#[derive(Debug, Error)]
pub enum FulfillmentServiceError {
    #[error("order not found")]
    NotFound,

    #[error("cannot create an order from an empty cart")]
    EmptyCart,

    #[error("cannot transition an order from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerServiceError),

    #[error("concurrent modification")]
    ConcurrentModification,
}
