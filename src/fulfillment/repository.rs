//! Orders repository
//!
//! Order rows only. The stock and promotion effects of an order go through
//! the ledger and promotions repositories inside the same transaction; the
//! fulfilment service orchestrates the three.

use jiff::Timestamp;

use crate::{
    fulfillment::{
        errors::FulfillmentServiceError,
        records::{OrderRecord, OrderStatus, OrderUuid},
    },
    store::Tx,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct OrdersRepository;

impl OrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn get(
        &self,
        tx: &mut Tx,
        order: OrderUuid,
    ) -> Result<OrderRecord, FulfillmentServiceError> {
        tx.order(order).ok_or(FulfillmentServiceError::NotFound)
    }

    pub(crate) fn insert(&self, tx: &mut Tx, order: OrderRecord) {
        tx.put_order(order);
    }

    pub(crate) fn set_status(
        &self,
        tx: &mut Tx,
        mut order: OrderRecord,
        status: OrderStatus,
        now: Timestamp,
    ) -> OrderRecord {
        order.status = status;
        order.updated_at = now;

        tx.put_order(order.clone());

        order
    }
}
