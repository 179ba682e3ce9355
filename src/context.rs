//! Core Context

use std::sync::Arc;

use crate::{
    fulfillment::{FulfillmentService, OrderFulfillment},
    ledger::{LedgerService, StockLedger},
    promotions::{PromotionEngine, PromotionsService},
    store::{RetryPolicy, Store},
};

/// The three services of the inventory core, wired to one shared store so
/// that checkout can span orders, stock and promotions in one transaction.
#[derive(Clone)]
pub struct CoreContext {
    pub ledger: Arc<dyn LedgerService>,
    pub fulfillment: Arc<dyn FulfillmentService>,
    pub promotions: Arc<dyn PromotionsService>,
}

impl CoreContext {
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Store::new())
    }

    /// Builds a context over an existing store.
    #[must_use]
    pub fn with_store(store: Store) -> Self {
        Self {
            ledger: Arc::new(StockLedger::new(store.clone())),
            fulfillment: Arc::new(OrderFulfillment::new(store.clone())),
            promotions: Arc::new(PromotionEngine::new(store)),
        }
    }

    /// Builds a context whose services all share `retry` for transaction
    /// conflicts.
    #[must_use]
    pub fn with_retry_policy(store: Store, retry: RetryPolicy) -> Self {
        Self {
            ledger: Arc::new(StockLedger::new(store.clone()).with_retry_policy(retry)),
            fulfillment: Arc::new(OrderFulfillment::new(store.clone()).with_retry_policy(retry)),
            promotions: Arc::new(PromotionEngine::new(store).with_retry_policy(retry)),
        }
    }
}

impl Default for CoreContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use crate::{
        fulfillment::data::CheckoutRequest,
        ids::CustomerUuid,
        ledger::{MockLedgerService, data::NewProduct, records::ProductUuid},
        promotions::data::CartSnapshot,
    };

    use super::*;

    #[tokio::test]
    async fn services_share_one_store() -> TestResult {
        let ctx = CoreContext::new();

        let product = ctx
            .ledger
            .create_product(NewProduct::piece("Notebook", dec!(8), dec!(4)))
            .await?;

        // Fulfilment reserves against the rows the ledger wrote.
        let cart = CartSnapshot::new(CustomerUuid::generate()).with_line(
            product.uuid,
            dec!(3),
            dec!(8),
        );
        ctx.fulfillment
            .create_order(cart, CheckoutRequest::new())
            .await?;

        let current = ctx.ledger.get_product(product.uuid).await?;
        assert_eq!(current.reserved(), dec!(3));
        assert_eq!(current.available(), dec!(1));

        Ok(())
    }

    #[tokio::test]
    async fn mocked_services_slot_into_the_context() -> TestResult {
        let uuid = ProductUuid::generate();

        let mut ledger = MockLedgerService::new();
        ledger
            .expect_get_product()
            .returning(move |requested| {
                assert_eq!(requested, uuid);
                Err(crate::ledger::LedgerServiceError::NotFound)
            });

        let ctx = CoreContext {
            ledger: Arc::new(ledger),
            ..CoreContext::new()
        };

        let result = ctx.ledger.get_product(uuid).await;
        assert!(result.is_err());

        Ok(())
    }
}
