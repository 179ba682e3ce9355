//! Test context for service-level tests.

use crate::{
    fulfillment::OrderFulfillment, ledger::StockLedger, promotions::PromotionEngine, store::Store,
};

/// All three services wired to one shared store, the way the crate is meant
/// to be deployed.
pub(crate) struct TestContext {
    pub ledger: StockLedger,
    pub fulfillment: OrderFulfillment,
    pub promotions: PromotionEngine,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        let store = Store::new();

        Self {
            ledger: StockLedger::new(store.clone()),
            fulfillment: OrderFulfillment::new(store.clone()),
            promotions: PromotionEngine::new(store),
        }
    }
}
