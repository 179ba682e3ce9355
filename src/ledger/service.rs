//! Stock ledger service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    fulfillment::records::OrderUuid,
    ledger::{
        data::{NewProduct, Reservation, ReserveRequest},
        errors::{LedgerServiceError, StockViolation},
        records::{ProductRecord, ProductUuid, StockMovementRecord},
        repository::StockRepository,
    },
    store::{RetryPolicy, Store, with_retry},
};

/// Store-backed implementation of [`LedgerService`].
#[derive(Debug, Clone)]
pub struct StockLedger {
    store: Store,
    retry: RetryPolicy,
    repository: StockRepository,
}

impl StockLedger {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            repository: StockRepository::new(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl LedgerService for StockLedger {
    #[tracing::instrument(
        name = "ledger.service.create_product",
        skip(self, product),
        fields(product_uuid = %product.uuid),
        err
    )]
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<ProductRecord, LedgerServiceError> {
        let created = with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| self.repository.insert(tx, product.clone(), Timestamp::now()),
        )
        .await?;

        info!(product_uuid = %created.uuid, stock = %created.stock(), "created product");

        Ok(created)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, LedgerServiceError> {
        let mut tx = self.store.begin();
        self.repository.get(&mut tx, product)
    }

    #[tracing::instrument(
        name = "ledger.service.reserve",
        skip(self),
        fields(product_uuid = %product, quantity = %quantity),
        err
    )]
    async fn reserve(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
    ) -> Result<Reservation, LedgerServiceError> {
        let reservation = with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .reserve(tx, product, quantity, order, Timestamp::now())
            },
        )
        .await?;

        info!(product_uuid = %product, quantity = %quantity, "reserved stock");

        Ok(reservation)
    }

    #[tracing::instrument(
        name = "ledger.service.reserve_all",
        skip(self, requests),
        fields(request_count = requests.len()),
        err
    )]
    async fn reserve_all(
        &self,
        requests: Vec<ReserveRequest>,
        order: Option<OrderUuid>,
    ) -> Result<Vec<Reservation>, LedgerServiceError> {
        let reservations = with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| {
                let now = Timestamp::now();
                let mut reservations = Vec::with_capacity(requests.len());

                for request in &requests {
                    reservations.push(self.repository.reserve(
                        tx,
                        request.product_uuid,
                        request.quantity,
                        order,
                        now,
                    )?);
                }

                Ok(reservations)
            },
        )
        .await?;

        info!(reservation_count = reservations.len(), "reserved stock for all requests");

        Ok(reservations)
    }

    #[tracing::instrument(
        name = "ledger.service.release",
        skip(self),
        fields(product_uuid = %product, quantity = %quantity),
        err
    )]
    async fn release(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
    ) -> Result<Decimal, LedgerServiceError> {
        let released = with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .release(tx, product, quantity, order, Timestamp::now())
            },
        )
        .await?;

        info!(product_uuid = %product, released = %released, "released reservation");

        Ok(released)
    }

    #[tracing::instrument(
        name = "ledger.service.commit_reserved",
        skip(self),
        fields(product_uuid = %product, quantity = %quantity),
        err
    )]
    async fn commit_reserved(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
    ) -> Result<(), LedgerServiceError> {
        with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .commit_reserved(tx, product, quantity, order, Timestamp::now())
            },
        )
        .await?;

        info!(product_uuid = %product, quantity = %quantity, "committed reservation to sale");

        Ok(())
    }

    #[tracing::instrument(
        name = "ledger.service.receive_stock",
        skip(self, note),
        fields(product_uuid = %product, quantity = %quantity),
        err
    )]
    async fn receive_stock(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        note: Option<String>,
    ) -> Result<ProductRecord, LedgerServiceError> {
        let updated = with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .receive(tx, product, quantity, note.clone(), Timestamp::now())
            },
        )
        .await?;

        info!(product_uuid = %product, stock = %updated.stock(), "received stock");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "ledger.service.adjust_stock",
        skip(self, note),
        fields(product_uuid = %product, delta = %delta),
        err
    )]
    async fn adjust_stock(
        &self,
        product: ProductUuid,
        delta: Decimal,
        note: Option<String>,
    ) -> Result<ProductRecord, LedgerServiceError> {
        let updated = with_retry(
            &self.store,
            &self.retry,
            || LedgerServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .adjust(tx, product, delta, note.clone(), Timestamp::now())
            },
        )
        .await?;

        info!(product_uuid = %product, stock = %updated.stock(), "adjusted stock");

        Ok(updated)
    }

    async fn list_movements(
        &self,
        product: ProductUuid,
    ) -> Result<Vec<StockMovementRecord>, LedgerServiceError> {
        let mut tx = self.store.begin();

        if tx.product(product).is_none() {
            return Err(LedgerServiceError::NotFound);
        }

        Ok(tx.movements(product))
    }

    async fn verify_product(
        &self,
        product: ProductUuid,
    ) -> Result<Vec<StockViolation>, LedgerServiceError> {
        let mut tx = self.store.begin();
        self.repository.violations(&mut tx, product)
    }

    async fn verify_all(&self) -> Result<Vec<StockViolation>, LedgerServiceError> {
        let mut tx = self.store.begin();

        Ok(tx
            .all_products()
            .into_iter()
            .flat_map(|record| {
                let product = record.uuid;
                record
                    .violations()
                    .into_iter()
                    .map(move |kind| StockViolation { product, kind })
            })
            .collect())
    }
}

#[automock]
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Registers a product and seeds its counters from `initial_stock`.
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<ProductRecord, LedgerServiceError>;

    /// Retrieves a single product with its current counters.
    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, LedgerServiceError>;

    /// Puts stock aside for an order without changing physical stock.
    async fn reserve(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
    ) -> Result<Reservation, LedgerServiceError>;

    /// Reserves every request in one transaction; on any failure nothing is
    /// reserved.
    async fn reserve_all(
        &self,
        requests: Vec<ReserveRequest>,
        order: Option<OrderUuid>,
    ) -> Result<Vec<Reservation>, LedgerServiceError>;

    /// Hands a reservation back. Returns the quantity actually released,
    /// which is clamped to the outstanding reservation.
    async fn release(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
    ) -> Result<Decimal, LedgerServiceError>;

    /// Converts a reservation into an outbound sale.
    async fn commit_reserved(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
    ) -> Result<(), LedgerServiceError>;

    /// Books received stock into the warehouse.
    async fn receive_stock(
        &self,
        product: ProductUuid,
        quantity: Decimal,
        note: Option<String>,
    ) -> Result<ProductRecord, LedgerServiceError>;

    /// Applies a signed manual correction to physical stock.
    async fn adjust_stock(
        &self,
        product: ProductUuid,
        delta: Decimal,
        note: Option<String>,
    ) -> Result<ProductRecord, LedgerServiceError>;

    /// Movement log for one product, oldest first.
    async fn list_movements(
        &self,
        product: ProductUuid,
    ) -> Result<Vec<StockMovementRecord>, LedgerServiceError>;

    /// Integrity check for one product.
    async fn verify_product(
        &self,
        product: ProductUuid,
    ) -> Result<Vec<StockViolation>, LedgerServiceError>;

    /// Integrity check across every product.
    async fn verify_all(&self) -> Result<Vec<StockViolation>, LedgerServiceError>;
}
