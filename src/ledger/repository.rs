//! Stock ledger repository
//!
//! The only code in the crate that changes product counters or appends to
//! the movement log. Order fulfilment drives reservations through these
//! methods inside its own transactions, so an order row and its stock
//! effects commit together or not at all.

use jiff::Timestamp;
use rust_decimal::Decimal;
use tracing::error;

use crate::{
    fulfillment::records::OrderUuid,
    ledger::{
        data::{NewProduct, Reservation},
        errors::{LedgerServiceError, StockViolation, ViolationKind},
        records::{MovementKind, ProductRecord, ProductUuid, StockMovementRecord},
    },
    quantity::QuantityError,
    store::Tx,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct StockRepository;

impl StockRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Fetches a product, refusing to hand out corrupted counter state.
    pub(crate) fn get(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
    ) -> Result<ProductRecord, LedgerServiceError> {
        let record = tx.product(product).ok_or(LedgerServiceError::NotFound)?;
        self.checked(record)
    }

    pub(crate) fn insert(
        &self,
        tx: &mut Tx,
        new: NewProduct,
        now: Timestamp,
    ) -> Result<ProductRecord, LedgerServiceError> {
        new.policy.check()?;

        if new.initial_stock < Decimal::ZERO {
            return Err(QuantityError::Negative {
                quantity: new.initial_stock,
            }
            .into());
        }

        if new.price < Decimal::ZERO {
            return Err(LedgerServiceError::InvalidData);
        }

        if tx.product(new.uuid).is_some() {
            return Err(LedgerServiceError::AlreadyExists);
        }

        let record = ProductRecord::new(new, now);

        if record.track_inventory && record.stock() > Decimal::ZERO {
            tx.append_movement(StockMovementRecord::new(
                record.uuid,
                MovementKind::In,
                record.stock(),
                None,
                None,
                now,
            ));
        }

        tx.put_product(record.clone());

        Ok(record)
    }

    /// Puts `quantity` aside for an order. Validates the quantity against
    /// the product's policy and refuses to promise more than is available.
    pub(crate) fn reserve(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
        now: Timestamp,
    ) -> Result<Reservation, LedgerServiceError> {
        let mut record = self.get(tx, product)?;
        record.policy.validate(quantity)?;

        let reservation = Reservation {
            product_uuid: product,
            quantity,
            order_uuid: order,
        };

        if !record.track_inventory {
            return Ok(reservation);
        }

        let available = record.available();
        if quantity > available {
            return Err(LedgerServiceError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        record.apply_reserve(quantity, now);
        tx.append_movement(StockMovementRecord::new(
            product,
            MovementKind::Reserve,
            quantity,
            None,
            order,
            now,
        ));
        self.put_checked(tx, record)?;

        Ok(reservation)
    }

    /// Hands a reservation back, clamping at zero rather than driving the
    /// reserved counter negative. Returns the quantity actually released.
    pub(crate) fn release(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
        now: Timestamp,
    ) -> Result<Decimal, LedgerServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(QuantityError::NotPositive { quantity }.into());
        }

        let mut record = self.get(tx, product)?;

        if !record.track_inventory {
            return Ok(Decimal::ZERO);
        }

        let released = quantity.min(record.reserved());
        if released < quantity {
            error!(
                product = %product,
                requested = %quantity,
                reserved = %record.reserved(),
                "release exceeds outstanding reservation, clamping"
            );
        }

        if released > Decimal::ZERO {
            record.apply_release(released, now);
            tx.append_movement(StockMovementRecord::new(
                product,
                MovementKind::Release,
                released,
                None,
                order,
                now,
            ));
            self.put_checked(tx, record)?;
        }

        Ok(released)
    }

    /// Turns a reservation into an outbound sale. A commit larger than the
    /// outstanding reservation means fulfilment lost track and is refused.
    pub(crate) fn commit_reserved(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
        quantity: Decimal,
        order: Option<OrderUuid>,
        now: Timestamp,
    ) -> Result<(), LedgerServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(QuantityError::NotPositive { quantity }.into());
        }

        let mut record = self.get(tx, product)?;

        if !record.track_inventory {
            record.record_untracked_sale(quantity, now);
            tx.append_movement(StockMovementRecord::new(
                product,
                MovementKind::Out,
                quantity,
                None,
                order,
                now,
            ));
            tx.put_product(record);
            return Ok(());
        }

        if quantity > record.reserved() {
            let violation = StockViolation {
                product,
                kind: ViolationKind::CommitExceedsReserved {
                    requested: quantity,
                    reserved: record.reserved(),
                },
            };
            error!(%violation, "refusing commit without a matching reservation");
            return Err(LedgerServiceError::InvariantViolation(violation));
        }

        record.apply_sale(quantity, now);
        tx.append_movement(StockMovementRecord::new(
            product,
            MovementKind::Out,
            quantity,
            None,
            order,
            now,
        ));
        self.put_checked(tx, record)?;

        Ok(())
    }

    pub(crate) fn receive(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
        quantity: Decimal,
        note: Option<String>,
        now: Timestamp,
    ) -> Result<ProductRecord, LedgerServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(QuantityError::NotPositive { quantity }.into());
        }

        let mut record = self.get(tx, product)?;
        record.receive_stock(quantity, now);
        tx.append_movement(StockMovementRecord::new(
            product,
            MovementKind::In,
            quantity,
            note,
            None,
            now,
        ));
        self.put_checked(tx, record.clone())?;

        Ok(record)
    }

    /// Manual signed correction. The result may not go negative or cut into
    /// quantities already promised to orders; freeing those requires the
    /// orders to be cancelled first.
    pub(crate) fn adjust(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
        delta: Decimal,
        note: Option<String>,
        now: Timestamp,
    ) -> Result<ProductRecord, LedgerServiceError> {
        let mut record = self.get(tx, product)?;

        if delta.is_zero() {
            return Ok(record);
        }

        let would_be = record.stock() + delta;
        if would_be < Decimal::ZERO || would_be < record.reserved() {
            return Err(LedgerServiceError::InvalidAdjustment {
                delta,
                would_be,
                reserved: record.reserved(),
            });
        }

        record.apply_adjustment(delta, now);
        tx.append_movement(StockMovementRecord::new(
            product,
            MovementKind::Adjust,
            delta,
            note,
            None,
            now,
        ));
        self.put_checked(tx, record.clone())?;

        Ok(record)
    }

    /// Integrity report for one product. Reads raw state on purpose: audits
    /// must be able to describe corruption that [`Self::get`] refuses.
    pub(crate) fn violations(
        &self,
        tx: &mut Tx,
        product: ProductUuid,
    ) -> Result<Vec<StockViolation>, LedgerServiceError> {
        let record = tx.product(product).ok_or(LedgerServiceError::NotFound)?;

        Ok(record
            .violations()
            .into_iter()
            .map(|kind| StockViolation { product, kind })
            .collect())
    }

    fn checked(&self, record: ProductRecord) -> Result<ProductRecord, LedgerServiceError> {
        if let Some(kind) = record.violations().into_iter().next() {
            let violation = StockViolation {
                product: record.uuid,
                kind,
            };
            error!(%violation, "corrupted ledger state");
            return Err(LedgerServiceError::InvariantViolation(violation));
        }

        Ok(record)
    }

    fn put_checked(&self, tx: &mut Tx, record: ProductRecord) -> Result<(), LedgerServiceError> {
        let record = self.checked(record)?;
        tx.put_product(record);
        Ok(())
    }
}
