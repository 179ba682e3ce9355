//! Stock ledger records

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    fulfillment::records::OrderUuid,
    ids::{CategoryUuid, TypedUuid},
    ledger::{data::NewProduct, errors::ViolationKind},
    quantity::QuantityPolicy,
};

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Stock movement UUID
pub type MovementUuid = TypedUuid<StockMovementRecord>;

/// How stock numbers may be presented to shoppers. Presentation itself is a
/// storefront concern; the ledger only carries the setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDisplayMode {
    /// Exact availability may be shown.
    Visible,
    /// Only an in/low/out-of-stock status may be shown.
    StatusOnly,
    /// No stock information may be shown.
    Hidden,
}

/// What one unit of a product is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Piece,
    Weight,
    Volume,
    Length,
}

/// A product as the ledger sees it.
///
/// The three stock counters are private: every change goes through the
/// ledger repository, which is the single write path for stock. `available`
/// is always derived, never stored.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub category: Option<CategoryUuid>,
    pub unit: UnitKind,
    /// Display name of the unit, e.g. `"kg"` or `"piece"`.
    pub unit_name: String,
    /// Current list price per unit. Pricing lives elsewhere; the ledger
    /// carries this so granted gift lines can record what they were worth.
    pub price: Decimal,
    pub policy: QuantityPolicy,
    /// When false the counters are left alone; sales still accumulate in
    /// `total_sold` and the movement log.
    pub track_inventory: bool,
    pub display_mode: StockDisplayMode,
    stock: Decimal,
    reserved: Decimal,
    total_sold: Decimal,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProductRecord {
    pub(in crate::ledger) fn new(new: NewProduct, now: Timestamp) -> Self {
        Self {
            uuid: new.uuid,
            name: new.name,
            category: new.category,
            unit: new.unit,
            unit_name: new.unit_name,
            price: new.price,
            policy: new.policy,
            track_inventory: new.track_inventory,
            display_mode: new.display_mode,
            stock: new.initial_stock,
            reserved: Decimal::ZERO,
            total_sold: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Physical stock on hand, including reserved quantities.
    #[must_use]
    pub fn stock(&self) -> Decimal {
        self.stock
    }

    /// Stock held for orders that are not yet shipped out or cancelled.
    #[must_use]
    pub fn reserved(&self) -> Decimal {
        self.reserved
    }

    /// What can still be promised to new orders: `stock - reserved`.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.stock - self.reserved
    }

    /// Lifetime quantity sold.
    #[must_use]
    pub fn total_sold(&self) -> Decimal {
        self.total_sold
    }

    pub(in crate::ledger) fn receive_stock(&mut self, quantity: Decimal, now: Timestamp) {
        self.stock += quantity;
        self.updated_at = now;
    }

    pub(in crate::ledger) fn apply_reserve(&mut self, quantity: Decimal, now: Timestamp) {
        self.reserved += quantity;
        self.updated_at = now;
    }

    pub(in crate::ledger) fn apply_release(&mut self, quantity: Decimal, now: Timestamp) {
        self.reserved -= quantity;
        self.updated_at = now;
    }

    /// A reservation turning into an outbound sale.
    pub(in crate::ledger) fn apply_sale(&mut self, quantity: Decimal, now: Timestamp) {
        self.stock -= quantity;
        self.reserved -= quantity;
        self.total_sold += quantity;
        self.updated_at = now;
    }

    /// A sale of a product whose counters are not tracked.
    pub(in crate::ledger) fn record_untracked_sale(&mut self, quantity: Decimal, now: Timestamp) {
        self.total_sold += quantity;
        self.updated_at = now;
    }

    pub(in crate::ledger) fn apply_adjustment(&mut self, delta: Decimal, now: Timestamp) {
        self.stock += delta;
        self.updated_at = now;
    }

    /// Counter states that must never occur. Non-empty means the ledger has
    /// been corrupted and the product needs manual correction.
    #[must_use]
    pub fn violations(&self) -> Vec<ViolationKind> {
        let mut violations = Vec::new();

        if self.stock < Decimal::ZERO {
            violations.push(ViolationKind::NegativeStock { stock: self.stock });
        }

        if self.reserved < Decimal::ZERO {
            violations.push(ViolationKind::NegativeReserved {
                reserved: self.reserved,
            });
        }

        if self.reserved > self.stock && self.stock >= Decimal::ZERO {
            violations.push(ViolationKind::ReservedExceedsStock {
                stock: self.stock,
                reserved: self.reserved,
            });
        }

        violations
    }
}

/// One entry in the append-only stock movement log.
#[derive(Debug, Clone)]
pub struct StockMovementRecord {
    pub uuid: MovementUuid,
    pub product_uuid: ProductUuid,
    pub kind: MovementKind,
    /// Positive magnitude for all kinds except [`MovementKind::Adjust`],
    /// which is signed.
    pub quantity: Decimal,
    /// Free-form context from the caller, e.g. a stocktake reference.
    pub note: Option<String>,
    /// The order that caused this movement, when there is one.
    pub order_uuid: Option<OrderUuid>,
    pub created_at: Timestamp,
}

impl StockMovementRecord {
    pub(in crate::ledger) fn new(
        product_uuid: ProductUuid,
        kind: MovementKind,
        quantity: Decimal,
        note: Option<String>,
        order_uuid: Option<OrderUuid>,
        now: Timestamp,
    ) -> Self {
        Self {
            uuid: MovementUuid::generate(),
            product_uuid,
            kind,
            quantity,
            note,
            order_uuid,
            created_at: now,
        }
    }
}

/// What a stock movement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    /// Stock received into the warehouse.
    In,
    /// Stock sold and gone.
    Out,
    /// Manual correction, signed.
    Adjust,
    /// Stock promised to an order.
    Reserve,
    /// A reservation handed back.
    Release,
}

impl MovementKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjust => "adjust",
            Self::Reserve => "reserve",
            Self::Release => "release",
        }
    }
}
