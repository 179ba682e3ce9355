//! Stock ledger inputs

use rust_decimal::Decimal;

use crate::{
    fulfillment::records::OrderUuid,
    ids::CategoryUuid,
    ledger::records::{ProductUuid, StockDisplayMode, UnitKind},
    quantity::QuantityPolicy,
};

/// New product data.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub category: Option<CategoryUuid>,
    pub unit: UnitKind,
    pub unit_name: String,
    pub price: Decimal,
    pub policy: QuantityPolicy,
    pub track_inventory: bool,
    pub display_mode: StockDisplayMode,
    pub initial_stock: Decimal,
}

impl NewProduct {
    /// A tracked whole-unit product with sensible defaults.
    #[must_use]
    pub fn piece(name: &str, price: Decimal, initial_stock: Decimal) -> Self {
        Self {
            uuid: ProductUuid::generate(),
            name: name.to_owned(),
            category: None,
            unit: UnitKind::Piece,
            unit_name: "piece".to_owned(),
            price,
            policy: QuantityPolicy::whole_units(),
            track_inventory: true,
            display_mode: StockDisplayMode::Visible,
            initial_stock,
        }
    }
}

/// One line of a bulk reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveRequest {
    pub product_uuid: ProductUuid,
    pub quantity: Decimal,
}

/// Confirmation that stock has been put aside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub product_uuid: ProductUuid,
    pub quantity: Decimal,
    pub order_uuid: Option<OrderUuid>,
}
