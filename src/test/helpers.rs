//! Test Helpers

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    ledger::{
        data::NewProduct,
        records::{ProductUuid, StockDisplayMode, UnitKind},
    },
    quantity::QuantityPolicy,
};

/// A weighed product sold in quarter-kilo steps.
pub(crate) fn bulk_product(name: &str, price: Decimal, initial_stock: Decimal) -> NewProduct {
    NewProduct {
        uuid: ProductUuid::generate(),
        name: name.to_owned(),
        category: None,
        unit: UnitKind::Weight,
        unit_name: "kg".to_owned(),
        price,
        policy: QuantityPolicy::fractional(dec!(0.25), dec!(0.25)),
        track_inventory: true,
        display_mode: StockDisplayMode::Visible,
        initial_stock,
    }
}

/// A product whose inventory is not tracked, like a made-to-order service.
pub(crate) fn untracked_product(name: &str) -> NewProduct {
    NewProduct {
        uuid: ProductUuid::generate(),
        name: name.to_owned(),
        category: None,
        unit: UnitKind::Piece,
        unit_name: "piece".to_owned(),
        price: dec!(5),
        policy: QuantityPolicy::whole_units(),
        track_inventory: false,
        display_mode: StockDisplayMode::Hidden,
        initial_stock: Decimal::ZERO,
    }
}
