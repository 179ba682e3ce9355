//! Promotion evaluation results

use rust_decimal::Decimal;

use crate::{
    ledger::records::ProductUuid,
    promotions::{
        errors::{GiftRejection, VoucherError},
        records::{GiftRuleUuid, VoucherUuid},
    },
};

/// A gift rule the current cart qualifies for, with what can be picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleGift {
    pub rule_uuid: GiftRuleUuid,
    pub name: String,
    pub priority: i32,
    pub offers: Vec<AvailableOffer>,
}

/// One pickable gift product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableOffer {
    pub product_uuid: ProductUuid,
    pub max_per_order: Decimal,
    /// Stock available right now. `None` when the product's inventory is
    /// not tracked and availability is unconstrained.
    pub available: Option<Decimal>,
}

/// A voucher resolved against a subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherDiscount {
    pub voucher_uuid: VoucherUuid,
    pub code: String,
    pub amount: Decimal,
}

/// A promotion that did not survive checkout. Advisory only: checkout
/// completes without the promotion rather than failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionRejection {
    Voucher { code: String, reason: VoucherError },
    Gift { rule: GiftRuleUuid, reason: GiftRejection },
}
