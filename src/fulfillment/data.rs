//! Checkout payloads

use rust_decimal::Decimal;

use crate::{
    fulfillment::records::OrderRecord,
    ledger::records::ProductUuid,
    promotions::{models::PromotionRejection, records::GiftRuleUuid},
};

/// What the shopper asked checkout to apply on top of the paid cart lines.
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub voucher_code: Option<String>,
    pub gift: Option<GiftSelection>,
}

impl CheckoutRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_voucher(mut self, code: &str) -> Self {
        self.voucher_code = Some(code.to_owned());

        self
    }

    #[must_use]
    pub fn with_gift(mut self, gift: GiftSelection) -> Self {
        self.gift = Some(gift);

        self
    }
}

/// The shopper's gift choice under one rule.
#[derive(Debug, Clone)]
pub struct GiftSelection {
    pub rule_uuid: GiftRuleUuid,
    pub picks: Vec<GiftPick>,
}

impl GiftSelection {
    #[must_use]
    pub fn new(rule_uuid: GiftRuleUuid) -> Self {
        Self {
            rule_uuid,
            picks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pick(mut self, product_uuid: ProductUuid, quantity: Decimal) -> Self {
        self.picks.push(GiftPick {
            product_uuid,
            quantity,
        });

        self
    }
}

/// One picked gift product and how many units of it.
#[derive(Debug, Clone, Copy)]
pub struct GiftPick {
    pub product_uuid: ProductUuid,
    pub quantity: Decimal,
}

/// A created order plus any promotions that did not survive checkout.
/// Rejections are advisory; the order itself stands.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: OrderRecord,
    pub rejections: Vec<PromotionRejection>,
}
