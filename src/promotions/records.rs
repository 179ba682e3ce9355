//! Promotion records

use jiff::Timestamp;
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::{
    ids::{CategoryUuid, TypedUuid},
    ledger::records::ProductUuid,
    promotions::data::{NewGiftRule, NewVoucher},
};

/// Gift rule UUID
pub type GiftRuleUuid = TypedUuid<GiftRuleRecord>;

/// Voucher UUID
pub type VoucherUuid = TypedUuid<VoucherRecord>;

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionLogic {
    /// Every condition must hold.
    And,
    /// At least one condition must hold.
    Or,
}

/// One testable predicate over a cart snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiftCondition {
    /// Cart subtotal reaches `amount`.
    CartMinAmount { amount: Decimal },
    /// The cart holds at least `min_quantity` of a specific product.
    ProductInCart {
        product_uuid: ProductUuid,
        min_quantity: Decimal,
    },
    /// Cart lines in a category add up to at least `amount`.
    CategoryMinAmount {
        category_uuid: CategoryUuid,
        amount: Decimal,
    },
}

/// A product the rule gives away, capped per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GiftOffer {
    pub product_uuid: ProductUuid,
    pub max_per_order: Decimal,
}

/// A configured gift promotion.
#[derive(Debug, Clone)]
pub struct GiftRuleRecord {
    pub uuid: GiftRuleUuid,
    pub name: String,
    /// Higher priority is presented first.
    pub priority: i32,
    pub is_active: bool,
    pub condition_logic: ConditionLogic,
    pub conditions: SmallVec<[GiftCondition; 2]>,
    pub offers: SmallVec<[GiftOffer; 2]>,
    pub valid_from: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    /// Cap on grants across all customers. `None` is uncapped.
    pub max_total_uses: Option<u64>,
    /// Cap on grants per customer. `None` is uncapped.
    pub max_uses_per_customer: Option<u64>,
    pub current_total_uses: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GiftRuleRecord {
    pub(crate) fn new(new: NewGiftRule, now: Timestamp) -> Self {
        Self {
            uuid: new.uuid,
            name: new.name,
            priority: new.priority,
            is_active: new.is_active,
            condition_logic: new.condition_logic,
            conditions: SmallVec::from_vec(new.conditions),
            offers: SmallVec::from_vec(new.offers),
            valid_from: new.valid_from,
            valid_until: new.valid_until,
            max_total_uses: new.max_total_uses,
            max_uses_per_customer: new.max_uses_per_customer,
            current_total_uses: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn in_window(&self, now: Timestamp) -> bool {
        self.valid_from.is_none_or(|from| now >= from)
            && self.valid_until.is_none_or(|until| now <= until)
    }

    #[must_use]
    pub fn total_cap_reached(&self) -> bool {
        self.max_total_uses
            .is_some_and(|max| self.current_total_uses >= max)
    }

    /// Books one grant against the total-use counter.
    pub(crate) fn record_grant(&mut self, now: Timestamp) {
        self.current_total_uses += 1;
        self.updated_at = now;
    }
}

/// How a voucher discounts an order. A cap only makes sense for percentage
/// discounts, so only that variant carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    Percentage {
        /// Percent of the subtotal, in `(0, 100]`.
        value: Decimal,
        /// Upper bound on the resulting amount.
        max_discount: Option<Decimal>,
    },
    Fixed {
        value: Decimal,
    },
}

/// A redeemable discount code.
#[derive(Debug, Clone)]
pub struct VoucherRecord {
    pub uuid: VoucherUuid,
    pub code: String,
    pub discount: DiscountKind,
    /// Subtotal required before the voucher applies. Zero means none.
    pub min_purchase: Decimal,
    /// Total redemptions allowed. `None` is unlimited.
    pub max_usage: Option<u64>,
    pub used_count: u64,
    pub valid_until: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VoucherRecord {
    pub(crate) fn new(new: NewVoucher, now: Timestamp) -> Self {
        Self {
            uuid: new.uuid,
            code: new.code,
            discount: new.discount,
            min_purchase: new.min_purchase,
            max_usage: new.max_usage,
            used_count: 0,
            valid_until: new.valid_until,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_usage.is_some_and(|max| self.used_count >= max)
    }

    /// Books one redemption.
    pub(crate) fn record_use(&mut self, now: Timestamp) {
        self.used_count += 1;
        self.updated_at = now;
    }
}
