//! Promotion inputs

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    ids::CustomerUuid,
    ledger::records::ProductUuid,
    promotions::{
        errors::InvalidPromotion,
        records::{ConditionLogic, DiscountKind, GiftCondition, GiftOffer, GiftRuleUuid, VoucherUuid},
    },
};

/// A cart as promotion evaluation and checkout see it: an ephemeral snapshot
/// priced by the caller. Nothing here is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    pub customer: CustomerUuid,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    #[must_use]
    pub fn new(customer: CustomerUuid) -> Self {
        Self {
            customer,
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_line(
        mut self,
        product_uuid: ProductUuid,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        self.lines.push(CartLine {
            product_uuid,
            quantity,
            unit_price,
        });
        self
    }

    /// Sum of `quantity * unit_price` across the lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| line.quantity * line.unit_price)
            .sum()
    }
}

/// One priced cart line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartLine {
    pub product_uuid: ProductUuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// New gift rule data.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGiftRule {
    pub uuid: GiftRuleUuid,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub condition_logic: ConditionLogic,
    pub conditions: Vec<GiftCondition>,
    pub offers: Vec<GiftOffer>,
    pub valid_from: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    pub max_total_uses: Option<u64>,
    pub max_uses_per_customer: Option<u64>,
}

impl NewGiftRule {
    /// An active, uncapped, always-valid rule with no conditions or offers
    /// yet. Conditions combine with [`ConditionLogic::And`] unless changed.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            uuid: GiftRuleUuid::generate(),
            name: name.to_owned(),
            priority: 0,
            is_active: true,
            condition_logic: ConditionLogic::And,
            conditions: Vec::new(),
            offers: Vec::new(),
            valid_from: None,
            valid_until: None,
            max_total_uses: None,
            max_uses_per_customer: None,
        }
    }

    #[must_use]
    pub fn with_logic(mut self, logic: ConditionLogic) -> Self {
        self.condition_logic = logic;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: GiftCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn with_offer(mut self, product_uuid: ProductUuid, max_per_order: Decimal) -> Self {
        self.offers.push(GiftOffer {
            product_uuid,
            max_per_order,
        });
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn valid_between(mut self, from: Option<Timestamp>, until: Option<Timestamp>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    #[must_use]
    pub fn with_total_cap(mut self, max_total_uses: u64) -> Self {
        self.max_total_uses = Some(max_total_uses);
        self
    }

    #[must_use]
    pub fn with_per_customer_cap(mut self, max_uses_per_customer: u64) -> Self {
        self.max_uses_per_customer = Some(max_uses_per_customer);
        self
    }

    /// Checks the rule for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns an error when the rule has no conditions or offers, carries
    /// non-positive amounts or caps, or its validity window is inverted.
    pub fn validate(&self) -> Result<(), InvalidPromotion> {
        if self.conditions.is_empty() {
            return Err(InvalidPromotion::NoConditions);
        }

        if self.offers.is_empty() {
            return Err(InvalidPromotion::NoOffers);
        }

        for condition in &self.conditions {
            match *condition {
                GiftCondition::CartMinAmount { amount }
                | GiftCondition::CategoryMinAmount { amount, .. } => {
                    if amount <= Decimal::ZERO {
                        return Err(InvalidPromotion::NonPositiveAmount { value: amount });
                    }
                }
                GiftCondition::ProductInCart { min_quantity, .. } => {
                    if min_quantity <= Decimal::ZERO {
                        return Err(InvalidPromotion::NonPositiveQuantity {
                            value: min_quantity,
                        });
                    }
                }
            }
        }

        for offer in &self.offers {
            if offer.max_per_order <= Decimal::ZERO {
                return Err(InvalidPromotion::NonPositiveOfferCap {
                    product: offer.product_uuid,
                });
            }
        }

        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until < from {
                return Err(InvalidPromotion::EmptyWindow);
            }
        }

        if self.max_total_uses == Some(0) {
            return Err(InvalidPromotion::ZeroTotalCap);
        }

        if self.max_uses_per_customer == Some(0) {
            return Err(InvalidPromotion::ZeroCustomerCap);
        }

        Ok(())
    }
}

/// New voucher data.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVoucher {
    pub uuid: VoucherUuid,
    pub code: String,
    pub discount: DiscountKind,
    pub min_purchase: Decimal,
    pub max_usage: Option<u64>,
    pub valid_until: Option<Timestamp>,
    pub is_active: bool,
}

impl NewVoucher {
    #[must_use]
    pub fn percentage(code: &str, value: Decimal) -> Self {
        Self::new(
            code,
            DiscountKind::Percentage {
                value,
                max_discount: None,
            },
        )
    }

    #[must_use]
    pub fn fixed(code: &str, value: Decimal) -> Self {
        Self::new(code, DiscountKind::Fixed { value })
    }

    fn new(code: &str, discount: DiscountKind) -> Self {
        Self {
            uuid: VoucherUuid::generate(),
            code: code.to_owned(),
            discount,
            min_purchase: Decimal::ZERO,
            max_usage: None,
            valid_until: None,
            is_active: true,
        }
    }

    #[must_use]
    pub fn with_max_discount(mut self, max_discount: Decimal) -> Self {
        if let DiscountKind::Percentage { value, .. } = self.discount {
            self.discount = DiscountKind::Percentage {
                value,
                max_discount: Some(max_discount),
            };
        }
        self
    }

    #[must_use]
    pub fn with_min_purchase(mut self, min_purchase: Decimal) -> Self {
        self.min_purchase = min_purchase;
        self
    }

    #[must_use]
    pub fn with_max_usage(mut self, max_usage: u64) -> Self {
        self.max_usage = Some(max_usage);
        self
    }

    #[must_use]
    pub fn valid_until(mut self, until: Timestamp) -> Self {
        self.valid_until = Some(until);
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Checks the voucher for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns an error when the code is empty, the discount is out of
    /// range, or a cap is non-positive.
    pub fn validate(&self) -> Result<(), InvalidPromotion> {
        if self.code.trim().is_empty() {
            return Err(InvalidPromotion::EmptyCode);
        }

        match self.discount {
            DiscountKind::Percentage {
                value,
                max_discount,
            } => {
                if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                    return Err(InvalidPromotion::PercentageOutOfRange { value });
                }

                if let Some(cap) = max_discount {
                    if cap <= Decimal::ZERO {
                        return Err(InvalidPromotion::NonPositiveDiscountCap { value: cap });
                    }
                }
            }
            DiscountKind::Fixed { value } => {
                if value <= Decimal::ZERO {
                    return Err(InvalidPromotion::NonPositiveDiscount { value });
                }
            }
        }

        if self.min_purchase < Decimal::ZERO {
            return Err(InvalidPromotion::NegativeMinPurchase {
                value: self.min_purchase,
            });
        }

        if self.max_usage == Some(0) {
            return Err(InvalidPromotion::ZeroUsageCap);
        }

        Ok(())
    }
}
