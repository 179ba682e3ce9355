//! Pure promotion evaluation
//!
//! Everything here is a function of its inputs: no store access, no clock.
//! Services and checkout feed it records and a timestamp and get decisions
//! back, so the same rules apply at browse time and inside the checkout
//! transaction.

use jiff::Timestamp;
use rust_decimal::{Decimal, RoundingStrategy};
use rustc_hash::FxHashMap;

use crate::{
    ids::CategoryUuid,
    ledger::records::ProductUuid,
    promotions::{
        data::CartSnapshot,
        errors::{GiftRejection, VoucherError},
        records::{ConditionLogic, DiscountKind, GiftCondition, GiftRuleRecord, VoucherRecord},
    },
};

/// Cart figures the conditions are tested against.
#[derive(Debug, Clone)]
pub(crate) struct CartTotals {
    subtotal: Decimal,
    quantity_by_product: FxHashMap<ProductUuid, Decimal>,
    amount_by_category: FxHashMap<CategoryUuid, Decimal>,
}

impl CartTotals {
    /// Folds a cart into the totals conditions care about. `category_of`
    /// maps cart products to their category; products missing from the map
    /// still count towards the subtotal but not towards any category.
    pub(crate) fn compute(
        cart: &CartSnapshot,
        category_of: &FxHashMap<ProductUuid, Option<CategoryUuid>>,
    ) -> Self {
        let mut totals = Self {
            subtotal: Decimal::ZERO,
            quantity_by_product: FxHashMap::default(),
            amount_by_category: FxHashMap::default(),
        };

        for line in &cart.lines {
            let amount = line.quantity * line.unit_price;
            totals.subtotal += amount;

            *totals
                .quantity_by_product
                .entry(line.product_uuid)
                .or_insert(Decimal::ZERO) += line.quantity;

            if let Some(Some(category)) = category_of.get(&line.product_uuid) {
                *totals
                    .amount_by_category
                    .entry(*category)
                    .or_insert(Decimal::ZERO) += amount;
            }
        }

        totals
    }

    pub(crate) fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    fn quantity_of(&self, product: ProductUuid) -> Decimal {
        self.quantity_by_product
            .get(&product)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn category_amount(&self, category: CategoryUuid) -> Decimal {
        self.amount_by_category
            .get(&category)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

pub(crate) fn condition_met(condition: &GiftCondition, totals: &CartTotals) -> bool {
    match *condition {
        GiftCondition::CartMinAmount { amount } => totals.subtotal() >= amount,
        GiftCondition::ProductInCart {
            product_uuid,
            min_quantity,
        } => totals.quantity_of(product_uuid) >= min_quantity,
        GiftCondition::CategoryMinAmount {
            category_uuid,
            amount,
        } => totals.category_amount(category_uuid) >= amount,
    }
}

/// Combines conditions under the rule's logic. `Or` over an empty list is
/// false; rules are validated to have at least one condition.
pub(crate) fn conditions_met(
    logic: ConditionLogic,
    conditions: &[GiftCondition],
    totals: &CartTotals,
) -> bool {
    match logic {
        ConditionLogic::And => conditions
            .iter()
            .all(|condition| condition_met(condition, totals)),
        ConditionLogic::Or => conditions
            .iter()
            .any(|condition| condition_met(condition, totals)),
    }
}

/// Whether a rule can grant at all right now, before looking at the cart:
/// active flag, validity window, total and per-customer caps.
pub(crate) fn rule_usable(
    rule: &GiftRuleRecord,
    customer_uses: u64,
    now: Timestamp,
) -> Result<(), GiftRejection> {
    if !rule.is_active || !rule.in_window(now) {
        return Err(GiftRejection::NotActive);
    }

    if rule.total_cap_reached() {
        return Err(GiftRejection::CapReached);
    }

    if rule
        .max_uses_per_customer
        .is_some_and(|max| customer_uses >= max)
    {
        return Err(GiftRejection::CapReached);
    }

    Ok(())
}

/// Resolves what a voucher is worth against a subtotal, or why it cannot be
/// redeemed. Percentage discounts are rounded to cents, half away from zero,
/// and capped by `max_discount`; fixed discounts never exceed the subtotal.
pub(crate) fn voucher_discount(
    voucher: &VoucherRecord,
    subtotal: Decimal,
    now: Timestamp,
) -> Result<Decimal, VoucherError> {
    if !voucher.is_active {
        return Err(VoucherError::Inactive);
    }

    if voucher.valid_until.is_some_and(|until| now > until) {
        return Err(VoucherError::Expired);
    }

    if voucher.is_exhausted() {
        return Err(VoucherError::Exhausted);
    }

    if subtotal < voucher.min_purchase {
        return Err(VoucherError::MinPurchaseNotMet {
            required: voucher.min_purchase,
            subtotal,
        });
    }

    let amount = match voucher.discount {
        DiscountKind::Percentage {
            value,
            max_discount,
        } => {
            let raw = (subtotal * value / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            match max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountKind::Fixed { value } => value.min(subtotal),
    };

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal_macros::dec;
    use smallvec::smallvec;

    use crate::{
        ids::{CategoryUuid, CustomerUuid},
        promotions::records::{DiscountKind, GiftRuleUuid, VoucherUuid},
    };

    use super::*;

    fn totals_for(cart: &CartSnapshot) -> CartTotals {
        CartTotals::compute(cart, &FxHashMap::default())
    }

    fn rule_with(
        logic: ConditionLogic,
        conditions: Vec<GiftCondition>,
    ) -> GiftRuleRecord {
        GiftRuleRecord {
            uuid: GiftRuleUuid::generate(),
            name: "rule".to_owned(),
            priority: 0,
            is_active: true,
            condition_logic: logic,
            conditions: conditions.into(),
            offers: smallvec![],
            valid_from: None,
            valid_until: None,
            max_total_uses: None,
            max_uses_per_customer: None,
            current_total_uses: 0,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn voucher_with(discount: DiscountKind) -> VoucherRecord {
        VoucherRecord {
            uuid: VoucherUuid::generate(),
            code: "CODE".to_owned(),
            discount,
            min_purchase: dec!(0),
            max_usage: None,
            used_count: 0,
            valid_until: None,
            is_active: true,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn and_logic_needs_every_condition() {
        let product = ProductUuid::generate();
        let cart = CartSnapshot::new(CustomerUuid::generate())
            .with_line(product, dec!(2), dec!(100));
        let totals = totals_for(&cart);

        let conditions = vec![
            GiftCondition::CartMinAmount { amount: dec!(150) },
            GiftCondition::ProductInCart {
                product_uuid: product,
                min_quantity: dec!(2),
            },
        ];

        assert!(conditions_met(ConditionLogic::And, &conditions, &totals));

        let stricter = vec![
            GiftCondition::CartMinAmount { amount: dec!(150) },
            GiftCondition::ProductInCart {
                product_uuid: product,
                min_quantity: dec!(3),
            },
        ];
        assert!(
            !conditions_met(ConditionLogic::And, &stricter, &totals),
            "one failing condition must sink an AND rule"
        );

        let smaller = CartSnapshot::new(CustomerUuid::generate())
            .with_line(product, dec!(2), dec!(40));
        assert!(
            !conditions_met(ConditionLogic::And, &conditions, &totals_for(&smaller)),
            "a short subtotal sinks the rule even with the product in the cart"
        );
    }

    #[test]
    fn or_logic_needs_any_condition() {
        let product = ProductUuid::generate();
        let other = ProductUuid::generate();
        let cart = CartSnapshot::new(CustomerUuid::generate())
            .with_line(product, dec!(1), dec!(10));
        let totals = totals_for(&cart);

        let conditions = vec![
            GiftCondition::CartMinAmount { amount: dec!(500) },
            GiftCondition::ProductInCart {
                product_uuid: product,
                min_quantity: dec!(1),
            },
        ];
        assert!(conditions_met(ConditionLogic::Or, &conditions, &totals));

        let none_hold = vec![
            GiftCondition::CartMinAmount { amount: dec!(500) },
            GiftCondition::ProductInCart {
                product_uuid: other,
                min_quantity: dec!(1),
            },
        ];
        assert!(!conditions_met(ConditionLogic::Or, &none_hold, &totals));
    }

    #[test]
    fn category_amounts_only_count_mapped_products() {
        let in_category = ProductUuid::generate();
        let uncategorised = ProductUuid::generate();
        let category = CategoryUuid::generate();

        let cart = CartSnapshot::new(CustomerUuid::generate())
            .with_line(in_category, dec!(2), dec!(40))
            .with_line(uncategorised, dec!(1), dec!(100));

        let mut category_of = FxHashMap::default();
        category_of.insert(in_category, Some(category));
        category_of.insert(uncategorised, None);

        let totals = CartTotals::compute(&cart, &category_of);

        assert_eq!(totals.subtotal(), dec!(180));
        assert!(condition_met(
            &GiftCondition::CategoryMinAmount {
                category_uuid: category,
                amount: dec!(80),
            },
            &totals
        ));
        assert!(!condition_met(
            &GiftCondition::CategoryMinAmount {
                category_uuid: category,
                amount: dec!(81),
            },
            &totals
        ));
    }

    #[test]
    fn boundary_amounts_are_inclusive() {
        let cart = CartSnapshot::new(CustomerUuid::generate())
            .with_line(ProductUuid::generate(), dec!(1), dec!(200));
        let totals = totals_for(&cart);

        assert!(condition_met(
            &GiftCondition::CartMinAmount { amount: dec!(200) },
            &totals
        ));
        assert!(!condition_met(
            &GiftCondition::CartMinAmount { amount: dec!(200.01) },
            &totals
        ));
    }

    #[test]
    fn rule_usability_checks_flag_window_and_caps() {
        let now = Timestamp::UNIX_EPOCH;
        let later = now + jiff::SignedDuration::from_hours(1);

        let mut rule = rule_with(ConditionLogic::And, vec![]);
        assert!(rule_usable(&rule, 0, now).is_ok());

        rule.is_active = false;
        assert_eq!(rule_usable(&rule, 0, now), Err(GiftRejection::NotActive));
        rule.is_active = true;

        rule.valid_from = Some(later);
        assert_eq!(rule_usable(&rule, 0, now), Err(GiftRejection::NotActive));
        rule.valid_from = None;

        rule.valid_until = Some(now);
        assert_eq!(rule_usable(&rule, 0, later), Err(GiftRejection::NotActive));
        rule.valid_until = None;

        rule.max_total_uses = Some(2);
        rule.current_total_uses = 2;
        assert_eq!(rule_usable(&rule, 0, now), Err(GiftRejection::CapReached));
        rule.current_total_uses = 1;
        assert!(rule_usable(&rule, 0, now).is_ok());

        rule.max_uses_per_customer = Some(1);
        assert_eq!(rule_usable(&rule, 1, now), Err(GiftRejection::CapReached));
        assert!(rule_usable(&rule, 0, now).is_ok());
    }

    #[test]
    fn percentage_discount_rounds_to_cents_and_honours_the_cap() {
        let voucher = voucher_with(DiscountKind::Percentage {
            value: dec!(15),
            max_discount: Some(dec!(30)),
        });
        let now = Timestamp::UNIX_EPOCH;

        // 15% of 150 = 22.50, under the cap.
        assert_eq!(voucher_discount(&voucher, dec!(150), now), Ok(dec!(22.50)));

        // 15% of 400 = 60, capped at 30.
        assert_eq!(voucher_discount(&voucher, dec!(400), now), Ok(dec!(30)));

        // 15% of 33.33 = 4.9995, rounded half away from zero.
        assert_eq!(voucher_discount(&voucher, dec!(33.33), now), Ok(dec!(5.00)));
    }

    #[test]
    fn fixed_discount_never_exceeds_the_subtotal() {
        let voucher = voucher_with(DiscountKind::Fixed { value: dec!(50) });
        let now = Timestamp::UNIX_EPOCH;

        assert_eq!(voucher_discount(&voucher, dec!(200), now), Ok(dec!(50)));
        assert_eq!(voucher_discount(&voucher, dec!(20), now), Ok(dec!(20)));
    }

    #[test]
    fn voucher_rejections_follow_the_check_order() {
        let now = Timestamp::UNIX_EPOCH;
        let later = now + jiff::SignedDuration::from_hours(1);

        let mut voucher = voucher_with(DiscountKind::Fixed { value: dec!(10) });

        voucher.is_active = false;
        assert_eq!(
            voucher_discount(&voucher, dec!(100), now),
            Err(VoucherError::Inactive)
        );
        voucher.is_active = true;

        voucher.valid_until = Some(now);
        assert_eq!(
            voucher_discount(&voucher, dec!(100), later),
            Err(VoucherError::Expired)
        );
        assert!(
            voucher_discount(&voucher, dec!(100), now).is_ok(),
            "the deadline itself is still valid"
        );
        voucher.valid_until = None;

        voucher.max_usage = Some(3);
        voucher.used_count = 3;
        assert_eq!(
            voucher_discount(&voucher, dec!(100), now),
            Err(VoucherError::Exhausted)
        );
        voucher.used_count = 2;

        voucher.min_purchase = dec!(150);
        assert_eq!(
            voucher_discount(&voucher, dec!(100), now),
            Err(VoucherError::MinPurchaseNotMet {
                required: dec!(150),
                subtotal: dec!(100),
            })
        );
        assert_eq!(voucher_discount(&voucher, dec!(150), now), Ok(dec!(10)));
    }
}
