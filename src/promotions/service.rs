//! Promotion engine service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tracing::info;

use crate::{
    promotions::{
        data::{CartSnapshot, NewGiftRule, NewVoucher},
        definitions::PromotionSet,
        errors::PromotionsServiceError,
        eval,
        models::{AvailableOffer, EligibleGift, VoucherDiscount},
        records::{GiftRuleRecord, GiftRuleUuid, VoucherRecord, VoucherUuid},
        repository::PromotionsRepository,
    },
    store::{RetryPolicy, Store, with_retry},
};

/// Store-backed implementation of [`PromotionsService`].
#[derive(Debug, Clone)]
pub struct PromotionEngine {
    store: Store,
    retry: RetryPolicy,
    repository: PromotionsRepository,
}

impl PromotionEngine {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            repository: PromotionsRepository::new(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl PromotionsService for PromotionEngine {
    #[tracing::instrument(
        name = "promotions.service.create_gift_rule",
        skip(self, rule),
        fields(rule_uuid = %rule.uuid),
        err
    )]
    async fn create_gift_rule(
        &self,
        rule: NewGiftRule,
    ) -> Result<GiftRuleRecord, PromotionsServiceError> {
        let created = with_retry(
            &self.store,
            &self.retry,
            || PromotionsServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .insert_gift_rule(tx, rule.clone(), Timestamp::now())
            },
        )
        .await?;

        info!(rule_uuid = %created.uuid, name = %created.name, "created gift rule");

        Ok(created)
    }

    #[tracing::instrument(
        name = "promotions.service.create_voucher",
        skip(self, voucher),
        fields(code = %voucher.code),
        err
    )]
    async fn create_voucher(
        &self,
        voucher: NewVoucher,
    ) -> Result<VoucherRecord, PromotionsServiceError> {
        let created = with_retry(
            &self.store,
            &self.retry,
            || PromotionsServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .insert_voucher(tx, voucher.clone(), Timestamp::now())
            },
        )
        .await?;

        info!(voucher_uuid = %created.uuid, code = %created.code, "created voucher");

        Ok(created)
    }

    async fn get_gift_rule(
        &self,
        rule: GiftRuleUuid,
    ) -> Result<GiftRuleRecord, PromotionsServiceError> {
        let mut tx = self.store.begin();
        self.repository.get_gift_rule(&mut tx, rule)
    }

    async fn get_voucher(
        &self,
        voucher: VoucherUuid,
    ) -> Result<VoucherRecord, PromotionsServiceError> {
        let mut tx = self.store.begin();
        self.repository.get_voucher(&mut tx, voucher)
    }

    #[tracing::instrument(
        name = "promotions.service.set_gift_rule_active",
        skip(self),
        fields(rule_uuid = %rule, active),
        err
    )]
    async fn set_gift_rule_active(
        &self,
        rule: GiftRuleUuid,
        active: bool,
    ) -> Result<GiftRuleRecord, PromotionsServiceError> {
        let updated = with_retry(
            &self.store,
            &self.retry,
            || PromotionsServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .set_gift_rule_active(tx, rule, active, Timestamp::now())
            },
        )
        .await?;

        info!(rule_uuid = %rule, active, "set gift rule active flag");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "promotions.service.set_voucher_active",
        skip(self),
        fields(voucher_uuid = %voucher, active),
        err
    )]
    async fn set_voucher_active(
        &self,
        voucher: VoucherUuid,
        active: bool,
    ) -> Result<VoucherRecord, PromotionsServiceError> {
        let updated = with_retry(
            &self.store,
            &self.retry,
            || PromotionsServiceError::ConcurrentModification,
            |tx| {
                self.repository
                    .set_voucher_active(tx, voucher, active, Timestamp::now())
            },
        )
        .await?;

        info!(voucher_uuid = %voucher, active, "set voucher active flag");

        Ok(updated)
    }

    async fn validate_voucher(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<VoucherDiscount, PromotionsServiceError> {
        let mut tx = self.store.begin();

        let discount = self
            .repository
            .appraise_voucher(&mut tx, code, subtotal, Timestamp::now())?;

        Ok(discount)
    }

    async fn evaluate_gifts(
        &self,
        cart: CartSnapshot,
    ) -> Result<Vec<EligibleGift>, PromotionsServiceError> {
        let mut tx = self.store.begin();
        let now = Timestamp::now();

        let mut category_of = FxHashMap::default();

        for line in &cart.lines {
            if let Some(record) = tx.product(line.product_uuid) {
                category_of.insert(line.product_uuid, record.category);
            }
        }

        let totals = eval::CartTotals::compute(&cart, &category_of);

        let mut eligible = Vec::new();

        for rule in tx.gift_rules() {
            let customer_uses = tx.gift_grant_count(rule.uuid, cart.customer);

            if eval::rule_usable(&rule, customer_uses, now).is_err() {
                continue;
            }

            if !eval::conditions_met(rule.condition_logic, &rule.conditions, &totals) {
                continue;
            }

            // Offers whose product has left the catalogue or run dry are
            // not shown; untracked products are never constrained.
            let offers: Vec<AvailableOffer> = rule
                .offers
                .iter()
                .filter_map(|offer| {
                    let product = tx.product(offer.product_uuid)?;

                    let available = if product.track_inventory {
                        if product.available() <= Decimal::ZERO {
                            return None;
                        }

                        Some(product.available())
                    } else {
                        None
                    };

                    Some(AvailableOffer {
                        product_uuid: offer.product_uuid,
                        max_per_order: offer.max_per_order,
                        available,
                    })
                })
                .collect();

            if offers.is_empty() {
                continue;
            }

            eligible.push(EligibleGift {
                rule_uuid: rule.uuid,
                name: rule.name,
                priority: rule.priority,
                offers,
            });
        }

        eligible.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

        Ok(eligible)
    }

    #[tracing::instrument(
        name = "promotions.service.import_promotion_set",
        skip(self, set),
        fields(rule_count = set.gift_rules.len(), voucher_count = set.vouchers.len()),
        err
    )]
    async fn import_promotion_set(&self, set: PromotionSet) -> Result<(), PromotionsServiceError> {
        let rule_count = set.gift_rules.len();
        let voucher_count = set.vouchers.len();

        with_retry(
            &self.store,
            &self.retry,
            || PromotionsServiceError::ConcurrentModification,
            |tx| {
                let now = Timestamp::now();

                for rule in set.gift_rules.clone() {
                    self.repository.insert_gift_rule(tx, rule, now)?;
                }

                for voucher in set.vouchers.clone() {
                    self.repository.insert_voucher(tx, voucher, now)?;
                }

                Ok(())
            },
        )
        .await?;

        info!(rule_count, voucher_count, "imported promotion set");

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait PromotionsService: Send + Sync {
    /// Registers a gift rule after validating its conditions and offers.
    async fn create_gift_rule(
        &self,
        rule: NewGiftRule,
    ) -> Result<GiftRuleRecord, PromotionsServiceError>;

    /// Registers a voucher. Codes are unique across the store.
    async fn create_voucher(
        &self,
        voucher: NewVoucher,
    ) -> Result<VoucherRecord, PromotionsServiceError>;

    /// Retrieves a single gift rule.
    async fn get_gift_rule(
        &self,
        rule: GiftRuleUuid,
    ) -> Result<GiftRuleRecord, PromotionsServiceError>;

    /// Retrieves a single voucher.
    async fn get_voucher(
        &self,
        voucher: VoucherUuid,
    ) -> Result<VoucherRecord, PromotionsServiceError>;

    /// Flips a gift rule's active flag without touching its counters.
    async fn set_gift_rule_active(
        &self,
        rule: GiftRuleUuid,
        active: bool,
    ) -> Result<GiftRuleRecord, PromotionsServiceError>;

    /// Flips a voucher's active flag without touching its counters.
    async fn set_voucher_active(
        &self,
        voucher: VoucherUuid,
        active: bool,
    ) -> Result<VoucherRecord, PromotionsServiceError>;

    /// What a voucher would take off the given subtotal right now. Nothing
    /// is booked; redemption happens at checkout.
    async fn validate_voucher(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<VoucherDiscount, PromotionsServiceError>;

    /// Gift rules the cart currently qualifies for, highest priority first,
    /// with each offer's availability.
    async fn evaluate_gifts(
        &self,
        cart: CartSnapshot,
    ) -> Result<Vec<EligibleGift>, PromotionsServiceError>;

    /// Imports a resolved definition set in one transaction: either every
    /// rule and voucher lands, or none do.
    async fn import_promotion_set(&self, set: PromotionSet) -> Result<(), PromotionsServiceError>;
}
