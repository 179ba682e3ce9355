//! Promotions repository
//!
//! Gift rule and voucher rows, plus the two counters that promotions
//! maintain: voucher redemptions and per-customer gift grants. Checkout
//! drives redemption and grant consumption through these methods inside its
//! own transactions, so the order row and its promotion effects commit
//! together or not at all.

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    ids::CustomerUuid,
    promotions::{
        data::{NewGiftRule, NewVoucher},
        errors::{PromotionsServiceError, VoucherError},
        eval,
        models::VoucherDiscount,
        records::{GiftRuleRecord, GiftRuleUuid, VoucherRecord, VoucherUuid},
    },
    store::Tx,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct PromotionsRepository;

impl PromotionsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn insert_gift_rule(
        &self,
        tx: &mut Tx,
        new: NewGiftRule,
        now: Timestamp,
    ) -> Result<GiftRuleRecord, PromotionsServiceError> {
        new.validate()?;

        let record = GiftRuleRecord::new(new, now);

        tx.put_gift_rule(record.clone());

        Ok(record)
    }

    /// Registers a voucher. Codes are unique across the store; the code
    /// index is pinned here so a racing insert of the same code fails the
    /// commit rather than slipping in.
    pub(crate) fn insert_voucher(
        &self,
        tx: &mut Tx,
        new: NewVoucher,
        now: Timestamp,
    ) -> Result<VoucherRecord, PromotionsServiceError> {
        new.validate()?;

        if tx.voucher_by_code(&new.code).is_some() {
            return Err(PromotionsServiceError::DuplicateCode);
        }

        let record = VoucherRecord::new(new, now);

        tx.put_voucher(record.clone());

        Ok(record)
    }

    pub(crate) fn get_gift_rule(
        &self,
        tx: &mut Tx,
        rule: GiftRuleUuid,
    ) -> Result<GiftRuleRecord, PromotionsServiceError> {
        tx.gift_rule(rule)
            .ok_or(PromotionsServiceError::RuleNotFound)
    }

    pub(crate) fn get_voucher(
        &self,
        tx: &mut Tx,
        voucher: VoucherUuid,
    ) -> Result<VoucherRecord, PromotionsServiceError> {
        tx.voucher(voucher)
            .ok_or(PromotionsServiceError::VoucherNotFound)
    }

    pub(crate) fn set_gift_rule_active(
        &self,
        tx: &mut Tx,
        rule: GiftRuleUuid,
        active: bool,
        now: Timestamp,
    ) -> Result<GiftRuleRecord, PromotionsServiceError> {
        let mut record = self.get_gift_rule(tx, rule)?;

        record.is_active = active;
        record.updated_at = now;

        tx.put_gift_rule(record.clone());

        Ok(record)
    }

    pub(crate) fn set_voucher_active(
        &self,
        tx: &mut Tx,
        voucher: VoucherUuid,
        active: bool,
        now: Timestamp,
    ) -> Result<VoucherRecord, PromotionsServiceError> {
        let mut record = self.get_voucher(tx, voucher)?;

        record.is_active = active;
        record.updated_at = now;

        tx.put_voucher(record.clone());

        Ok(record)
    }

    /// Resolves what a voucher would take off a subtotal without booking a
    /// redemption.
    pub(crate) fn appraise_voucher(
        &self,
        tx: &mut Tx,
        code: &str,
        subtotal: Decimal,
        now: Timestamp,
    ) -> Result<VoucherDiscount, VoucherError> {
        let voucher = tx.voucher_by_code(code).ok_or(VoucherError::NotFound)?;
        let amount = eval::voucher_discount(&voucher, subtotal, now)?;

        Ok(VoucherDiscount {
            voucher_uuid: voucher.uuid,
            code: voucher.code,
            amount,
        })
    }

    /// Books one redemption against the voucher's usage cap. The bumped
    /// counter rides the transaction, so two orders racing for the last
    /// redemption cannot both win.
    pub(crate) fn redeem_voucher(
        &self,
        tx: &mut Tx,
        code: &str,
        subtotal: Decimal,
        now: Timestamp,
    ) -> Result<VoucherDiscount, VoucherError> {
        let mut voucher = tx.voucher_by_code(code).ok_or(VoucherError::NotFound)?;
        let amount = eval::voucher_discount(&voucher, subtotal, now)?;

        voucher.record_use(now);

        let discount = VoucherDiscount {
            voucher_uuid: voucher.uuid,
            code: voucher.code.clone(),
            amount,
        };

        tx.put_voucher(voucher);

        Ok(discount)
    }

    /// Books one gift grant: the rule's total counter and the customer's
    /// own count both move in this transaction.
    pub(crate) fn consume_grant(
        &self,
        tx: &mut Tx,
        mut rule: GiftRuleRecord,
        customer: CustomerUuid,
        now: Timestamp,
    ) {
        let rule_uuid = rule.uuid;

        rule.record_grant(now);

        tx.put_gift_rule(rule);
        tx.record_gift_grant(rule_uuid, customer);
    }
}
