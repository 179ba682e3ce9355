//! Promotion errors and rejection reasons.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::records::ProductUuid;

#[derive(Debug, Error)]
pub enum PromotionsServiceError {
    #[error("gift rule not found")]
    RuleNotFound,

    #[error("voucher not found")]
    VoucherNotFound,

    #[error("voucher code already registered")]
    DuplicateCode,

    #[error("invalid promotion")]
    Invalid(#[from] InvalidPromotion),

    #[error(transparent)]
    Voucher(#[from] VoucherError),

    #[error("concurrent modification")]
    ConcurrentModification,
}

/// Rejected promotion configuration. Raised the same way whether the data
/// arrives through the admin surface or a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidPromotion {
    #[error("a gift rule needs at least one condition")]
    NoConditions,

    #[error("a gift rule needs at least one offer")]
    NoOffers,

    #[error("condition amount must be positive, got {value}")]
    NonPositiveAmount { value: Decimal },

    #[error("condition quantity must be positive, got {value}")]
    NonPositiveQuantity { value: Decimal },

    #[error("offer cap for {product} must be positive")]
    NonPositiveOfferCap { product: ProductUuid },

    #[error("validity window ends before it starts")]
    EmptyWindow,

    #[error("total-use cap must be positive")]
    ZeroTotalCap,

    #[error("per-customer cap must be positive")]
    ZeroCustomerCap,

    #[error("usage cap must be positive")]
    ZeroUsageCap,

    #[error("voucher code must not be empty")]
    EmptyCode,

    #[error("minimum purchase must not be negative, got {value}")]
    NegativeMinPurchase { value: Decimal },

    #[error("percentage must be within (0, 100], got {value}")]
    PercentageOutOfRange { value: Decimal },

    #[error("fixed discount must be positive, got {value}")]
    NonPositiveDiscount { value: Decimal },

    #[error("discount cap must be positive, got {value}")]
    NonPositiveDiscountCap { value: Decimal },
}

/// Why a voucher is not redeemable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoucherError {
    #[error("voucher not found")]
    NotFound,

    #[error("voucher is not active")]
    Inactive,

    #[error("voucher has expired")]
    Expired,

    #[error("voucher usage cap reached")]
    Exhausted,

    #[error("subtotal {subtotal} is below the required minimum of {required}")]
    MinPurchaseNotMet {
        required: Decimal,
        subtotal: Decimal,
    },
}

/// Why a requested gift was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GiftRejection {
    #[error("gift rule not found")]
    RuleNotFound,

    #[error("gift rule is not active right now")]
    NotActive,

    #[error("gift rule usage cap reached")]
    CapReached,

    #[error("cart does not satisfy the rule's conditions")]
    ConditionsNotMet,

    #[error("no gift products picked")]
    NothingPicked,

    #[error("product {product} is not offered by this rule")]
    OfferNotIncluded { product: ProductUuid },

    #[error("pick for {product} exceeds the cap of {cap} per order")]
    ExceedsOfferCap { product: ProductUuid, cap: Decimal },

    #[error("invalid gift quantity for {product}")]
    InvalidQuantity { product: ProductUuid },

    #[error("gift product {product} is out of stock")]
    OutOfStock { product: ProductUuid },
}
