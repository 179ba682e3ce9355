//! Promotion definitions
//!
//! Gift rules and vouchers can be authored in YAML and imported in bulk.
//! Definitions reference products and categories by string key; a
//! [`DefinitionContext`] maps those keys onto the identifiers the engine
//! works with, so the same definition file can seed any catalogue.

use std::{fs, path::Path};

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    ids::CategoryUuid,
    ledger::records::ProductUuid,
    promotions::{
        data::{NewGiftRule, NewVoucher},
        errors::InvalidPromotion,
        records::{
            ConditionLogic, DiscountKind, GiftCondition, GiftOffer, GiftRuleUuid, VoucherUuid,
        },
    },
};

/// Definition parsing and resolution errors
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// IO error reading a definition file
    #[error("failed to read definition file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A condition or offer referenced a product key the context does not know
    #[error("unknown product key: {0}")]
    UnknownProduct(String),

    /// A condition referenced a category key the context does not know
    #[error("unknown category key: {0}")]
    UnknownCategory(String),

    /// Two vouchers in the same set share a code
    #[error("duplicate voucher code in set: {0}")]
    DuplicateCode(String),

    /// A definition resolved but failed domain validation
    #[error("invalid definition {name}: {source}")]
    Invalid {
        name: String,
        source: InvalidPromotion,
    },
}

/// Maps the string keys used in definition files onto catalogue identifiers.
#[derive(Debug, Default)]
pub struct DefinitionContext {
    products: FxHashMap<String, ProductUuid>,
    categories: FxHashMap<String, CategoryUuid>,
}

impl DefinitionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_product(mut self, key: &str, uuid: ProductUuid) -> Self {
        self.products.insert(key.to_owned(), uuid);

        self
    }

    #[must_use]
    pub fn with_category(mut self, key: &str, uuid: CategoryUuid) -> Self {
        self.categories.insert(key.to_owned(), uuid);

        self
    }

    fn product(&self, key: &str) -> Result<ProductUuid, DefinitionError> {
        self.products
            .get(key)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownProduct(key.to_owned()))
    }

    fn category(&self, key: &str) -> Result<CategoryUuid, DefinitionError> {
        self.categories
            .get(key)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownCategory(key.to_owned()))
    }
}

/// A resolved definition file, ready to hand to the promotion engine.
#[derive(Debug, Default)]
pub struct PromotionSet {
    pub gift_rules: Vec<NewGiftRule>,
    pub vouchers: Vec<NewVoucher>,
}

/// Wrapper for a promotion set in YAML
#[derive(Debug, Deserialize)]
pub struct PromotionSetDefinition {
    /// Map of rule key -> gift rule definition
    #[serde(default)]
    pub gift_rules: FxHashMap<String, GiftRuleDefinition>,

    /// Voucher definitions, keyed by their own codes
    #[serde(default)]
    pub vouchers: Vec<VoucherDefinition>,
}

/// Gift rule definition from YAML
#[derive(Debug, Deserialize)]
pub struct GiftRuleDefinition {
    /// Display name
    pub name: String,

    /// Higher priority is presented first
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_active")]
    pub active: bool,

    /// How conditions combine; defaults to `and`
    #[serde(default)]
    pub logic: ConditionLogicDefinition,

    pub conditions: Vec<GiftConditionDefinition>,

    pub offers: Vec<GiftOfferDefinition>,

    #[serde(default)]
    pub valid_from: Option<Timestamp>,

    #[serde(default)]
    pub valid_until: Option<Timestamp>,

    #[serde(default)]
    pub max_total_uses: Option<u64>,

    #[serde(default)]
    pub max_uses_per_customer: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogicDefinition {
    #[default]
    And,
    Or,
}

impl From<ConditionLogicDefinition> for ConditionLogic {
    fn from(logic: ConditionLogicDefinition) -> Self {
        match logic {
            ConditionLogicDefinition::And => ConditionLogic::And,
            ConditionLogicDefinition::Or => ConditionLogic::Or,
        }
    }
}

/// Gift condition from YAML, with products and categories as string keys
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GiftConditionDefinition {
    /// Cart subtotal at or above an amount
    CartMinAmount { amount: Decimal },

    /// A given product present at or above a quantity
    ProductInCart {
        product: String,

        #[serde(default = "default_min_quantity")]
        min_quantity: Decimal,
    },

    /// Spend within a category at or above an amount
    CategoryMinAmount { category: String, amount: Decimal },
}

impl GiftConditionDefinition {
    fn resolve(self, ctx: &DefinitionContext) -> Result<GiftCondition, DefinitionError> {
        match self {
            Self::CartMinAmount { amount } => Ok(GiftCondition::CartMinAmount { amount }),
            Self::ProductInCart {
                product,
                min_quantity,
            } => Ok(GiftCondition::ProductInCart {
                product_uuid: ctx.product(&product)?,
                min_quantity,
            }),
            Self::CategoryMinAmount { category, amount } => Ok(GiftCondition::CategoryMinAmount {
                category_uuid: ctx.category(&category)?,
                amount,
            }),
        }
    }
}

/// Gift offer from YAML
#[derive(Debug, Deserialize)]
pub struct GiftOfferDefinition {
    pub product: String,

    /// Most units of this gift one order may take; defaults to one
    #[serde(default = "default_offer_cap")]
    pub max_per_order: Decimal,
}

/// Voucher definition from YAML
#[derive(Debug, Deserialize)]
pub struct VoucherDefinition {
    pub code: String,

    pub discount: DiscountDefinition,

    #[serde(default)]
    pub min_purchase: Decimal,

    #[serde(default)]
    pub max_usage: Option<u64>,

    #[serde(default)]
    pub valid_until: Option<Timestamp>,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Discount from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountDefinition {
    /// Percentage of the subtotal, optionally capped
    Percentage {
        value: Decimal,

        #[serde(default)]
        max_discount: Option<Decimal>,
    },

    /// Flat amount off
    Fixed { value: Decimal },
}

impl From<DiscountDefinition> for DiscountKind {
    fn from(discount: DiscountDefinition) -> Self {
        match discount {
            DiscountDefinition::Percentage {
                value,
                max_discount,
            } => DiscountKind::Percentage {
                value,
                max_discount,
            },
            DiscountDefinition::Fixed { value } => DiscountKind::Fixed { value },
        }
    }
}

fn default_active() -> bool {
    true
}

fn default_min_quantity() -> Decimal {
    Decimal::ONE
}

fn default_offer_cap() -> Decimal {
    Decimal::ONE
}

impl GiftRuleDefinition {
    fn resolve(self, key: &str, ctx: &DefinitionContext) -> Result<NewGiftRule, DefinitionError> {
        let conditions = self
            .conditions
            .into_iter()
            .map(|condition| condition.resolve(ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let offers = self
            .offers
            .into_iter()
            .map(|offer| {
                Ok(GiftOffer {
                    product_uuid: ctx.product(&offer.product)?,
                    max_per_order: offer.max_per_order,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        let rule = NewGiftRule {
            uuid: GiftRuleUuid::generate(),
            name: self.name,
            priority: self.priority,
            is_active: self.active,
            condition_logic: self.logic.into(),
            conditions,
            offers,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            max_total_uses: self.max_total_uses,
            max_uses_per_customer: self.max_uses_per_customer,
        };

        rule.validate().map_err(|source| DefinitionError::Invalid {
            name: key.to_owned(),
            source,
        })?;

        Ok(rule)
    }
}

impl VoucherDefinition {
    fn resolve(self) -> Result<NewVoucher, DefinitionError> {
        let voucher = NewVoucher {
            uuid: VoucherUuid::generate(),
            code: self.code,
            discount: self.discount.into(),
            min_purchase: self.min_purchase,
            max_usage: self.max_usage,
            valid_until: self.valid_until,
            is_active: self.active,
        };

        voucher
            .validate()
            .map_err(|source| DefinitionError::Invalid {
                name: voucher.code.clone(),
                source,
            })?;

        Ok(voucher)
    }
}

/// Parse a promotion set from YAML and resolve it against the context.
///
/// # Errors
///
/// Returns an error on malformed YAML, unknown product or category keys,
/// duplicate voucher codes within the set, or definitions that fail domain
/// validation.
pub fn parse_promotion_set(
    contents: &str,
    ctx: &DefinitionContext,
) -> Result<PromotionSet, DefinitionError> {
    let definition: PromotionSetDefinition = serde_norway::from_str(contents)?;

    let mut set = PromotionSet::default();

    for (key, rule) in definition.gift_rules {
        set.gift_rules.push(rule.resolve(&key, ctx)?);
    }

    let mut seen_codes = FxHashSet::default();

    for voucher in definition.vouchers {
        if !seen_codes.insert(voucher.code.clone()) {
            return Err(DefinitionError::DuplicateCode(voucher.code));
        }

        set.vouchers.push(voucher.resolve()?);
    }

    Ok(set)
}

/// Read a promotion set from a YAML file and resolve it against the context.
///
/// # Errors
///
/// Returns an error if the file cannot be read, plus everything
/// [`parse_promotion_set`] rejects.
pub fn load_promotion_set(
    path: impl AsRef<Path>,
    ctx: &DefinitionContext,
) -> Result<PromotionSet, DefinitionError> {
    let contents = fs::read_to_string(path)?;

    parse_promotion_set(&contents, ctx)
}
