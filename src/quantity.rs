//! Purchasable-quantity policy
//!
//! Products sold by weight, volume or length accept fractional quantities on
//! a step grid anchored at a minimum; everything else is whole units. The
//! policy travels with the product record and is enforced on every
//! reservation, sale and cart line.

use rust_decimal::Decimal;
use thiserror::Error;

/// How a product may be quantified in carts and reservations.
///
/// `min_quantity` is the smallest purchasable amount and `quantity_step` the
/// grid spacing above it, so valid quantities are `min + n * step` for whole
/// `n >= 0`. When `allow_fractional` is false the grid must itself be whole
/// and only whole quantities pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityPolicy {
    pub allow_fractional: bool,
    pub min_quantity: Decimal,
    pub quantity_step: Decimal,
}

impl QuantityPolicy {
    /// Whole units, minimum one. The policy for ordinary piece goods.
    #[must_use]
    pub const fn whole_units() -> Self {
        Self {
            allow_fractional: false,
            min_quantity: Decimal::ONE,
            quantity_step: Decimal::ONE,
        }
    }

    /// Fractional quantities from `min_quantity` in steps of `quantity_step`.
    #[must_use]
    pub const fn fractional(min_quantity: Decimal, quantity_step: Decimal) -> Self {
        Self {
            allow_fractional: true,
            min_quantity,
            quantity_step,
        }
    }

    /// Checks that the policy itself is well formed.
    ///
    /// # Errors
    ///
    /// Returns an error when the minimum or step is not positive, or when a
    /// whole-unit policy carries a fractional grid.
    pub fn check(&self) -> Result<(), QuantityError> {
        if self.min_quantity <= Decimal::ZERO {
            return Err(QuantityError::InvalidMinimum {
                min: self.min_quantity,
            });
        }

        if self.quantity_step <= Decimal::ZERO {
            return Err(QuantityError::InvalidStep {
                step: self.quantity_step,
            });
        }

        if !self.allow_fractional
            && !(self.min_quantity.is_integer() && self.quantity_step.is_integer())
        {
            return Err(QuantityError::FractionalGrid {
                min: self.min_quantity,
                step: self.quantity_step,
            });
        }

        Ok(())
    }

    /// Validates a requested quantity against the policy.
    ///
    /// # Errors
    ///
    /// Returns an error when the quantity is not positive, fractional on a
    /// whole-unit policy, below the minimum, or off the step grid.
    pub fn validate(&self, quantity: Decimal) -> Result<(), QuantityError> {
        if quantity <= Decimal::ZERO {
            return Err(QuantityError::NotPositive { quantity });
        }

        if !self.allow_fractional && !quantity.is_integer() {
            return Err(QuantityError::NotWhole { quantity });
        }

        if quantity < self.min_quantity {
            return Err(QuantityError::BelowMinimum {
                quantity,
                min: self.min_quantity,
            });
        }

        if !((quantity - self.min_quantity) % self.quantity_step).is_zero() {
            return Err(QuantityError::OffStep {
                quantity,
                min: self.min_quantity,
                step: self.quantity_step,
            });
        }

        Ok(())
    }
}

impl Default for QuantityPolicy {
    fn default() -> Self {
        Self::whole_units()
    }
}

/// Rejection reasons for quantities and malformed policies.
#[derive(Debug, Error)]
pub enum QuantityError {
    #[error("quantity {quantity} must be positive")]
    NotPositive { quantity: Decimal },

    #[error("quantity {quantity} must not be negative")]
    Negative { quantity: Decimal },

    #[error("quantity {quantity} must be a whole number of units")]
    NotWhole { quantity: Decimal },

    #[error("quantity {quantity} is below the minimum of {min}")]
    BelowMinimum { quantity: Decimal, min: Decimal },

    #[error("quantity {quantity} is not {min} plus a multiple of {step}")]
    OffStep {
        quantity: Decimal,
        min: Decimal,
        step: Decimal,
    },

    #[error("minimum quantity {min} must be positive")]
    InvalidMinimum { min: Decimal },

    #[error("quantity step {step} must be positive")]
    InvalidStep { step: Decimal },

    #[error("whole-unit grids need a whole minimum and step, got {min} / {step}")]
    FractionalGrid { min: Decimal, step: Decimal },
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{QuantityError, QuantityPolicy};

    #[test]
    fn whole_units_accept_whole_quantities() {
        let policy = QuantityPolicy::whole_units();

        assert!(policy.validate(dec!(1)).is_ok());
        assert!(policy.validate(dec!(7)).is_ok());
    }

    #[test]
    fn whole_units_reject_fractions_and_non_positive() {
        let policy = QuantityPolicy::whole_units();

        let fractional = policy.validate(dec!(1.5));
        assert!(
            matches!(fractional, Err(QuantityError::NotWhole { .. })),
            "expected NotWhole, got {fractional:?}"
        );

        let zero = policy.validate(dec!(0));
        assert!(
            matches!(zero, Err(QuantityError::NotPositive { .. })),
            "expected NotPositive, got {zero:?}"
        );

        let negative = policy.validate(dec!(-2));
        assert!(
            matches!(negative, Err(QuantityError::NotPositive { .. })),
            "expected NotPositive, got {negative:?}"
        );
    }

    #[test]
    fn fractional_grid_is_anchored_at_the_minimum() {
        let policy = QuantityPolicy::fractional(dec!(0.5), dec!(0.25));

        assert!(policy.validate(dec!(0.5)).is_ok());
        assert!(policy.validate(dec!(0.75)).is_ok());
        assert!(policy.validate(dec!(2)).is_ok());

        let below = policy.validate(dec!(0.25));
        assert!(
            matches!(below, Err(QuantityError::BelowMinimum { .. })),
            "expected BelowMinimum, got {below:?}"
        );

        let off_step = policy.validate(dec!(0.6));
        assert!(
            matches!(off_step, Err(QuantityError::OffStep { .. })),
            "expected OffStep, got {off_step:?}"
        );
    }

    #[test]
    fn step_comparison_ignores_trailing_zeroes() {
        let policy = QuantityPolicy::fractional(dec!(0.50), dec!(0.25));

        assert!(policy.validate(dec!(1.250)).is_ok());
    }

    #[test]
    fn malformed_policies_are_rejected() {
        let zero_step = QuantityPolicy::fractional(dec!(0.5), dec!(0)).check();
        assert!(
            matches!(zero_step, Err(QuantityError::InvalidStep { .. })),
            "expected InvalidStep, got {zero_step:?}"
        );

        let negative_min = QuantityPolicy::fractional(dec!(-1), dec!(0.5)).check();
        assert!(
            matches!(negative_min, Err(QuantityError::InvalidMinimum { .. })),
            "expected InvalidMinimum, got {negative_min:?}"
        );

        let fractional_grid = QuantityPolicy {
            allow_fractional: false,
            min_quantity: dec!(0.5),
            quantity_step: dec!(1),
        }
        .check();
        assert!(
            matches!(fractional_grid, Err(QuantityError::FractionalGrid { .. })),
            "expected FractionalGrid, got {fractional_grid:?}"
        );
    }
}
