//! Order records

use std::fmt;

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    ids::{CustomerUuid, TypedUuid},
    ledger::records::ProductUuid,
    promotions::records::GiftRuleUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Order item UUID
pub type OrderItemUuid = TypedUuid<OrderItemRecord>;

/// Order lifecycle. Terminal states accept no further transitions, repeats
/// of themselves included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Created, stock reserved, awaiting shipment.
    Processing,
    /// Left the warehouse; stock still reserved.
    Shipped,
    /// Reached the customer; reservations became sales.
    Delivered,
    /// Abandoned; reservations handed back.
    Cancelled,
}

impl OrderStatus {
    /// The state table. `Processing` may skip straight to `Delivered`;
    /// nothing leaves `Delivered` or `Cancelled`.
    #[must_use]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (
                OrderStatus::Processing,
                OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled
            ) | (
                OrderStatus::Shipped,
                OrderStatus::Delivered | OrderStatus::Cancelled
            )
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order and its lines. Status is the only field that changes after
/// checkout, and only through the fulfilment service.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    pub customer_uuid: CustomerUuid,
    pub status: OrderStatus,
    pub items: Vec<OrderItemRecord>,
    /// Sum of paid lines before any discount.
    pub subtotal: Decimal,
    /// What the voucher took off. Zero when no voucher applied.
    pub discount: Decimal,
    /// `subtotal - discount`.
    pub total: Decimal,
    /// Code of the voucher redeemed on this order, if any.
    pub voucher_code: Option<String>,
    /// Gift rule granted on this order, if any.
    pub gift_rule_uuid: Option<GiftRuleUuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One order line. Gift lines are priced at zero with the list price kept in
/// `original_price`.
#[derive(Debug, Clone)]
pub struct OrderItemRecord {
    pub uuid: OrderItemUuid,
    pub product_uuid: ProductUuid,
    pub quantity: Decimal,
    /// Price charged per unit. Zero for gift lines.
    pub price: Decimal,
    /// List price per unit at checkout time.
    pub original_price: Decimal,
    pub is_gift: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_table_is_exhaustive() {
        use OrderStatus::{Cancelled, Delivered, Processing, Shipped};

        let all = [Processing, Shipped, Delivered, Cancelled];

        let allowed = [
            (Processing, Shipped),
            (Processing, Delivered),
            (Processing, Cancelled),
            (Shipped, Delivered),
            (Shipped, Cancelled),
        ];

        for from in all {
            for to in all {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_allow_nothing_out() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());

        // A repeated delivery is a transition out of a terminal state.
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Delivered));
    }
}
