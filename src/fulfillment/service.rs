//! Order fulfilment service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tracing::{Span, info};

use crate::{
    fulfillment::{
        data::{CheckoutOutcome, CheckoutRequest, GiftSelection},
        errors::FulfillmentServiceError,
        records::{OrderItemRecord, OrderItemUuid, OrderRecord, OrderStatus, OrderUuid},
        repository::OrdersRepository,
    },
    ledger::{records::ProductUuid, repository::StockRepository},
    promotions::{
        data::CartSnapshot,
        errors::GiftRejection,
        eval,
        models::PromotionRejection,
        repository::PromotionsRepository,
    },
    store::{RetryPolicy, Store, Tx, with_retry},
};

/// Store-backed implementation of [`FulfillmentService`].
#[derive(Debug, Clone)]
pub struct OrderFulfillment {
    store: Store,
    retry: RetryPolicy,
    orders: OrdersRepository,
    stock: StockRepository,
    promotions: PromotionsRepository,
}

impl OrderFulfillment {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            orders: OrdersRepository::new(),
            stock: StockRepository::new(),
            promotions: PromotionsRepository::new(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One checkout attempt inside one transaction. Reserves every paid
    /// line, then re-validates the requested promotions against live rows;
    /// browse-time eligibility may have gone stale. A failed line aborts
    /// the order, a failed promotion only costs the shopper the promotion.
    fn checkout(
        &self,
        tx: &mut Tx,
        order_uuid: OrderUuid,
        cart: &CartSnapshot,
        request: &CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutOutcome, FulfillmentServiceError> {
        if cart.lines.is_empty() {
            return Err(FulfillmentServiceError::EmptyCart);
        }

        let mut items = Vec::with_capacity(cart.lines.len());

        for line in &cart.lines {
            self.stock
                .reserve(tx, line.product_uuid, line.quantity, Some(order_uuid), now)?;

            items.push(OrderItemRecord {
                uuid: OrderItemUuid::generate(),
                product_uuid: line.product_uuid,
                quantity: line.quantity,
                price: line.unit_price,
                original_price: line.unit_price,
                is_gift: false,
            });
        }

        let subtotal = cart.subtotal();
        let mut rejections = Vec::new();

        let mut discount = Decimal::ZERO;
        let mut voucher_code = None;

        if let Some(code) = &request.voucher_code {
            match self.promotions.redeem_voucher(tx, code, subtotal, now) {
                Ok(redeemed) => {
                    discount = redeemed.amount;
                    voucher_code = Some(redeemed.code);
                }
                Err(reason) => rejections.push(PromotionRejection::Voucher {
                    code: code.clone(),
                    reason,
                }),
            }
        }

        let mut gift_rule_uuid = None;

        if let Some(selection) = &request.gift {
            match self.grant_gift(tx, order_uuid, cart, selection, now) {
                Ok(gift_items) => {
                    gift_rule_uuid = Some(selection.rule_uuid);
                    items.extend(gift_items);
                }
                Err(reason) => rejections.push(PromotionRejection::Gift {
                    rule: selection.rule_uuid,
                    reason,
                }),
            }
        }

        let total = subtotal - discount;

        let order = OrderRecord {
            uuid: order_uuid,
            customer_uuid: cart.customer,
            status: OrderStatus::Processing,
            items,
            subtotal,
            discount,
            total,
            voucher_code,
            gift_rule_uuid,
            created_at: now,
            updated_at: now,
        };

        self.orders.insert(tx, order.clone());

        Ok(CheckoutOutcome { order, rejections })
    }

    /// Validates the whole gift selection before touching anything, so a
    /// rejected selection leaves no reservation behind. The writes that
    /// follow re-run checks this method has already passed against the same
    /// transaction view.
    fn grant_gift(
        &self,
        tx: &mut Tx,
        order_uuid: OrderUuid,
        cart: &CartSnapshot,
        selection: &GiftSelection,
        now: Timestamp,
    ) -> Result<Vec<OrderItemRecord>, GiftRejection> {
        let rule = tx
            .gift_rule(selection.rule_uuid)
            .ok_or(GiftRejection::RuleNotFound)?;

        let customer_uses = tx.gift_grant_count(rule.uuid, cart.customer);
        eval::rule_usable(&rule, customer_uses, now)?;

        let mut category_of = FxHashMap::default();

        for line in &cart.lines {
            if let Some(record) = tx.product(line.product_uuid) {
                category_of.insert(line.product_uuid, record.category);
            }
        }

        let totals = eval::CartTotals::compute(cart, &category_of);

        if !eval::conditions_met(rule.condition_logic, &rule.conditions, &totals) {
            return Err(GiftRejection::ConditionsNotMet);
        }

        if selection.picks.is_empty() {
            return Err(GiftRejection::NothingPicked);
        }

        // Duplicate picks of one product merge, so the offer cap applies to
        // the combined quantity.
        let mut merged: Vec<(ProductUuid, Decimal)> = Vec::new();

        for pick in &selection.picks {
            if let Some(entry) = merged
                .iter_mut()
                .find(|(product, _)| *product == pick.product_uuid)
            {
                entry.1 += pick.quantity;
            } else {
                merged.push((pick.product_uuid, pick.quantity));
            }
        }

        let mut validated = Vec::with_capacity(merged.len());

        for (product_uuid, quantity) in merged {
            let offer = rule
                .offers
                .iter()
                .find(|offer| offer.product_uuid == product_uuid)
                .ok_or(GiftRejection::OfferNotIncluded {
                    product: product_uuid,
                })?;

            if quantity > offer.max_per_order {
                return Err(GiftRejection::ExceedsOfferCap {
                    product: product_uuid,
                    cap: offer.max_per_order,
                });
            }

            let product = tx.product(product_uuid).ok_or(GiftRejection::OutOfStock {
                product: product_uuid,
            })?;

            product
                .policy
                .validate(quantity)
                .map_err(|_err| GiftRejection::InvalidQuantity {
                    product: product_uuid,
                })?;

            // Availability as this transaction sees it, paid-line
            // reservations included.
            if product.track_inventory && product.available() < quantity {
                return Err(GiftRejection::OutOfStock {
                    product: product_uuid,
                });
            }

            validated.push((product_uuid, quantity, product.price));
        }

        let mut gift_items = Vec::with_capacity(validated.len());

        for (product_uuid, quantity, original_price) in validated {
            self.stock
                .reserve(tx, product_uuid, quantity, Some(order_uuid), now)
                .map_err(|_err| GiftRejection::OutOfStock {
                    product: product_uuid,
                })?;

            gift_items.push(OrderItemRecord {
                uuid: OrderItemUuid::generate(),
                product_uuid,
                quantity,
                price: Decimal::ZERO,
                original_price,
                is_gift: true,
            });
        }

        self.promotions.consume_grant(tx, rule, cart.customer, now);

        Ok(gift_items)
    }

    fn transition(
        &self,
        tx: &mut Tx,
        order_uuid: OrderUuid,
        next: OrderStatus,
        now: Timestamp,
    ) -> Result<OrderRecord, FulfillmentServiceError> {
        let order = self.orders.get(tx, order_uuid)?;

        if !order.status.can_transition_to(next) {
            return Err(FulfillmentServiceError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        match next {
            OrderStatus::Delivered => {
                for item in &order.items {
                    self.stock.commit_reserved(
                        tx,
                        item.product_uuid,
                        item.quantity,
                        Some(order_uuid),
                        now,
                    )?;
                }
            }
            OrderStatus::Cancelled => {
                // Gift reservations come back like any other line; consumed
                // gift grants are not refunded.
                for item in &order.items {
                    self.stock
                        .release(tx, item.product_uuid, item.quantity, Some(order_uuid), now)?;
                }
            }
            OrderStatus::Processing | OrderStatus::Shipped => {}
        }

        Ok(self.orders.set_status(tx, order, next, now))
    }
}

#[async_trait]
impl FulfillmentService for OrderFulfillment {
    #[tracing::instrument(
        name = "fulfillment.service.create_order",
        skip(self, cart, request),
        fields(
            customer_uuid = %cart.customer,
            line_count = cart.lines.len(),
            order_uuid = tracing::field::Empty,
            rejection_count = tracing::field::Empty,
        ),
        err
    )]
    async fn create_order(
        &self,
        cart: CartSnapshot,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, FulfillmentServiceError> {
        // One identity across commit retries.
        let order_uuid = OrderUuid::generate();

        let outcome = with_retry(
            &self.store,
            &self.retry,
            || FulfillmentServiceError::ConcurrentModification,
            |tx| self.checkout(tx, order_uuid, &cart, &request, Timestamp::now()),
        )
        .await?;

        let span = Span::current();

        span.record("order_uuid", tracing::field::display(order_uuid));
        span.record("rejection_count", outcome.rejections.len());

        info!(
            order_uuid = %order_uuid,
            total = %outcome.order.total,
            rejection_count = outcome.rejections.len(),
            "created order"
        );

        Ok(outcome)
    }

    #[tracing::instrument(
        name = "fulfillment.service.transition_order",
        skip(self),
        fields(order_uuid = %order, to = %next),
        err
    )]
    async fn transition_order(
        &self,
        order: OrderUuid,
        next: OrderStatus,
    ) -> Result<OrderRecord, FulfillmentServiceError> {
        let updated = with_retry(
            &self.store,
            &self.retry,
            || FulfillmentServiceError::ConcurrentModification,
            |tx| self.transition(tx, order, next, Timestamp::now()),
        )
        .await?;

        info!(order_uuid = %order, status = %updated.status, "transitioned order");

        Ok(updated)
    }

    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, FulfillmentServiceError> {
        let mut tx = self.store.begin();
        self.orders.get(&mut tx, order)
    }
}

#[automock]
#[async_trait]
pub trait FulfillmentService: Send + Sync {
    /// Creates an order from a cart in one transaction: reserves every paid
    /// line, redeems the requested voucher, grants the requested gift, and
    /// persists the order in `Processing`. Failed promotions are reported in
    /// the outcome instead of failing the order.
    async fn create_order(
        &self,
        cart: CartSnapshot,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, FulfillmentServiceError>;

    /// Moves an order through its lifecycle. Delivery turns reservations
    /// into sales, cancellation hands them back; either way the status
    /// write and the stock effects commit together.
    async fn transition_order(
        &self,
        order: OrderUuid,
        next: OrderStatus,
    ) -> Result<OrderRecord, FulfillmentServiceError>;

    /// Retrieves a single order.
    async fn get_order(&self, order: OrderUuid) -> Result<OrderRecord, FulfillmentServiceError>;
}
