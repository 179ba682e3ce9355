//! End-to-end checkout flows through the public context.
//!
//! Exercises the full life of stock: seeded on product creation, reserved at
//! checkout, released on cancellation, committed on delivery, with the
//! movement log and integrity checks agreeing at every step.

use rust_decimal_macros::dec;
use testresult::TestResult;

use tally::{
    context::CoreContext,
    fulfillment::{
        FulfillmentServiceError,
        data::{CheckoutRequest, GiftSelection},
        records::OrderStatus,
    },
    ids::{CategoryUuid, CustomerUuid},
    ledger::{LedgerServiceError, data::NewProduct, records::MovementKind},
    promotions::{
        data::CartSnapshot,
        definitions::{DefinitionContext, load_promotion_set, parse_promotion_set},
    },
};

#[tokio::test]
async fn contended_stock_settles_through_cancellation_and_delivery() -> TestResult {
    let ctx = CoreContext::new();

    let machine = ctx
        .ledger
        .create_product(NewProduct::piece("Espresso Machine", dec!(320), dec!(10)))
        .await?;

    let alice = CustomerUuid::generate();
    let bob = CustomerUuid::generate();

    // Alice takes four, leaving six on the shelf.
    let alice_order = ctx
        .fulfillment
        .create_order(
            CartSnapshot::new(alice).with_line(machine.uuid, dec!(4), dec!(320)),
            CheckoutRequest::new(),
        )
        .await?
        .order;

    let snapshot = ctx.ledger.get_product(machine.uuid).await?;
    assert_eq!(snapshot.available(), dec!(6));
    assert_eq!(snapshot.stock(), dec!(10));

    // Bob wants seven; the six available are not enough.
    let refused = ctx
        .fulfillment
        .create_order(
            CartSnapshot::new(bob).with_line(machine.uuid, dec!(7), dec!(320)),
            CheckoutRequest::new(),
        )
        .await;

    assert!(matches!(
        refused,
        Err(FulfillmentServiceError::Ledger(
            LedgerServiceError::InsufficientStock {
                requested,
                available,
            }
        )) if requested == dec!(7) && available == dec!(6)
    ));

    // Alice cancels and her four come back.
    ctx.fulfillment
        .transition_order(alice_order.uuid, OrderStatus::Cancelled)
        .await?;

    let snapshot = ctx.ledger.get_product(machine.uuid).await?;
    assert_eq!(snapshot.available(), dec!(10));

    // Bob retries and this time it goes through, all the way to delivery.
    let bob_order = ctx
        .fulfillment
        .create_order(
            CartSnapshot::new(bob).with_line(machine.uuid, dec!(7), dec!(320)),
            CheckoutRequest::new(),
        )
        .await?
        .order;

    ctx.fulfillment
        .transition_order(bob_order.uuid, OrderStatus::Shipped)
        .await?;
    ctx.fulfillment
        .transition_order(bob_order.uuid, OrderStatus::Delivered)
        .await?;

    let settled = ctx.ledger.get_product(machine.uuid).await?;
    assert_eq!(settled.stock(), dec!(3));
    assert_eq!(settled.reserved(), dec!(0));
    assert_eq!(settled.total_sold(), dec!(7));

    // The movement log tells the whole story, oldest first.
    let kinds: Vec<MovementKind> = ctx
        .ledger
        .list_movements(machine.uuid)
        .await?
        .into_iter()
        .map(|movement| movement.kind)
        .collect();

    assert_eq!(
        kinds,
        vec![
            MovementKind::In,
            MovementKind::Reserve,
            MovementKind::Release,
            MovementKind::Reserve,
            MovementKind::Out,
        ]
    );

    assert!(
        ctx.ledger.verify_all().await?.is_empty(),
        "counters and movements must reconcile"
    );

    Ok(())
}

const LAUNCH_PROMOTIONS: &str = r"
gift_rules:
  spend-100-tote:
    name: Spend 100, tote on us
    conditions:
      - type: cart_min_amount
        amount: 100
    offers:
      - product: canvas-tote
        max_per_order: 1

vouchers:
  - code: WELCOME10
    discount:
      type: percentage
      value: 10
      max_discount: 20
";

#[tokio::test]
async fn promotions_flow_from_definitions_to_delivery() -> TestResult {
    let ctx = CoreContext::new();

    let beans = ctx
        .ledger
        .create_product(NewProduct::piece("Espresso Beans", dec!(18), dec!(40)))
        .await?;

    let tote = ctx
        .ledger
        .create_product(NewProduct::piece("Canvas Tote", dec!(12), dec!(5)))
        .await?;

    let definitions =
        DefinitionContext::new().with_product("canvas-tote", tote.uuid);
    let set = parse_promotion_set(LAUNCH_PROMOTIONS, &definitions)?;
    ctx.promotions.import_promotion_set(set).await?;

    // Browsing: the qualifying cart sees the gift with live availability.
    let customer = CustomerUuid::generate();
    let cart = CartSnapshot::new(customer).with_line(beans.uuid, dec!(6), dec!(18));

    let eligible = ctx.promotions.evaluate_gifts(cart.clone()).await?;
    let rule = eligible.first().ok_or("no eligible gift rule")?;
    assert_eq!(rule.name, "Spend 100, tote on us");

    let offer = rule.offers.first().ok_or("rule lists no offers")?;
    assert_eq!(offer.product_uuid, tote.uuid);
    assert_eq!(offer.available, Some(dec!(5)));

    // And the voucher prices without being consumed.
    let quote = ctx
        .promotions
        .validate_voucher("WELCOME10", cart.subtotal())
        .await?;
    assert_eq!(quote.amount, dec!(10.80));

    // Checkout books both for real.
    let outcome = ctx
        .fulfillment
        .create_order(
            cart,
            CheckoutRequest::new()
                .with_voucher("WELCOME10")
                .with_gift(GiftSelection::new(rule.rule_uuid).with_pick(tote.uuid, dec!(1))),
        )
        .await?;

    assert!(outcome.rejections.is_empty(), "{:?}", outcome.rejections);
    assert_eq!(outcome.order.subtotal, dec!(108));
    assert_eq!(outcome.order.discount, dec!(10.80));
    assert_eq!(outcome.order.total, dec!(97.20));

    let gift_line = outcome
        .order
        .items
        .iter()
        .find(|item| item.is_gift)
        .ok_or("no gift line on the order")?;
    assert_eq!(gift_line.price, dec!(0));
    assert_eq!(gift_line.original_price, dec!(12));

    ctx.fulfillment
        .transition_order(outcome.order.uuid, OrderStatus::Delivered)
        .await?;

    let beans_settled = ctx.ledger.get_product(beans.uuid).await?;
    assert_eq!(beans_settled.stock(), dec!(34));
    assert_eq!(beans_settled.total_sold(), dec!(6));

    let tote_settled = ctx.ledger.get_product(tote.uuid).await?;
    assert_eq!(tote_settled.stock(), dec!(4));
    assert_eq!(tote_settled.total_sold(), dec!(1));

    let voucher = ctx
        .promotions
        .validate_voucher("WELCOME10", dec!(200))
        .await?;
    assert_eq!(
        voucher.amount,
        dec!(20),
        "the cap keeps large carts at twenty"
    );

    assert!(ctx.ledger.verify_all().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn the_launch_fixture_imports_and_redeems() -> TestResult {
    let ctx = CoreContext::new();

    let coffee = CategoryUuid::generate();

    let beans = ctx
        .ledger
        .create_product(NewProduct::piece("Espresso Beans", dec!(18), dec!(40)))
        .await?;

    let tote = ctx
        .ledger
        .create_product(NewProduct::piece("Canvas Tote", dec!(12), dec!(5)))
        .await?;

    let mug = ctx
        .ledger
        .create_product(NewProduct::piece("Enamel Mug", dec!(9), dec!(12)))
        .await?;

    let definitions = DefinitionContext::new()
        .with_product("canvas-tote", tote.uuid)
        .with_product("espresso-beans", beans.uuid)
        .with_product("enamel-mug", mug.uuid)
        .with_category("coffee", coffee);

    let set = load_promotion_set("fixtures/promotions/launch.yml", &definitions)?;
    assert_eq!(set.gift_rules.len(), 2);
    assert_eq!(set.vouchers.len(), 2);

    ctx.promotions.import_promotion_set(set).await?;

    let shipping = ctx.promotions.validate_voucher("FREESHIP5", dec!(30)).await?;
    assert_eq!(shipping.amount, dec!(5));

    // Three bags of beans trip the or-rule through its product leg.
    let cart = CartSnapshot::new(CustomerUuid::generate()).with_line(
        beans.uuid,
        dec!(3),
        dec!(18),
    );

    let eligible = ctx.promotions.evaluate_gifts(cart).await?;
    assert_eq!(eligible.len(), 1);
    assert_eq!(
        eligible.first().map(|rule| rule.name.as_str()),
        Some("Mug for coffee lovers")
    );

    Ok(())
}

#[tokio::test]
async fn rejected_promotions_never_block_an_order() -> TestResult {
    let ctx = CoreContext::new();

    let beans = ctx
        .ledger
        .create_product(NewProduct::piece("Espresso Beans", dec!(18), dec!(40)))
        .await?;

    let cart =
        CartSnapshot::new(CustomerUuid::generate()).with_line(beans.uuid, dec!(1), dec!(18));

    let outcome = ctx
        .fulfillment
        .create_order(cart, CheckoutRequest::new().with_voucher("NO-SUCH-CODE"))
        .await?;

    assert_eq!(outcome.order.status, OrderStatus::Processing);
    assert_eq!(outcome.order.total, dec!(18));
    assert_eq!(outcome.rejections.len(), 1);

    Ok(())
}
