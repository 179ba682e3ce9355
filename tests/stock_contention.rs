//! Contention tests for the optimistic store.
//!
//! Every test races real tasks on a multi-threaded runtime against one
//! shared store. Retries absorb commit conflicts, so losers fail with the
//! domain error a fresh look at the data produces, never a torn state.

use std::sync::Arc;

use rust_decimal_macros::dec;
use testresult::TestResult;

use tally::{
    context::CoreContext,
    fulfillment::{FulfillmentServiceError, data::CheckoutRequest, records::OrderStatus},
    ids::CustomerUuid,
    ledger::{
        LedgerServiceError,
        data::{NewProduct, ReserveRequest},
    },
    promotions::data::CartSnapshot,
    store::{RetryPolicy, Store},
};

/// Enough attempts that a commit conflict never surfaces as exhaustion.
fn patient_context() -> CoreContext {
    CoreContext::with_retry_policy(
        Store::new(),
        RetryPolicy {
            max_attempts: 50,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_reservations_admit_exactly_one_winner() -> TestResult {
    let ctx = patient_context();

    let product = ctx
        .ledger
        .create_product(NewProduct::piece("Standing Desk", dec!(450), dec!(10)))
        .await?;

    let first = {
        let ledger = Arc::clone(&ctx.ledger);
        tokio::spawn(async move { ledger.reserve(product.uuid, dec!(6), None).await })
    };
    let second = {
        let ledger = Arc::clone(&ctx.ledger);
        tokio::spawn(async move { ledger.reserve(product.uuid, dec!(7), None).await })
    };

    let first = first.await?;
    let second = second.await?;

    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one reservation may win: {first:?} / {second:?}"
    );

    let loser = if first.is_ok() { &second } else { &first };
    assert!(
        matches!(
            loser,
            Err(LedgerServiceError::InsufficientStock { .. })
        ),
        "the loser sees honest availability, got {loser:?}"
    );

    let winner_quantity = if first.is_ok() { dec!(6) } else { dec!(7) };
    let settled = ctx.ledger.get_product(product.uuid).await?;
    assert_eq!(settled.reserved(), winner_quantity);
    assert_eq!(settled.stock(), dec!(10));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_dozen_shoppers_cannot_oversell_ten_units() -> TestResult {
    let ctx = patient_context();

    let product = ctx
        .ledger
        .create_product(NewProduct::piece("Concert Ticket", dec!(55), dec!(10)))
        .await?;

    let mut handles = Vec::new();

    for _ in 0..12 {
        let ledger = Arc::clone(&ctx.ledger);
        handles.push(tokio::spawn(async move {
            ledger.reserve(product.uuid, dec!(1), None).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => wins += 1,
            Err(err) => assert!(
                matches!(err, LedgerServiceError::InsufficientStock { .. }),
                "unexpected failure: {err}"
            ),
        }
    }

    assert_eq!(wins, 10, "every unit sells once and none twice");

    let settled = ctx.ledger.get_product(product.uuid).await?;
    assert_eq!(settled.reserved(), dec!(10));
    assert_eq!(settled.available(), dec!(0));
    assert!(ctx.ledger.verify_all().await?.is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bulk_reservations_stay_all_or_nothing() -> TestResult {
    let ctx = patient_context();

    let chair = ctx
        .ledger
        .create_product(NewProduct::piece("Chair", dec!(120), dec!(5)))
        .await?;

    let lamp = ctx
        .ledger
        .create_product(NewProduct::piece("Lamp", dec!(35), dec!(5)))
        .await?;

    let bundle = vec![
        ReserveRequest {
            product_uuid: chair.uuid,
            quantity: dec!(3),
        },
        ReserveRequest {
            product_uuid: lamp.uuid,
            quantity: dec!(3),
        },
    ];

    let first = {
        let ledger = Arc::clone(&ctx.ledger);
        let bundle = bundle.clone();
        tokio::spawn(async move { ledger.reserve_all(bundle, None).await })
    };
    let second = {
        let ledger = Arc::clone(&ctx.ledger);
        let bundle = bundle.clone();
        tokio::spawn(async move { ledger.reserve_all(bundle, None).await })
    };

    let first = first.await?;
    let second = second.await?;

    // Five chairs cannot satisfy two bundles of three.
    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one bundle may win: {first:?} / {second:?}"
    );

    // The loser must not keep the lamp half of its bundle either.
    let chair_settled = ctx.ledger.get_product(chair.uuid).await?;
    assert_eq!(chair_settled.reserved(), dec!(3));

    let lamp_settled = ctx.ledger.get_product(lamp.uuid).await?;
    assert_eq!(lamp_settled.reserved(), dec!(3));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_commit_the_stock_once() -> TestResult {
    let ctx = patient_context();

    let product = ctx
        .ledger
        .create_product(NewProduct::piece("Headphones", dec!(90), dec!(10)))
        .await?;

    let order = ctx
        .fulfillment
        .create_order(
            CartSnapshot::new(CustomerUuid::generate()).with_line(product.uuid, dec!(4), dec!(90)),
            CheckoutRequest::new(),
        )
        .await?
        .order;

    let first = {
        let fulfillment = Arc::clone(&ctx.fulfillment);
        tokio::spawn(
            async move { fulfillment.transition_order(order.uuid, OrderStatus::Delivered).await },
        )
    };
    let second = {
        let fulfillment = Arc::clone(&ctx.fulfillment);
        tokio::spawn(
            async move { fulfillment.transition_order(order.uuid, OrderStatus::Delivered).await },
        )
    };

    let first = first.await?;
    let second = second.await?;

    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one delivery may land: {first:?} / {second:?}"
    );

    let loser = if first.is_ok() { &second } else { &first };
    assert!(
        matches!(
            loser,
            Err(FulfillmentServiceError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Delivered,
            })
        ),
        "the loser finds the order already delivered, got {loser:?}"
    );

    let settled = ctx.ledger.get_product(product.uuid).await?;
    assert_eq!(settled.stock(), dec!(6), "the sale must not apply twice");
    assert_eq!(settled.reserved(), dec!(0));
    assert_eq!(settled.total_sold(), dec!(4));
    assert!(ctx.ledger.verify_all().await?.is_empty());

    Ok(())
}
