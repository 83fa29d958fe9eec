//! Payment webhook handling: order placement, redelivery, failures.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chat_checkout_bot::commerce::OrderCustomer;
use chat_checkout_bot::finalizer::FinalizeOutcome;
use chat_checkout_bot::session::Step;
use chat_checkout_core::{CustomerId, Money, OrderName, PaymentReference};
use chat_checkout_integration_tests::{BUYER, TestApp, button, checkout_to_discount_offer};

/// A buyer with a payment link out for ₹200.
async fn awaiting_payment() -> TestApp {
    let app = TestApp::new();
    app.send_all(BUYER, checkout_to_discount_offer()).await;
    app.send_all(
        BUYER,
        vec![
            button("skip_discount"),
            button("ship_to_addr"),
            button("confirm_payment"),
        ],
    )
    .await;
    assert_eq!(app.session(BUYER).await.unwrap().step, Step::AwaitingPayment);
    app.messenger.clear();
    app
}

fn reference() -> PaymentReference {
    PaymentReference::new("plink_1")
}

#[tokio::test]
async fn test_unknown_reference_is_a_no_op() {
    let app = awaiting_payment().await;

    let outcome = app
        .finalizer
        .finalize(&PaymentReference::new("plink_unknown"), None)
        .await
        .unwrap();

    assert_eq!(outcome, FinalizeOutcome::Ignored);
    assert!(app.commerce.created().is_empty());
    assert!(app.messenger.sent().is_empty());
    assert_eq!(app.session(BUYER).await.unwrap().step, Step::AwaitingPayment);
}

#[tokio::test]
async fn test_redelivery_places_one_order() {
    let app = awaiting_payment().await;

    let first = app.finalizer.finalize(&reference(), None).await.unwrap();
    let second = app.finalizer.finalize(&reference(), None).await.unwrap();

    assert_eq!(first, FinalizeOutcome::Placed(OrderName::new("#1001")));
    assert_eq!(second, FinalizeOutcome::Ignored);
    assert_eq!(app.commerce.created().len(), 1);
    assert_eq!(app.messenger.sent().len(), 1);
}

#[tokio::test]
async fn test_order_already_tagged_is_not_recreated() {
    let app = awaiting_payment().await;
    app.commerce.insert_tagged("payref-plink_1", "#2001");

    let outcome = app.finalizer.finalize(&reference(), None).await.unwrap();

    assert_eq!(outcome, FinalizeOutcome::AlreadyPlaced(OrderName::new("#2001")));
    assert!(app.commerce.created().is_empty());
    assert!(app.session(BUYER).await.is_none());
    assert!(
        app.messenger
            .last()
            .unwrap()
            .body()
            .contains("Order ID: *#2001*")
    );
}

#[tokio::test]
async fn test_backend_failure_notifies_once_and_keeps_session() {
    let app = awaiting_payment().await;
    app.commerce.fail_next(2);

    let first = app.finalizer.finalize(&reference(), None).await.unwrap();
    let second = app.finalizer.finalize(&reference(), None).await.unwrap();

    assert_eq!(first, FinalizeOutcome::Failed { attempts: 1 });
    assert_eq!(second, FinalizeOutcome::Failed { attempts: 2 });

    let session = app.session(BUYER).await.unwrap();
    assert_eq!(session.step, Step::AwaitingPayment);
    assert_eq!(session.finalize_attempts, 2);
    let failures = app
        .messenger
        .bodies(BUYER)
        .into_iter()
        .filter(|b| b.contains("Failed to create your order"))
        .count();
    assert_eq!(failures, 1);

    let third = app.finalizer.finalize(&reference(), None).await.unwrap();
    assert_eq!(third, FinalizeOutcome::Placed(OrderName::new("#1001")));
    assert!(app.session(BUYER).await.is_none());
}

#[tokio::test]
async fn test_existing_customer_is_linked() {
    let app = awaiting_payment().await;
    app.commerce.insert_customer("9876543210", "5001");

    app.finalizer.finalize(&reference(), None).await.unwrap();

    let created = app.commerce.created();
    assert_eq!(
        created[0].customer,
        OrderCustomer::Existing(CustomerId::new("5001"))
    );
}

#[tokio::test]
async fn test_new_customer_is_created_inline() {
    let app = awaiting_payment().await;

    app.finalizer.finalize(&reference(), None).await.unwrap();

    let created = app.commerce.created();
    assert_eq!(
        created[0].customer,
        OrderCustomer::New {
            first_name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+919876543210".to_string(),
        }
    );
    assert_eq!(created[0].shipping, Money::from_units(40));
    assert_eq!(created[0].address.as_ref().unwrap().pincode, "641001");
}

#[tokio::test]
async fn test_amount_mismatch_still_places_order() {
    let app = awaiting_payment().await;

    let outcome = app
        .finalizer
        .finalize(&reference(), Some(Money::from_units(150)))
        .await
        .unwrap();

    assert!(matches!(outcome, FinalizeOutcome::Placed(_)));
    assert_eq!(app.commerce.created()[0].total, Money::from_units(200));
}
