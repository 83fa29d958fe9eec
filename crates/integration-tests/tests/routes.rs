//! Webhook endpoints.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chat_checkout_bot::routes;
use chat_checkout_bot::session::Step;
use chat_checkout_integration_tests::{
    BUYER, TestApp, VERIFY_TOKEN, button, checkout_to_discount_offer, sign,
};
use serde_json::json;
use tower::ServiceExt;

const APP_SECRET: &str = "whatsapp-app-secret";
const RAZORPAY_SECRET: &str = "razorpay-webhook-secret";

fn text_message(from: &str, body: &str) -> String {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "messages": [{
                        "from": from,
                        "id": "wamid.1",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": body}
                    }]
                }
            }]
        }]
    })
    .to_string()
}

fn paid_event(reference: &str, amount: i64) -> String {
    json!({
        "entity": "event",
        "event": "payment_link.paid",
        "payload": {
            "payment_link": {
                "entity": {"id": reference, "amount": amount, "amount_paid": amount, "status": "paid"}
            }
        }
    })
    .to_string()
}

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = routes::app(TestApp::new().state());

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = app.oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// WhatsApp
// ============================================================================

#[tokio::test]
async fn test_verification_handshake() {
    let app = routes::app(TestApp::new().state());

    let uri = format!(
        "/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1158201444"
    );
    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "1158201444");

    let response = app
        .oneshot(get(
            "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_text_message_gets_welcome() {
    let test = TestApp::new();
    let app = routes::app(test.state());

    let response = app
        .oneshot(post("/webhook", text_message(BUYER, "hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply = test.messenger.last().unwrap();
    assert!(reply.body().contains("Welcome to our WhatsApp Shop"));
    assert_eq!(test.session(BUYER).await.unwrap().step, Step::Start);
}

#[tokio::test]
async fn test_status_only_payload_is_acknowledged() {
    let test = TestApp::new();
    let app = routes::app(test.state());
    let body = json!({
        "object": "whatsapp_business_account",
        "entry": [{"changes": [{"value": {"statuses": [{"id": "wamid.1", "status": "read"}]}}]}]
    })
    .to_string();

    let response = app.oneshot(post("/webhook", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(test.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let app = routes::app(TestApp::new().state());

    let response = app
        .oneshot(post("/webhook", "{not json".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_payloads() {
    let test = TestApp::new();
    let app = routes::app(test.state_with_secrets(Some(APP_SECRET), None));
    let body = text_message(BUYER, "hi");

    // Unsigned
    let response = app
        .clone()
        .oneshot(post("/webhook", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong secret
    let mut request = post("/webhook", body.clone());
    let signature = format!("sha256={}", sign("other-secret", body.as_bytes()));
    request
        .headers_mut()
        .insert("X-Hub-Signature-256", signature.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(test.messenger.sent().is_empty());

    // Correct
    let mut request = post("/webhook", body.clone());
    let signature = format!("sha256={}", sign(APP_SECRET, body.as_bytes()));
    request
        .headers_mut()
        .insert("X-Hub-Signature-256", signature.parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.messenger.sent().len(), 1);
}

// ============================================================================
// Razorpay
// ============================================================================

async fn awaiting_payment() -> TestApp {
    let test = TestApp::new();
    test.send_all(BUYER, checkout_to_discount_offer()).await;
    test.send_all(
        BUYER,
        vec![
            button("skip_discount"),
            button("ship_to_addr"),
            button("confirm_payment"),
        ],
    )
    .await;
    test
}

#[tokio::test]
async fn test_paid_link_places_order() {
    let test = awaiting_payment().await;
    let app = routes::app(test.state());

    let response = app
        .oneshot(post("/razorpay-webhook", paid_event("plink_1", 20_000)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.commerce.created().len(), 1);
    assert!(test.session(BUYER).await.is_none());
}

#[tokio::test]
async fn test_unknown_link_and_other_events_are_acknowledged() {
    let test = awaiting_payment().await;
    let app = routes::app(test.state());

    let response = app
        .clone()
        .oneshot(post("/razorpay-webhook", paid_event("plink_other", 100)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json!({"event": "payment_link.cancelled", "payload": {}}).to_string();
    let response = app.oneshot(post("/razorpay-webhook", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(test.commerce.created().is_empty());
}

#[tokio::test]
async fn test_failed_placement_asks_for_redelivery() {
    let test = awaiting_payment().await;
    test.commerce.fail_next(1);
    let app = routes::app(test.state());

    let response = app
        .clone()
        .oneshot(post("/razorpay-webhook", paid_event("plink_1", 20_000)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = app
        .oneshot(post("/razorpay-webhook", paid_event("plink_1", 20_000)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.commerce.created().len(), 1);
}

#[tokio::test]
async fn test_razorpay_signature_required_when_configured() {
    let test = awaiting_payment().await;
    let app = routes::app(test.state_with_secrets(None, Some(RAZORPAY_SECRET)));
    let body = paid_event("plink_1", 20_000);

    let response = app
        .clone()
        .oneshot(post("/razorpay-webhook", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(test.commerce.created().is_empty());

    let mut request = post("/razorpay-webhook", body.clone());
    request.headers_mut().insert(
        "X-Razorpay-Signature",
        sign(RAZORPAY_SECRET, body.as_bytes()).parse().unwrap(),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.commerce.created().len(), 1);
}

#[tokio::test]
async fn test_payment_landing_page() {
    let app = routes::app(TestApp::new().state());

    let response = app.oneshot(get("/razorpay-webhook")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Payment received"));
}
