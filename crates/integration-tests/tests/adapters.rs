//! HTTP clients against mock servers.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chat_checkout_bot::address::{Address, CustomerDirectory};
use chat_checkout_bot::commerce::{CommerceBackend, OrderCustomer, OrderDraft, OrderLine};
use chat_checkout_bot::config::{RazorpayConfig, ShopifyConfig, WhatsAppConfig};
use chat_checkout_bot::error::CheckoutError;
use chat_checkout_bot::messaging::{Messenger, Reply};
use chat_checkout_bot::payment::{PaymentProcessor, PaymentRequest};
use chat_checkout_bot::pricing::{DiscountRule, DiscountValidator};
use chat_checkout_bot::razorpay::RazorpayClient;
use chat_checkout_bot::shopify::ShopifyClient;
use chat_checkout_bot::whatsapp::{WhatsAppClient, WhatsAppError};
use chat_checkout_core::{
    ConversationId, CurrencyCode, CustomerId, DeliveryType, Email, Money, OrderName,
    PaymentReference, ProductId,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{
    basic_auth, bearer_token, body_partial_json, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);
const SHOPIFY_BASE: &str = "/admin/api/2024-04";

// ============================================================================
// WhatsApp
// ============================================================================

fn whatsapp(server: &MockServer) -> WhatsAppClient {
    let config = WhatsAppConfig {
        api_base: server.uri(),
        api_version: "v19.0".to_string(),
        access_token: SecretString::from("wa-token"),
        phone_number_id: "1234567890".to_string(),
        verify_token: SecretString::from("verify"),
        app_secret: None,
        checkout_flow_id: None,
        catalog_thumbnail_id: None,
        catalog_fallback_url: None,
    };
    WhatsAppClient::new(&config, TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_whatsapp_sends_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v19.0/1234567890/messages"))
        .and(bearer_token("wa-token"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "to": "919876543210",
            "type": "text",
            "text": {"body": "hello"}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"messages": [{"id": "wamid.1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    whatsapp(&server)
        .send(
            &ConversationId::from_sender("919876543210"),
            &Reply::text("hello"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_whatsapp_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = whatsapp(&server)
        .send_text("919876543210", "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, WhatsAppError::RateLimited));
}

#[tokio::test]
async fn test_whatsapp_api_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Recipient phone number not in allowed list", "code": 131030}
        })))
        .mount(&server)
        .await;

    let err = whatsapp(&server)
        .send(&ConversationId::from_sender("1"), &Reply::text("hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::ExternalService { service: "whatsapp", ref message }
            if message.contains("not in allowed list")
    ));
}

// ============================================================================
// Shopify
// ============================================================================

fn shopify(server: &MockServer) -> ShopifyClient {
    let config = ShopifyConfig {
        store: server.uri(),
        api_version: "2024-04".to_string(),
        access_token: SecretString::from("shpat_test"),
    };
    ShopifyClient::new(&config, TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_shopify_customer_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{SHOPIFY_BASE}/customers/search.json")))
        .and(query_param("query", "phone:+919876543210"))
        .and(header("X-Shopify-Access-Token", "shpat_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "customers": [{
                "id": 5001,
                "first_name": "Ravi",
                "last_name": "Kumar",
                "email": "ravi@example.com",
                "phone": "+919876543210",
                "default_address": {"address1": "12 Lake View Road", "city": "Chennai", "province_code": "TN", "zip": "600001"}
            }]
        })))
        .mount(&server)
        .await;

    let customer = shopify(&server)
        .find_customer("+919876543210")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(customer.id, CustomerId::new("5001"));
    assert_eq!(customer.first_name.as_deref(), Some("Ravi"));
    assert!(customer.default_address.is_some());
}

#[tokio::test]
async fn test_shopify_discount_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{SHOPIFY_BASE}/discount_codes/lookup.json")))
        .and(query_param("code", "SAVE10"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"discount_code": {"id": 1, "price_rule_id": 777}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{SHOPIFY_BASE}/price_rules/777.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "price_rule": {"value_type": "percentage", "value": "-10.0", "starts_at": "2020-01-01T00:00:00Z"}
        })))
        .mount(&server)
        .await;

    let rule = shopify(&server).resolve("SAVE10").await.unwrap();

    assert_eq!(
        rule,
        Some(DiscountRule::Percentage {
            rate: Decimal::from(10)
        })
    );
}

#[tokio::test]
async fn test_shopify_unknown_discount() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{SHOPIFY_BASE}/discount_codes/lookup.json")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(shopify(&server).resolve("NOPE").await.unwrap(), None);
}

#[tokio::test]
async fn test_shopify_find_order_by_tag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{SHOPIFY_BASE}/graphql.json")))
        .and(body_partial_json(json!({"variables": {"query": "tag:'payref-plink_1'"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"orders": {"edges": [{"node": {
                "name": "#1001",
                "createdAt": "2026-01-02T10:00:00Z",
                "displayFulfillmentStatus": "UNFULFILLED"
            }}]}}
        })))
        .mount(&server)
        .await;

    let order = shopify(&server)
        .find_order_by_tag("payref-plink_1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(order.name, OrderName::new("#1001"));
}

#[tokio::test]
async fn test_shopify_graphql_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{SHOPIFY_BASE}/graphql.json")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errors": [{"message": "Throttled"}]})),
        )
        .mount(&server)
        .await;

    let result = CommerceBackend::find_order_by_tag(&shopify(&server), "payref-x").await;

    assert!(matches!(
        result,
        Err(CheckoutError::ExternalService { service: "shopify", .. })
    ));
}

fn draft() -> OrderDraft {
    OrderDraft {
        customer: OrderCustomer::Existing(CustomerId::new("5001")),
        lines: vec![OrderLine {
            product_id: ProductId::new("41392567746606"),
            title: "Soap".to_string(),
            quantity: 2,
            price: Money::from_units(80),
        }],
        currency: CurrencyCode::INR,
        total: Money::from_units(200),
        shipping: Money::from_units(40),
        shipping_title: "Standard Shipping",
        delivery: DeliveryType::Ship,
        address: Some(Address {
            id: None,
            line: "No 1, Anna Street".to_string(),
            city: "Coimbatore".to_string(),
            state: "TN".to_string(),
            pincode: "641001".to_string(),
            country: "India".to_string(),
            is_default: false,
        }),
        contact_name: "Asha".to_string(),
        contact_phone: "+919876543210".to_string(),
        email: "asha@example.com".to_string(),
        discount: None,
        gateway: "Razorpay",
        tag: PaymentReference::new("plink_1").order_tag(),
    }
}

#[tokio::test]
async fn test_shopify_create_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{SHOPIFY_BASE}/orders.json")))
        .and(body_partial_json(json!({
            "order": {
                "customer": {"id": 5001},
                "financial_status": "paid",
                "tags": "payref-plink_1",
                "shipping_address": {"city": "Coimbatore", "zip": "641001"},
                "line_items": [{"variant_id": 41_392_567_746_606_u64, "quantity": 2}]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "order": {"name": "#1001", "created_at": "2026-01-02T10:00:00Z", "fulfillment_status": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = shopify(&server).create_order(&draft()).await.unwrap();

    assert_eq!(order.name, OrderName::new("#1001"));
}

#[tokio::test]
async fn test_shopify_rejected_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{SHOPIFY_BASE}/orders.json")))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"errors": {"line_items": ["is invalid"]}})),
        )
        .mount(&server)
        .await;

    let result = CommerceBackend::create_order(&shopify(&server), &draft()).await;

    assert!(result.is_err());
}

// ============================================================================
// Razorpay
// ============================================================================

fn razorpay(server: &MockServer) -> RazorpayClient {
    let config = RazorpayConfig {
        api_base: server.uri(),
        key_id: "rzp_test_key".to_string(),
        key_secret: SecretString::from("rzp-secret"),
        webhook_secret: None,
        callback_url: Some("https://shop.example.com/razorpay-webhook".to_string()),
    };
    RazorpayClient::new(&config, TIMEOUT).unwrap()
}

fn payment_request(amount: Money) -> PaymentRequest {
    PaymentRequest {
        amount,
        currency: CurrencyCode::INR,
        description: "Test Shop order".to_string(),
        customer_name: "Asha".to_string(),
        email: Email::parse("asha@example.com").unwrap(),
        contact: "+919876543210".to_string(),
    }
}

#[tokio::test]
async fn test_razorpay_creates_link_in_paise() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_links"))
        .and(basic_auth("rzp_test_key", "rzp-secret"))
        .and(body_partial_json(json!({
            "amount": 20_000,
            "currency": "INR",
            "customer": {"contact": "+919876543210"},
            "callback_method": "get"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "plink_Abc123",
            "short_url": "https://rzp.io/i/abc",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let link = razorpay(&server)
        .create_payment_link(&payment_request(Money::from_units(200)))
        .await
        .unwrap();

    assert_eq!(link.reference, PaymentReference::new("plink_Abc123"));
    assert_eq!(link.url, "https://rzp.io/i/abc");
}

#[tokio::test]
async fn test_razorpay_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_links"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "BAD_REQUEST_ERROR", "description": "amount must be at least 100"}
        })))
        .mount(&server)
        .await;

    let err = razorpay(&server)
        .create_payment_link(&payment_request(Money::from_units(200)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::ExternalService { service: "razorpay", .. }
    ));
}
