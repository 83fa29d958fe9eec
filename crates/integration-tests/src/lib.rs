//! Integration tests for the chat checkout bot.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p chat-checkout-integration-tests
//! ```
//!
//! Nothing here needs network access or a database: the conversation runs
//! against in-memory stores and the fakes below, and the HTTP adapters are
//! pointed at `wiremock` servers.
//!
//! # Test Categories
//!
//! - `checkout_flow` - Whole conversations through [`CheckoutService`]
//! - `finalization` - Payment webhook handling and order placement
//! - `routes` - Webhook endpoints driven with `tower::ServiceExt::oneshot`
//! - `adapters` - WhatsApp, Shopify and Razorpay clients against `wiremock`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_checkout_bot::address::{
    AddressResolver, CustomerDirectory, DirectoryCustomer, InMemoryAddressCache, RawAddress,
};
use chat_checkout_bot::catalog::Catalog;
use chat_checkout_bot::commerce::{CommerceBackend, OrderDraft, OrderStatus, PlacedOrder};
use chat_checkout_bot::conversation::{
    CheckoutCapabilities, CheckoutPorts, CheckoutService, CheckoutSettings, ConversationLocks,
    Event, FormSettings,
};
use chat_checkout_bot::error::CheckoutError;
use chat_checkout_bot::finalizer::OrderFinalizer;
use chat_checkout_bot::messaging::{Messenger, Reply};
use chat_checkout_bot::payment::{PaymentInitiator, PaymentLink, PaymentProcessor, PaymentRequest};
use chat_checkout_bot::pricing::{DiscountRule, DiscountValidator};
use chat_checkout_bot::session::{InMemorySessionStore, Session};
use chat_checkout_bot::state::{AppState, WebhookSecrets};
use chat_checkout_core::{
    ConversationId, CustomerId, FulfillmentStatus, OrderName, PaymentReference,
};
use secrecy::SecretString;

pub use chat_checkout_bot;
pub use chat_checkout_core;

/// Buyer used by most tests.
pub const BUYER: &str = "919876543210";
/// Catalog ids from the bundled catalog.
pub const SOAP: &str = "41392567746606";
pub const SERUM: &str = "41382358908974";
pub const VERIFY_TOKEN: &str = "verify-token-for-tests";

// ============================================================================
// Fakes
// ============================================================================

/// Records every reply instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ConversationId, Reply)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    /// Every reply sent so far, oldest first.
    pub fn sent(&self) -> Vec<(ConversationId, Reply)> {
        self.sent.lock().unwrap().clone()
    }

    /// Reply bodies sent to one buyer.
    pub fn bodies(&self, to: &str) -> Vec<String> {
        let to = ConversationId::from_sender(to);
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == to)
            .map(|(_, reply)| reply.body().to_string())
            .collect()
    }

    pub fn last(&self) -> Option<Reply> {
        self.sent().pop().map(|(_, reply)| reply)
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Make every send fail from now on.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, to: &ConversationId, reply: &Reply) -> Result<(), CheckoutError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CheckoutError::external("whatsapp", "unreachable"));
        }
        self.sent.lock().unwrap().push((to.clone(), reply.clone()));
        Ok(())
    }
}

/// Customer directory keyed by phone exactly as queried.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    customers: Mutex<HashMap<String, DirectoryCustomer>>,
    lookups: AtomicUsize,
}

impl FakeDirectory {
    pub fn insert(&self, phone: &str, customer: DirectoryCustomer) {
        self.customers
            .lock()
            .unwrap()
            .insert(phone.to_string(), customer);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerDirectory for FakeDirectory {
    async fn find_customer(
        &self,
        phone: &str,
    ) -> Result<Option<DirectoryCustomer>, CheckoutError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.customers.lock().unwrap().get(phone).cloned())
    }

    async fn customer_addresses(&self, id: &CustomerId) -> Result<Vec<RawAddress>, CheckoutError> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .values()
            .find(|c| c.id == *id)
            .map(|c| c.addresses.clone())
            .unwrap_or_default())
    }
}

/// Discount codes the store knows about.
#[derive(Debug, Default)]
pub struct FakeDiscounts {
    codes: Mutex<HashMap<String, DiscountRule>>,
    unavailable: AtomicBool,
}

impl FakeDiscounts {
    pub fn insert(&self, code: &str, rule: DiscountRule) {
        self.codes.lock().unwrap().insert(code.to_string(), rule);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl DiscountValidator for FakeDiscounts {
    async fn resolve(&self, code: &str) -> Result<Option<DiscountRule>, CheckoutError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CheckoutError::external("shopify", "timed out"));
        }
        Ok(self.codes.lock().unwrap().get(code).cloned())
    }
}

/// Issues `plink_N` references and records the requests.
#[derive(Debug, Default)]
pub struct FakePayments {
    requests: Mutex<Vec<PaymentRequest>>,
    failing: AtomicBool,
}

impl FakePayments {
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProcessor for FakePayments {
    async fn create_payment_link(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentLink, CheckoutError> {
        // Let a concurrent request for the same buyer get scheduled.
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(CheckoutError::external("razorpay", "503"));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let n = requests.len();
        Ok(PaymentLink {
            reference: PaymentReference::new(format!("plink_{n}")),
            url: format!("https://rzp.io/i/test{n}"),
        })
    }
}

/// Orders kept in memory, names from `#1001` upwards.
#[derive(Debug, Default)]
pub struct FakeCommerce {
    created: Mutex<Vec<OrderDraft>>,
    by_tag: Mutex<HashMap<String, PlacedOrder>>,
    customers: Mutex<HashMap<String, CustomerId>>,
    statuses: Mutex<HashMap<OrderName, OrderStatus>>,
    failures_left: AtomicU32,
}

impl FakeCommerce {
    pub fn created(&self) -> Vec<OrderDraft> {
        self.created.lock().unwrap().clone()
    }

    /// Fail the next `n` order creations.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn insert_customer(&self, phone: &str, id: &str) {
        self.customers
            .lock()
            .unwrap()
            .insert(phone.to_string(), CustomerId::new(id));
    }

    /// Pretend an order for `tag` already exists.
    pub fn insert_tagged(&self, tag: &str, name: &str) {
        self.by_tag.lock().unwrap().insert(
            tag.to_string(),
            PlacedOrder {
                name: OrderName::new(name),
                created_at: chrono::Utc::now(),
                fulfillment_status: FulfillmentStatus::Unfulfilled,
            },
        );
    }

    pub fn insert_status(&self, status: OrderStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(status.name.clone(), status);
    }
}

#[async_trait]
impl CommerceBackend for FakeCommerce {
    async fn find_customer_id(&self, phone: &str) -> Result<Option<CustomerId>, CheckoutError> {
        Ok(self.customers.lock().unwrap().get(phone).cloned())
    }

    async fn find_order_by_tag(&self, tag: &str) -> Result<Option<PlacedOrder>, CheckoutError> {
        Ok(self.by_tag.lock().unwrap().get(tag).cloned())
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<PlacedOrder, CheckoutError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CheckoutError::external("shopify", "500"));
        }

        let mut created = self.created.lock().unwrap();
        created.push(draft.clone());
        let order = PlacedOrder {
            name: OrderName::new(format!("#{}", 1000 + created.len())),
            created_at: chrono::Utc::now(),
            fulfillment_status: FulfillmentStatus::Unfulfilled,
        };
        self.by_tag
            .lock()
            .unwrap()
            .insert(draft.tag.clone(), order.clone());
        Ok(order)
    }

    async fn order_status(&self, name: &OrderName) -> Result<Option<OrderStatus>, CheckoutError> {
        Ok(self.statuses.lock().unwrap().get(name).cloned())
    }
}

// ============================================================================
// Test application
// ============================================================================

/// The bot wired to in-memory storage and fakes.
pub struct TestApp {
    pub sessions: Arc<InMemorySessionStore>,
    pub addresses: Arc<InMemoryAddressCache>,
    pub messenger: Arc<RecordingMessenger>,
    pub directory: Arc<FakeDirectory>,
    pub discounts: Arc<FakeDiscounts>,
    pub payments: Arc<FakePayments>,
    pub commerce: Arc<FakeCommerce>,
    pub service: CheckoutService,
    pub finalizer: OrderFinalizer,
}

impl TestApp {
    /// Question-by-question checkout.
    pub fn new() -> Self {
        Self::with_capabilities(CheckoutCapabilities::default())
    }

    /// Checkout through the structured form.
    pub fn with_forms() -> Self {
        Self::with_capabilities(CheckoutCapabilities {
            forms: Some(FormSettings::default()),
        })
    }

    fn with_capabilities(capabilities: CheckoutCapabilities) -> Self {
        let settings = CheckoutSettings {
            brand_name: "Test Shop".to_string(),
            capabilities,
            ..CheckoutSettings::default()
        };

        let sessions = Arc::new(InMemorySessionStore::new());
        let addresses = Arc::new(InMemoryAddressCache::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let directory = Arc::new(FakeDirectory::default());
        let discounts = Arc::new(FakeDiscounts::default());
        let payments = Arc::new(FakePayments::default());
        let commerce = Arc::new(FakeCommerce::default());
        let locks = ConversationLocks::new();

        let ports = CheckoutPorts {
            sessions: sessions.clone(),
            messenger: messenger.clone(),
            addresses: AddressResolver::new(
                directory.clone(),
                addresses.clone(),
                settings.dial_code.clone(),
                settings.default_country.clone(),
            ),
            discounts: discounts.clone(),
            payments: PaymentInitiator::new(
                payments.clone(),
                settings.dial_code.clone(),
                settings.currency,
            ),
            commerce: commerce.clone(),
        };

        let finalizer = OrderFinalizer::new(
            sessions.clone(),
            commerce.clone(),
            messenger.clone(),
            locks.clone(),
            settings.dial_code.clone(),
            settings.currency,
        );
        let catalog = Catalog::bundled().unwrap();
        let service = CheckoutService::new(ports, catalog, settings, locks);

        Self {
            sessions,
            addresses,
            messenger,
            directory,
            discounts,
            payments,
            commerce,
            service,
            finalizer,
        }
    }

    /// Run one event for `from`.
    pub async fn send(&self, from: &str, event: Event) {
        self.service
            .handle(&ConversationId::from_sender(from), event)
            .await
            .unwrap();
    }

    /// Run events in order for `from`.
    pub async fn send_all(&self, from: &str, events: Vec<Event>) {
        for event in events {
            self.send(from, event).await;
        }
    }

    /// The stored session for `from`, if any.
    pub async fn session(&self, from: &str) -> Option<Session> {
        self.sessions.get(&ConversationId::from_sender(from)).await
    }

    /// HTTP state without signature checks.
    pub fn state(&self) -> AppState {
        self.state_with_secrets(None, None)
    }

    /// HTTP state checking signatures with the given secrets.
    pub fn state_with_secrets(
        &self,
        whatsapp_app_secret: Option<&str>,
        razorpay_webhook_secret: Option<&str>,
    ) -> AppState {
        AppState::from_parts(
            WebhookSecrets {
                verify_token: SecretString::from(VERIFY_TOKEN),
                whatsapp_app_secret: whatsapp_app_secret.map(SecretString::from),
                razorpay_webhook_secret: razorpay_webhook_secret.map(SecretString::from),
            },
            self.service.clone(),
            self.finalizer.clone(),
        )
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Events
// ============================================================================

pub fn text(body: &str) -> Event {
    Event::from_text(body)
}

pub fn button(id: &str) -> Event {
    Event::from_button(id)
}

/// A cart with the given `(product id, quantity)` lines.
pub fn cart(lines: &[(&str, u32)]) -> Event {
    Event::CartSubmitted(
        lines
            .iter()
            .map(|(id, quantity)| chat_checkout_bot::conversation::CartItem {
                product_id: chat_checkout_core::ProductId::new(*id),
                price: None,
                quantity: Some(*quantity),
            })
            .collect(),
    )
}

/// Cart, contact and a Tamil Nadu address, answered one question at a time,
/// ending at the discount offer.
pub fn checkout_to_discount_offer() -> Vec<Event> {
    vec![
        text("hi"),
        cart(&[(SOAP, 2)]),
        button("enter_new"),
        text("Asha"),
        text("asha@example.com"),
        text("9876543210"),
        text("No 1, Anna Street"),
        text("Coimbatore"),
        text("TN"),
        text("641001"),
    ]
}

/// Hex HMAC-SHA256 of `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
