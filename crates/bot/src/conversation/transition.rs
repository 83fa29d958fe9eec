//! The conversation state machine.
//!
//! Everything here is pure: no I/O, no clocks, no randomness. Calls to the
//! outside world are requested as [`Effect`]s and come back as outcome
//! [`Event`]s.

use chat_checkout_core::{DeliveryType, Email, Money, OrderName, PhoneNumber};

use super::event::{CartItem, DiscountOutcome, Event, FormSubmission};
use super::{CheckoutSettings, Effect, replies};
use crate::address::{Address, SavedAddress};
use crate::catalog::Catalog;
use crate::commerce::OrderStatus;
use crate::error::CheckoutError;
use crate::messaging::{ButtonId, Reply};
use crate::payment::{self, PaymentError, PaymentLink};
use crate::pricing::{self, DiscountRule};
use crate::session::{AppliedDiscount, CartLine, Session, Step};

/// Read-only inputs to a transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub catalog: &'a Catalog,
    pub settings: &'a CheckoutSettings,
}

/// The next session and the work to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    const fn new(session: Session) -> Self {
        Self {
            session,
            effects: Vec::new(),
        }
    }

    fn send(&mut self, reply: Reply) {
        self.effects.push(Effect::Send(reply));
    }

    fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Replies queued by this transition.
    #[must_use]
    pub fn replies(&self) -> Vec<&Reply> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Send(reply) => Some(reply),
                _ => None,
            })
            .collect()
    }
}

/// Apply one event to a session.
#[must_use]
pub fn transition(session: Session, event: Event, ctx: &TransitionContext<'_>) -> Transition {
    let mut t = Transition::new(session);

    match event {
        Event::Greeting => {
            t.session.reset();
            t.send(replies::welcome(&ctx.settings.brand_name));
        }
        Event::CartSubmitted(items) => cart_submitted(&mut t, &items, ctx),
        Event::Button(id) => button(&mut t, id, ctx),
        Event::UnknownButton(_) => t.send(replies::welcome(&ctx.settings.brand_name)),
        Event::Text(text) => text_received(&mut t, text.trim(), ctx),
        Event::FormSubmitted(form) => form_submitted(&mut t, form, ctx),
        Event::ExistingAddress(found) => existing_address(&mut t, found, ctx),
        Event::AddressSaved(saved) => address_saved(&mut t, saved, ctx),
        Event::DiscountResolved { code, outcome } => discount_resolved(&mut t, code, outcome, ctx),
        Event::PaymentLinkCreated(link) => payment_link_created(&mut t, link),
        Event::PaymentLinkFailed(err) => payment_link_failed(&mut t, &err),
        Event::OrderStatusLoaded { name, result } => order_status_loaded(&mut t, &name, result),
    }

    t
}

/// Map submitted items through the catalog, merging repeats.
fn build_cart(items: &[CartItem], catalog: &Catalog) -> Vec<CartLine> {
    let mut cart: Vec<CartLine> = Vec::new();

    for item in items {
        let Some(product) = catalog.get(&item.product_id) else {
            continue;
        };
        let quantity = item.quantity.unwrap_or(1);
        if quantity == 0 {
            continue;
        }

        if let Some(line) = cart.iter_mut().find(|l| l.product_id == product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            cart.push(CartLine {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: item
                    .price
                    .filter(Money::is_positive)
                    .unwrap_or(product.price),
                quantity,
            });
        }
    }

    cart
}

fn cart_submitted(t: &mut Transition, items: &[CartItem], ctx: &TransitionContext<'_>) {
    if t.session.step.is_processing() {
        t.send(replies::already_processing());
        return;
    }

    let cart = build_cart(items, ctx.catalog);
    if cart.is_empty() {
        t.send(replies::cart_empty());
        return;
    }

    t.session.reset();
    let subtotal = pricing::subtotal(&cart);
    t.send(replies::cart_ready(&cart, subtotal, &ctx.settings.brand_name));
    t.session.cart = cart;
    t.session.step = Step::AddressSelection;
}

fn button(t: &mut Transition, id: ButtonId, ctx: &TransitionContext<'_>) {
    let brand = &ctx.settings.brand_name;

    match (id, t.session.step.clone()) {
        (ButtonId::CancelOrder, _) => {
            t.send(replies::order_cancelled());
            t.effect(Effect::EndSession);
        }
        (ButtonId::Catalog | ButtonId::Track, Step::AwaitingPayment) => {
            t.send(replies::awaiting_payment());
        }
        (ButtonId::Catalog, _) => show_catalog(t, ctx),
        (ButtonId::Track, _) => start_tracking(t),
        (ButtonId::UseExisting, Step::AddressSelection) => {
            t.effect(Effect::FindExistingAddress);
        }
        (ButtonId::EnterNew, Step::AddressSelection)
        | (ButtonId::UseNew, Step::AddressChoice { .. }) => begin_entry(t, ctx),
        (ButtonId::UseSaved, Step::AddressChoice { candidate }) => {
            use_saved(t, *candidate);
            show_discount_offer(t, ctx);
        }
        (ButtonId::ApplyDiscount, Step::DiscountOffer | Step::DiscountRetry)
        | (ButtonId::RetryDiscount, Step::DiscountRetry) => {
            t.session.step = Step::DiscountInput;
            t.send(replies::ask_discount_code());
        }
        (
            ButtonId::SkipDiscount,
            Step::DiscountOffer | Step::DiscountRetry | Step::DiscountInput,
        ) => {
            t.session.discount = None;
            proceed_after_discount(t, ctx);
        }
        (ButtonId::Ship, Step::DeliveryChoice) => choose_delivery(t, DeliveryType::Ship, ctx),
        (ButtonId::Pickup, Step::DeliveryChoice) => choose_delivery(t, DeliveryType::Pickup, ctx),
        (ButtonId::ConfirmPayment, Step::OrderSummary) => confirm_payment(t, ctx),
        (ButtonId::ConfirmPayment, step) if step.is_processing() => {
            t.send(replies::already_processing());
        }
        _ => t.send(replies::welcome(brand)),
    }
}

fn text_received(t: &mut Transition, text: &str, ctx: &TransitionContext<'_>) {
    let policy = &ctx.settings.policy;

    match t.session.step.clone() {
        Step::CollectName => {
            if text.is_empty() {
                t.send(replies::ask_name());
            } else {
                t.session.customer.name = Some(text.to_string());
                t.session.step = Step::CollectEmail;
                t.send(replies::ask_email());
            }
        }
        Step::CollectEmail => match Email::parse(text) {
            Ok(email) => {
                t.session.customer.email = Some(email);
                t.session.step = Step::CollectMobile;
                t.send(replies::ask_mobile());
            }
            Err(_) => t.send(replies::invalid_email()),
        },
        Step::CollectMobile => match PhoneNumber::parse(text) {
            Ok(mobile) => {
                t.session.customer.mobile = Some(mobile);
                t.session.step = Step::CollectAddressLine;
                t.send(replies::ask_address_line());
            }
            Err(_) => t.send(replies::invalid_mobile()),
        },
        Step::CollectAddressLine => {
            if text.is_empty() {
                t.send(replies::ask_address_line());
            } else {
                t.session.step = Step::CollectCity {
                    line: text.to_string(),
                };
                t.send(replies::ask_city());
            }
        }
        Step::CollectCity { line } => {
            if text.is_empty() {
                t.send(replies::ask_city());
            } else {
                t.session.step = Step::CollectState {
                    line,
                    city: text.to_string(),
                };
                t.send(replies::ask_state(
                    &policy.home_state_name,
                    &policy.home_state_code,
                ));
            }
        }
        Step::CollectState { line, city } => {
            if text.is_empty() {
                t.send(replies::ask_state(
                    &policy.home_state_name,
                    &policy.home_state_code,
                ));
            } else {
                t.session.step = Step::CollectPincode {
                    line,
                    city,
                    state: text.to_string(),
                };
                t.send(replies::ask_pincode());
            }
        }
        Step::CollectPincode { line, city, state } => {
            if text.is_empty() {
                t.send(replies::ask_pincode());
                return;
            }
            let address = Address {
                id: None,
                line,
                city,
                state,
                pincode: text.to_string(),
                country: ctx.settings.default_country.clone(),
                is_default: false,
            };
            t.session.address = Some(address.clone());
            t.session.step = Step::DiscountOffer;
            t.effect(Effect::SaveAddress(SavedAddress {
                customer: t.session.customer.clone(),
                address,
            }));
        }
        Step::DiscountInput => {
            if text.eq_ignore_ascii_case("skip") {
                t.session.discount = None;
                proceed_after_discount(t, ctx);
            } else if text.is_empty() {
                t.send(replies::ask_discount_code());
            } else {
                t.effect(Effect::ValidateDiscount(text.to_string()));
            }
        }
        Step::TrackOrder => match OrderName::from_input(text) {
            Some(name) => t.effect(Effect::LookupOrder(name)),
            None => t.send(replies::ask_order_id()),
        },
        Step::AwaitingPayment => t.send(replies::awaiting_payment()),
        _ => command(t, text, ctx),
    }
}

/// Text outside of a question: a command, or we show the welcome.
fn command(t: &mut Transition, text: &str, ctx: &TransitionContext<'_>) {
    let brand = &ctx.settings.brand_name;

    match text.to_ascii_lowercase().as_str() {
        "catalog" | "catalogue" => show_catalog(t, ctx),
        "new" => {
            t.session.reset();
            t.send(replies::catalog(brand));
        }
        "track" => start_tracking(t),
        _ => t.send(replies::welcome(brand)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn form_submitted(t: &mut Transition, form: FormSubmission, ctx: &TransitionContext<'_>) {
    if !matches!(
        t.session.step,
        Step::CheckoutForm | Step::AddressSelection | Step::AddressChoice { .. }
    ) || t.session.cart.is_empty()
    {
        t.send(replies::welcome(&ctx.settings.brand_name));
        return;
    }

    let name = non_blank(form.name);
    let email = form.email.as_deref().and_then(|e| Email::parse(e).ok());
    let mobile = form.mobile.as_deref().and_then(|m| PhoneNumber::parse(m).ok());
    let line = non_blank(form.address);
    let city = non_blank(form.city);
    let state = non_blank(form.state);
    let pincode = non_blank(form.pincode);

    let missing: Vec<&str> = [
        ("name", name.is_some()),
        ("email", email.is_some()),
        ("mobile", mobile.is_some()),
        ("address", line.is_some()),
        ("city", city.is_some()),
        ("state", state.is_some()),
        ("pincode", pincode.is_some()),
    ]
    .into_iter()
    .filter_map(|(field, present)| (!present).then_some(field))
    .collect();

    let (Some(name), Some(email), Some(mobile), Some(line), Some(city), Some(state), Some(pincode)) =
        (name, email, mobile, line, city, state, pincode)
    else {
        t.send(replies::form_incomplete(&missing));
        begin_entry(t, ctx);
        return;
    };

    let address = Address {
        id: None,
        line,
        city,
        state,
        pincode,
        country: ctx.settings.default_country.clone(),
        is_default: false,
    };
    t.session.customer.name = Some(name);
    t.session.customer.email = Some(email);
    t.session.customer.mobile = Some(mobile);
    t.session.address = Some(address.clone());
    t.session.delivery = Some(
        form.delivery_type
            .as_deref()
            .and_then(DeliveryType::from_input)
            .unwrap_or(DeliveryType::Ship),
    );
    t.session.discount = None;
    t.effect(Effect::SaveAddress(SavedAddress {
        customer: t.session.customer.clone(),
        address,
    }));

    match non_blank(form.discount_code) {
        Some(code) => {
            t.session.step = Step::DiscountInput;
            t.effect(Effect::ValidateDiscount(code));
        }
        None => t.session.step = Step::OrderSummary,
    }
}

fn existing_address(t: &mut Transition, found: Option<SavedAddress>, ctx: &TransitionContext<'_>) {
    if !matches!(t.session.step, Step::AddressSelection) {
        return;
    }

    match found {
        Some(saved) => {
            t.send(replies::address_found(&saved, &ctx.settings.brand_name));
            t.session.step = Step::AddressChoice {
                candidate: Box::new(saved),
            };
        }
        None => {
            t.send(replies::no_saved_address());
            begin_entry(t, ctx);
        }
    }
}

fn address_saved(t: &mut Transition, saved: bool, ctx: &TransitionContext<'_>) {
    t.send(if saved {
        replies::address_saved()
    } else {
        replies::address_not_saved()
    });

    match t.session.step {
        Step::DiscountOffer => show_discount_offer(t, ctx),
        Step::OrderSummary => show_summary(t, ctx),
        _ => {}
    }
}

fn discount_resolved(
    t: &mut Transition,
    code: String,
    outcome: DiscountOutcome,
    ctx: &TransitionContext<'_>,
) {
    if !matches!(t.session.step, Step::DiscountInput) {
        return;
    }
    let brand = &ctx.settings.brand_name;

    match outcome {
        DiscountOutcome::Valid(rule) => {
            apply_discount(t, code, rule, ctx);
            proceed_after_discount(t, ctx);
        }
        DiscountOutcome::Invalid => {
            t.session.step = Step::DiscountRetry;
            t.send(replies::discount_invalid(&code, brand));
        }
        DiscountOutcome::Unavailable => {
            t.session.step = Step::DiscountRetry;
            t.send(replies::discount_unavailable(&code, brand));
        }
    }
}

fn apply_discount(t: &mut Transition, code: String, rule: DiscountRule, ctx: &TransitionContext<'_>) {
    t.session.discount = Some(AppliedDiscount {
        code,
        rule,
        amount: Money::ZERO,
    });
    let quote = t.session.recompute_totals(&ctx.settings.policy);
    if let Some(discount) = &t.session.discount {
        let reply = replies::discount_applied(&discount.code, quote.discount);
        t.send(reply);
    }
}

fn payment_link_created(t: &mut Transition, link: PaymentLink) {
    if !matches!(t.session.step, Step::OrderSummary) {
        return;
    }
    t.send(replies::payment_link(&link.url));
    t.session.payment_reference = Some(link.reference);
    t.session.step = Step::AwaitingPayment;
}

fn payment_link_failed(t: &mut Transition, err: &PaymentError) {
    t.send(match err {
        PaymentError::MissingInfo(_) => replies::missing_information(),
        PaymentError::AlreadyRequested(_) => replies::already_processing(),
        PaymentError::Processor(_) => replies::payment_link_failed(),
    });
}

fn order_status_loaded(
    t: &mut Transition,
    name: &OrderName,
    result: Result<Option<OrderStatus>, CheckoutError>,
) {
    if !matches!(t.session.step, Step::TrackOrder) {
        return;
    }
    t.session.step = Step::Start;

    match result {
        Ok(Some(status)) => {
            if let Some(last) = t.session.last_order.as_mut()
                && last.order_name == status.name
            {
                last.fulfillment_status = status.fulfillment_status;
            }
            t.send(replies::order_status(&status));
        }
        Ok(None) => t.send(replies::order_not_found(name)),
        Err(_) => t.send(replies::order_lookup_failed()),
    }
}

/// Ask for contact and address, by form when the channel has one.
fn begin_entry(t: &mut Transition, ctx: &TransitionContext<'_>) {
    if let Some(forms) = &ctx.settings.capabilities.forms {
        let quote = t.session.quote(&ctx.settings.policy);
        t.send(replies::checkout_form(&t.session, &quote, forms));
        t.session.step = Step::CheckoutForm;
    } else {
        t.session.step = Step::CollectName;
        t.send(replies::ask_name());
    }
}

/// Adopt a saved address and whatever contact details came with it.
fn use_saved(t: &mut Transition, saved: SavedAddress) {
    let SavedAddress { customer, address } = saved;
    let current = &mut t.session.customer;
    current.name = customer.name.or_else(|| current.name.take());
    current.email = customer.email.or_else(|| current.email.take());
    current.mobile = customer.mobile.or_else(|| current.mobile.take());
    t.session.address = Some(address);
}

fn show_discount_offer(t: &mut Transition, ctx: &TransitionContext<'_>) {
    t.session.step = Step::DiscountOffer;
    t.send(replies::discount_offer(&ctx.settings.brand_name));
}

fn proceed_after_discount(t: &mut Transition, ctx: &TransitionContext<'_>) {
    if t.session.delivery.is_some() {
        show_summary(t, ctx);
    } else {
        t.session.step = Step::DeliveryChoice;
        t.send(replies::delivery_choice(&ctx.settings.brand_name));
    }
}

fn choose_delivery(t: &mut Transition, delivery: DeliveryType, ctx: &TransitionContext<'_>) {
    t.session.delivery = Some(delivery);
    show_summary(t, ctx);
}

fn show_summary(t: &mut Transition, ctx: &TransitionContext<'_>) {
    t.session.step = Step::OrderSummary;
    let quote = t.session.recompute_totals(&ctx.settings.policy);
    t.send(replies::order_summary(
        &t.session,
        &quote,
        &ctx.settings.brand_name,
    ));
}

fn confirm_payment(t: &mut Transition, ctx: &TransitionContext<'_>) {
    let settings = ctx.settings;
    t.session.recompute_totals(&settings.policy);

    match payment::check_ready(&t.session, &settings.dial_code, settings.currency) {
        Ok(_) => t.effect(Effect::RequestPaymentLink),
        Err(PaymentError::AlreadyRequested(_)) => t.send(replies::already_processing()),
        Err(_) => t.send(replies::missing_information()),
    }
}

fn show_catalog(t: &mut Transition, ctx: &TransitionContext<'_>) {
    let reply = match t.session.last_order.as_ref() {
        Some(order) if t.session.has_pending_order() => replies::recent_order(order),
        _ => replies::catalog(&ctx.settings.brand_name),
    };
    t.send(reply);
}

fn start_tracking(t: &mut Transition) {
    t.session.step = Step::TrackOrder;
    t.send(replies::ask_order_id());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::conversation::{CheckoutCapabilities, FormSettings};
    use crate::pricing::Quote;
    use crate::session::{Customer, LastOrder};
    use chat_checkout_core::{FinancialStatus, FulfillmentStatus, PaymentReference, ProductId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    const SOAP: &str = "41392567746606";
    const SERUM: &str = "41382358908974";

    struct Harness {
        catalog: Catalog,
        settings: CheckoutSettings,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                catalog: Catalog::bundled().unwrap(),
                settings: CheckoutSettings {
                    brand_name: "Test Shop".to_string(),
                    ..CheckoutSettings::default()
                },
            }
        }

        fn with_forms() -> Self {
            let mut harness = Self::new();
            harness.settings.capabilities = CheckoutCapabilities {
                forms: Some(FormSettings::default()),
            };
            harness
        }

        fn run(&self, session: Session, event: Event) -> Transition {
            let ctx = TransitionContext {
                catalog: &self.catalog,
                settings: &self.settings,
            };
            transition(session, event, &ctx)
        }

        /// Run a sequence of events, feeding no outcomes back.
        fn run_all(&self, session: Session, events: Vec<Event>) -> Transition {
            let mut last = Transition::new(session);
            for event in events {
                last = self.run(last.session, event);
            }
            last
        }
    }

    fn item(id: &str, price: Option<i64>, quantity: Option<u32>) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            price: price.map(Money::from_units),
            quantity,
        }
    }

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    fn contact() -> Customer {
        Customer {
            name: Some("Asha".to_string()),
            email: Some(Email::parse("asha@example.com").unwrap()),
            mobile: Some(PhoneNumber::parse("9876543210").unwrap()),
        }
    }

    fn summary_session(harness: &Harness) -> Session {
        let t = harness.run(
            Session::default(),
            Event::CartSubmitted(vec![item(SOAP, Some(80), Some(2))]),
        );
        let mut session = t.session;
        session.customer = contact();
        session.address = Some(Address {
            line: "No 1, Anna Street".to_string(),
            city: "Chennai".to_string(),
            state: "TN".to_string(),
            pincode: "600001".to_string(),
            country: "India".to_string(),
            ..Address::default()
        });
        session.step = Step::DeliveryChoice;
        harness.run(session, Event::Button(ButtonId::Ship)).session
    }

    #[test]
    fn test_cart_drops_unknown_products() {
        let harness = Harness::new();
        let t = harness.run(
            Session::default(),
            Event::CartSubmitted(vec![
                item(SOAP, Some(80), Some(2)),
                item("unknown", None, Some(1)),
            ]),
        );

        assert_eq!(t.session.step, Step::AddressSelection);
        assert_eq!(t.session.cart.len(), 1);
        assert_eq!(pricing::subtotal(&t.session.cart), Money::from_units(160));
        assert_eq!(
            t.replies()[0].button_ids(),
            vec![ButtonId::UseExisting, ButtonId::EnterNew]
        );
    }

    #[test]
    fn test_cart_merges_repeats_and_defaults_quantity() {
        let harness = Harness::new();
        let t = harness.run(
            Session::default(),
            Event::CartSubmitted(vec![
                item(SOAP, None, None),
                item(SERUM, None, Some(1)),
                item(SOAP, None, Some(2)),
            ]),
        );

        assert_eq!(t.session.cart.len(), 2);
        assert_eq!(t.session.cart[0].quantity, 3);
        assert_eq!(t.session.cart[0].unit_price, Money::from_units(80));
        assert_eq!(pricing::subtotal(&t.session.cart), Money::from_units(510));
    }

    #[test]
    fn test_cart_of_unknown_products_is_rejected() {
        let harness = Harness::new();
        let t = harness.run(
            Session::default(),
            Event::CartSubmitted(vec![item("nope", Some(10), Some(1))]),
        );
        assert_eq!(t.session, Session::default());
        assert_eq!(t.replies()[0], &replies::cart_empty());
    }

    #[test]
    fn test_greeting_resets_from_any_step() {
        let harness = Harness::new();
        let steps = [
            Step::AddressSelection,
            Step::CollectCity {
                line: "x".to_string(),
            },
            Step::DiscountRetry,
            Step::OrderSummary,
            Step::AwaitingPayment,
            Step::TrackOrder,
        ];

        for step in steps {
            let mut session = summary_session(&harness);
            session.step = step.clone();
            session.payment_reference = Some(PaymentReference::new("plink_1"));

            let t = harness.run(session, Event::Greeting);
            assert_eq!(t.session.step, Step::Start, "from {step}");
            assert!(t.session.cart.is_empty());
            assert!(t.session.address.is_none());
            assert!(t.session.discount.is_none());
            assert!(t.session.payment_reference.is_none());
            assert_eq!(t.replies()[0], &replies::welcome("Test Shop"));
        }
    }

    #[test]
    fn test_duplicate_cart_while_awaiting_payment() {
        let harness = Harness::new();
        let mut session = summary_session(&harness);
        session.step = Step::AwaitingPayment;
        session.payment_reference = Some(PaymentReference::new("plink_1"));
        let before = session.clone();

        let t = harness.run(
            session,
            Event::CartSubmitted(vec![item(SERUM, None, Some(5))]),
        );
        assert_eq!(t.session, before);
        assert_eq!(t.effects, vec![Effect::Send(replies::already_processing())]);

        let t = harness.run(t.session, Event::Button(ButtonId::ConfirmPayment));
        assert_eq!(t.session, before);
        assert_eq!(t.effects, vec![Effect::Send(replies::already_processing())]);
    }

    #[test]
    fn test_text_collection_path() {
        let harness = Harness::new();
        let mut session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, Some(1))]),
            )
            .session;
        session = harness.run(session, Event::Button(ButtonId::EnterNew)).session;
        assert_eq!(session.step, Step::CollectName);

        let t = harness.run_all(
            session,
            vec![
                text("Asha"),
                text("asha@example.com"),
                text("98765 43210"),
                text("No 1, Anna Street"),
                text("Chennai"),
                text("tn"),
                text("600001"),
            ],
        );

        assert_eq!(t.session.step, Step::DiscountOffer);
        let address = t.session.address.clone().unwrap();
        assert_eq!(address.state, "tn");
        assert_eq!(address.country, "India");
        assert!(matches!(&t.effects[..], [Effect::SaveAddress(saved)] if saved.address == address));

        let t = harness.run(t.session, Event::AddressSaved(true));
        assert_eq!(
            t.effects,
            vec![
                Effect::Send(replies::address_saved()),
                Effect::Send(replies::discount_offer("Test Shop")),
            ]
        );
    }

    #[test]
    fn test_invalid_email_keeps_step() {
        let harness = Harness::new();
        let session = Session {
            step: Step::CollectEmail,
            ..Session::default()
        };
        let t = harness.run(session, text("not-an-email"));
        assert_eq!(t.session.step, Step::CollectEmail);
        assert_eq!(t.replies()[0], &replies::invalid_email());

        let t = harness.run(
            Session {
                step: Step::CollectMobile,
                ..Session::default()
            },
            text("12345"),
        );
        assert_eq!(t.session.step, Step::CollectMobile);
        assert!(t.session.customer.mobile.is_none());
    }

    #[test]
    fn test_use_existing_found() {
        let harness = Harness::new();
        let session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, None)]),
            )
            .session;
        let t = harness.run(session, Event::Button(ButtonId::UseExisting));
        assert_eq!(t.effects, vec![Effect::FindExistingAddress]);

        let saved = SavedAddress {
            customer: contact(),
            address: Address {
                line: "12 MG Road".to_string(),
                state: "KA".to_string(),
                ..Address::default()
            },
        };
        let t = harness.run(t.session, Event::ExistingAddress(Some(saved.clone())));
        assert!(matches!(t.session.step, Step::AddressChoice { .. }));

        let t = harness.run(t.session, Event::Button(ButtonId::UseSaved));
        assert_eq!(t.session.step, Step::DiscountOffer);
        assert_eq!(t.session.address, Some(saved.address));
        assert_eq!(t.session.customer, contact());
    }

    #[test]
    fn test_use_existing_not_found_falls_back_to_questions() {
        let harness = Harness::new();
        let mut session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, None)]),
            )
            .session;
        session = harness.run(session, Event::Button(ButtonId::UseExisting)).session;

        let t = harness.run(session, Event::ExistingAddress(None));
        assert_eq!(t.session.step, Step::CollectName);
        assert_eq!(
            t.effects,
            vec![
                Effect::Send(replies::no_saved_address()),
                Effect::Send(replies::ask_name()),
            ]
        );
    }

    #[test]
    fn test_discount_valid_then_delivery() {
        let harness = Harness::new();
        let mut session = summary_session(&harness);
        session.delivery = None;
        session.step = Step::DiscountOffer;

        let t = harness.run(session, Event::Button(ButtonId::ApplyDiscount));
        assert_eq!(t.session.step, Step::DiscountInput);

        let t = harness.run(t.session, text("SAVE10"));
        assert_eq!(t.effects, vec![Effect::ValidateDiscount("SAVE10".to_string())]);

        let t = harness.run(
            t.session,
            Event::DiscountResolved {
                code: "SAVE10".to_string(),
                outcome: DiscountOutcome::Valid(DiscountRule::Percentage {
                    rate: Decimal::from(10),
                }),
            },
        );
        // Until delivery is chosen the quote assumes shipping to TN: 10% of 200
        assert_eq!(t.session.step, Step::DeliveryChoice);
        assert_eq!(t.session.discount_code(), Some("SAVE10"));
        assert_eq!(
            t.replies()[0],
            &replies::discount_applied("SAVE10", Money::from_units(20))
        );
        assert_eq!(t.session.totals.unwrap().grand_total, Money::from_units(180));

        // Pickup drops shipping and the discount follows the smaller base
        let t = harness.run(t.session, Event::Button(ButtonId::Pickup));
        assert_eq!(t.session.step, Step::OrderSummary);
        let totals = t.session.totals.unwrap();
        assert_eq!(totals.shipping, Money::ZERO);
        assert_eq!(totals.discount, Money::from_units(16));
        assert_eq!(totals.grand_total, Money::from_units(144));
    }

    #[test]
    fn test_discount_invalid_offers_retry() {
        let harness = Harness::new();
        let session = Session {
            step: Step::DiscountInput,
            ..summary_session(&harness)
        };
        let t = harness.run(
            session,
            Event::DiscountResolved {
                code: "BOGUS".to_string(),
                outcome: DiscountOutcome::Invalid,
            },
        );
        assert_eq!(t.session.step, Step::DiscountRetry);
        assert!(t.session.discount.is_none());
        assert_eq!(
            t.replies()[0].button_ids(),
            vec![ButtonId::RetryDiscount, ButtonId::SkipDiscount]
        );

        let t = harness.run(t.session, Event::Button(ButtonId::SkipDiscount));
        // delivery was already chosen
        assert_eq!(t.session.step, Step::OrderSummary);
    }

    #[test]
    fn test_pickup_zeroes_shipping() {
        let harness = Harness::new();
        let mut session = summary_session(&harness);
        session.step = Step::DeliveryChoice;
        let t = harness.run(session, Event::Button(ButtonId::Pickup));

        assert_eq!(t.session.step, Step::OrderSummary);
        let totals = t.session.totals.unwrap();
        assert_eq!(totals.shipping, Money::ZERO);
        assert_eq!(totals.grand_total, Money::from_units(160));
    }

    #[test]
    fn test_summary_recomputes_totals() {
        let harness = Harness::new();
        let mut session = summary_session(&harness);
        session.totals = Some(Quote {
            grand_total: Money::from_units(1),
            ..Quote::default()
        });
        session.step = Step::DeliveryChoice;

        let t = harness.run(session, Event::Button(ButtonId::Ship));
        assert_eq!(t.session.totals.unwrap().grand_total, Money::from_units(200));
    }

    #[test]
    fn test_confirm_payment_requests_link() {
        let harness = Harness::new();
        let session = summary_session(&harness);
        let t = harness.run(session, Event::Button(ButtonId::ConfirmPayment));
        assert_eq!(t.effects, vec![Effect::RequestPaymentLink]);

        let t = harness.run(
            t.session,
            Event::PaymentLinkCreated(PaymentLink {
                reference: PaymentReference::new("plink_1"),
                url: "https://rzp.io/i/abc".to_string(),
            }),
        );
        assert_eq!(t.session.step, Step::AwaitingPayment);
        assert_eq!(
            t.session.payment_reference,
            Some(PaymentReference::new("plink_1"))
        );
        assert!(t.replies()[0].body().contains("https://rzp.io/i/abc"));
    }

    #[test]
    fn test_confirm_payment_missing_info_makes_no_call() {
        let harness = Harness::new();
        let mut session = summary_session(&harness);
        session.customer.email = None;

        let t = harness.run(session, Event::Button(ButtonId::ConfirmPayment));
        assert_eq!(t.session.step, Step::OrderSummary);
        assert_eq!(t.effects, vec![Effect::Send(replies::missing_information())]);
    }

    #[test]
    fn test_payment_link_failure_keeps_step_and_totals() {
        let harness = Harness::new();
        let session = summary_session(&harness);
        let before = session.clone();

        let t = harness.run(
            session,
            Event::PaymentLinkFailed(PaymentError::Processor(CheckoutError::external(
                "razorpay", "502",
            ))),
        );
        assert_eq!(t.session, before);
        assert_eq!(t.replies()[0], &replies::payment_link_failed());
    }

    #[test]
    fn test_text_while_awaiting_payment() {
        let harness = Harness::new();
        let session = Session {
            step: Step::AwaitingPayment,
            ..Session::default()
        };
        let t = harness.run(session, text("catalog"));
        assert_eq!(t.replies()[0], &replies::awaiting_payment());
    }

    #[test]
    fn test_cancel_ends_session() {
        let harness = Harness::new();
        let t = harness.run(summary_session(&harness), Event::Button(ButtonId::CancelOrder));
        assert_eq!(
            t.effects,
            vec![
                Effect::Send(replies::order_cancelled()),
                Effect::EndSession
            ]
        );
    }

    #[test]
    fn test_button_out_of_step_shows_welcome() {
        let harness = Harness::new();
        let t = harness.run(Session::default(), Event::Button(ButtonId::Ship));
        assert_eq!(t.session, Session::default());
        assert_eq!(t.replies()[0], &replies::welcome("Test Shop"));

        let t = harness.run(Session::default(), Event::UnknownButton("x".to_string()));
        assert_eq!(t.replies()[0], &replies::welcome("Test Shop"));
    }

    #[test]
    fn test_catalog_with_pending_order() {
        let harness = Harness::new();
        let order = LastOrder {
            order_name: OrderName::new("#1001"),
            placed_at: Utc::now(),
            fulfillment_status: FulfillmentStatus::Unfulfilled,
        };
        let session = Session::with_last_order(Some(order.clone()));

        let t = harness.run(session.clone(), text("Catalog"));
        assert_eq!(t.replies()[0], &replies::recent_order(&order));

        let t = harness.run(session, text("new"));
        assert_eq!(t.replies()[0], &replies::catalog("Test Shop"));

        let fulfilled = LastOrder {
            fulfillment_status: FulfillmentStatus::Fulfilled,
            ..order
        };
        let t = harness.run(Session::with_last_order(Some(fulfilled)), text("Catalog"));
        assert_eq!(t.replies()[0], &replies::catalog("Test Shop"));
    }

    #[test]
    fn test_track_order() {
        let harness = Harness::new();
        let t = harness.run(Session::default(), Event::Button(ButtonId::Track));
        assert_eq!(t.session.step, Step::TrackOrder);

        let t = harness.run(t.session, text("1001"));
        assert_eq!(
            t.effects,
            vec![Effect::LookupOrder(OrderName::new("#1001"))]
        );

        let status = OrderStatus {
            name: OrderName::new("#1001"),
            financial_status: FinancialStatus::Paid,
            fulfillment_status: FulfillmentStatus::Fulfilled,
        };
        let t = harness.run(
            t.session,
            Event::OrderStatusLoaded {
                name: OrderName::new("#1001"),
                result: Ok(Some(status.clone())),
            },
        );
        assert_eq!(t.session.step, Step::Start);
        assert_eq!(t.replies()[0], &replies::order_status(&status));
    }

    #[test]
    fn test_track_order_not_found() {
        let harness = Harness::new();
        let session = Session {
            step: Step::TrackOrder,
            ..Session::default()
        };
        let t = harness.run(
            session,
            Event::OrderStatusLoaded {
                name: OrderName::new("#9"),
                result: Ok(None),
            },
        );
        assert_eq!(t.replies()[0], &replies::order_not_found(&OrderName::new("#9")));
    }

    #[test]
    fn test_enter_new_sends_form_when_enabled() {
        let harness = Harness::with_forms();
        let session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, None)]),
            )
            .session;
        let t = harness.run(session, Event::Button(ButtonId::EnterNew));
        assert_eq!(t.session.step, Step::CheckoutForm);
        assert!(matches!(t.replies()[0], Reply::Form { .. }));
    }

    #[test]
    fn test_form_with_discount_code() {
        let harness = Harness::with_forms();
        let mut session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, Some(2))]),
            )
            .session;
        session.step = Step::CheckoutForm;

        let form = FormSubmission {
            name: Some("Asha".to_string()),
            email: Some("asha@example.com".to_string()),
            mobile: Some("9876543210".to_string()),
            address: Some("No 1, Anna Street".to_string()),
            city: Some("Chennai".to_string()),
            state: Some("TN".to_string()),
            pincode: Some("600001".to_string()),
            delivery_type: Some("pickup".to_string()),
            discount_code: Some(" SAVE10 ".to_string()),
        };
        let t = harness.run(session, Event::FormSubmitted(form));

        assert_eq!(t.session.step, Step::DiscountInput);
        assert_eq!(t.session.delivery, Some(DeliveryType::Pickup));
        assert!(matches!(
            &t.effects[..],
            [Effect::SaveAddress(_), Effect::ValidateDiscount(code)] if code == "SAVE10"
        ));
    }

    #[test]
    fn test_form_without_code_goes_to_summary_after_save() {
        let harness = Harness::with_forms();
        let mut session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, Some(2))]),
            )
            .session;
        session.step = Step::CheckoutForm;

        let form = FormSubmission {
            name: Some("Asha".to_string()),
            email: Some("asha@example.com".to_string()),
            mobile: Some("9876543210".to_string()),
            address: Some("12 MG Road".to_string()),
            city: Some("Bengaluru".to_string()),
            state: Some("KA".to_string()),
            pincode: Some("560001".to_string()),
            ..FormSubmission::default()
        };
        let t = harness.run(session, Event::FormSubmitted(form));
        assert_eq!(t.session.step, Step::OrderSummary);

        let t = harness.run(t.session, Event::AddressSaved(false));
        assert_eq!(t.replies()[0], &replies::address_not_saved());
        assert_eq!(t.session.totals.unwrap().shipping, Money::from_units(80));
    }

    #[test]
    fn test_incomplete_form_is_resent() {
        let harness = Harness::with_forms();
        let mut session = harness
            .run(
                Session::default(),
                Event::CartSubmitted(vec![item(SOAP, None, None)]),
            )
            .session;
        session.step = Step::CheckoutForm;

        let form = FormSubmission {
            name: Some("Asha".to_string()),
            email: Some("bad".to_string()),
            ..FormSubmission::default()
        };
        let t = harness.run(session, Event::FormSubmitted(form));
        assert_eq!(t.session.step, Step::CheckoutForm);
        assert!(t.replies()[0].body().contains("email, mobile, address"));
        assert!(matches!(t.replies()[1], Reply::Form { .. }));
    }
}
