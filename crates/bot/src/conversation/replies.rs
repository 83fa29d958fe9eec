//! Buyer-facing message texts.

use std::fmt::Write as _;

use chat_checkout_core::{DeliveryType, Money, OrderName};
use serde_json::json;

use crate::address::SavedAddress;
use crate::commerce::OrderStatus;
use crate::messaging::{Button, ButtonId, Reply};
use crate::pricing::Quote;
use crate::session::{CartLine, LastOrder, Session};

use super::FormSettings;

fn buttons(header: &str, body: impl Into<String>, brand: &str, buttons: Vec<Button>) -> Reply {
    Reply::Buttons {
        header: Some(header.to_string()),
        body: body.into(),
        footer: Some(brand.to_string()),
        buttons,
    }
}

#[must_use]
pub fn welcome(brand: &str) -> Reply {
    buttons(
        &format!("🌿 Welcome to {brand}!"),
        "Welcome to our WhatsApp Shop! Choose an option below to get started.",
        brand,
        vec![
            Button::new(ButtonId::Catalog, "🛍️ View Catalog"),
            Button::new(ButtonId::Track, "📦 Track Order"),
        ],
    )
}

#[must_use]
pub fn catalog(brand: &str) -> Reply {
    Reply::Catalog {
        body: "🛍️ Browse our products catalog below:".to_string(),
        footer: Some(brand.to_string()),
    }
}

/// Sent by the messenger when the catalog message is rejected.
#[must_use]
pub fn catalog_fallback(url: &str) -> String {
    format!(
        "🛍️ You can browse our catalogue here: {url}. To order, choose the product and quantity from catalog and click place order to proceed to payment."
    )
}

fn cart_lines(cart: &[CartLine]) -> String {
    cart.iter().fold(String::new(), |mut out, line| {
        let _ = writeln!(
            out,
            "- {} x {} = {}",
            line.name,
            line.quantity,
            line.line_total()
        );
        out
    })
}

#[must_use]
pub fn cart_ready(cart: &[CartLine], subtotal: Money, brand: &str) -> Reply {
    buttons(
        "🛒 Cart Ready!",
        format!(
            "Cart Summary:\n{}\n💰 Total: {subtotal}\n\nChoose your address option:",
            cart_lines(cart)
        ),
        brand,
        vec![
            Button::new(ButtonId::UseExisting, "📍 Use Existing"),
            Button::new(ButtonId::EnterNew, "🆕 Enter New"),
        ],
    )
}

#[must_use]
pub fn cart_empty() -> Reply {
    Reply::text(
        "❌ None of the products in your cart are available right now. Please pick items from the catalog again.",
    )
}

#[must_use]
pub fn address_found(saved: &SavedAddress, brand: &str) -> Reply {
    let customer = &saved.customer;
    let address = &saved.address;
    let body = format!(
        "📍 Saved Address Found:\n\n👤 {}\n📧 {}\n📱 {}\n🏠 {}\n🏙️ {}, {} - {}\n\nWould you like to use this address?",
        customer.name.as_deref().unwrap_or("-"),
        customer.email.as_ref().map_or("-", |e| e.as_str()),
        customer.mobile.as_ref().map_or("-", |m| m.as_str()),
        address.line,
        address.city,
        address.state,
        address.pincode,
    );
    buttons(
        "Address Found!",
        body,
        brand,
        vec![
            Button::new(ButtonId::UseSaved, "✅ Use This"),
            Button::new(ButtonId::UseNew, "🆕 Use New"),
        ],
    )
}

#[must_use]
pub fn no_saved_address() -> Reply {
    Reply::text("❌ No saved address found for your number.")
}

#[must_use]
pub fn checkout_form(session: &Session, quote: &Quote, settings: &FormSettings) -> Reply {
    Reply::Form {
        header: "🛍️ Complete Your Order".to_string(),
        body: "Please fill out the form below to complete your order:".to_string(),
        cta: settings.cta.clone(),
        screen: settings.screen.clone(),
        data: json!({
            "cart_summary": cart_lines(&session.cart).trim_end(),
            "total_amount": quote.subtotal.amount().normalize().to_string(),
            "currency": "INR",
        }),
    }
}

#[must_use]
pub fn form_incomplete(fields: &[&str]) -> Reply {
    Reply::text(format!(
        "❌ Some details were missing or invalid: {}. Please fill out the form again.",
        fields.join(", ")
    ))
}

#[must_use]
pub fn ask_name() -> Reply {
    Reply::text("🧾 Please enter your *Name*")
}

#[must_use]
pub fn ask_email() -> Reply {
    Reply::text("📧 Please enter your *Email ID*")
}

#[must_use]
pub fn invalid_email() -> Reply {
    Reply::text("❌ That doesn't look like a valid email. 📧 Please enter your *Email ID*")
}

#[must_use]
pub fn ask_mobile() -> Reply {
    Reply::text("📱 Please enter your *Mobile Number*")
}

#[must_use]
pub fn invalid_mobile() -> Reply {
    Reply::text(
        "❌ Please enter a valid mobile number with 10 to 15 digits. 📱 Please enter your *Mobile Number*",
    )
}

#[must_use]
pub fn ask_address_line() -> Reply {
    Reply::text("🏠 Please enter your *Address* (Ex: No 1, Anna Street, Ganapathy Taluk)")
}

#[must_use]
pub fn ask_city() -> Reply {
    Reply::text("🏙️ Please enter your *City* (Ex: Chennai)")
}

#[must_use]
pub fn ask_state(home_state_name: &str, home_state_code: &str) -> Reply {
    Reply::text(format!(
        "🌆 Please enter your *State*.\n*NOTE:* If {home_state_name} enter *{home_state_code}*"
    ))
}

#[must_use]
pub fn ask_pincode() -> Reply {
    Reply::text("📮 Please enter your *Pincode*")
}

#[must_use]
pub fn address_saved() -> Reply {
    Reply::text(
        "💾 This address has been saved to the system. From your next order select \"Use Existing\" and use this address.",
    )
}

#[must_use]
pub fn address_not_saved() -> Reply {
    Reply::text(
        "⚠️ We couldn't save this address for next time, but your order can continue.",
    )
}

#[must_use]
pub fn discount_offer(brand: &str) -> Reply {
    buttons(
        "🎟️ Discount Code",
        "Would you like to apply a discount code to your order?",
        brand,
        vec![
            Button::new(ButtonId::ApplyDiscount, "🎟️ Apply Discount"),
            Button::new(ButtonId::SkipDiscount, "⏭️ Skip Discount"),
        ],
    )
}

#[must_use]
pub fn ask_discount_code() -> Reply {
    Reply::text("🎟️ Please enter your discount code:")
}

#[must_use]
pub fn discount_applied(code: &str, amount: Money) -> Reply {
    Reply::text(format!(
        "✅ Discount code \"{code}\" applied successfully! You'll save {amount}"
    ))
}

#[must_use]
pub fn discount_invalid(code: &str, brand: &str) -> Reply {
    buttons(
        "❌ Invalid Discount Code",
        format!(
            "Sorry, the discount code \"{code}\" is invalid or expired.\n\nWould you like to try another discount code?"
        ),
        brand,
        vec![
            Button::new(ButtonId::RetryDiscount, "🔄 Try Another"),
            Button::new(ButtonId::SkipDiscount, "⏭️ Skip Discount"),
        ],
    )
}

#[must_use]
pub fn discount_unavailable(code: &str, brand: &str) -> Reply {
    buttons(
        "⚠️ Discount Unavailable",
        format!(
            "We couldn't check the discount code \"{code}\" right now.\n\nWould you like to try again?"
        ),
        brand,
        vec![
            Button::new(ButtonId::RetryDiscount, "🔄 Try Again"),
            Button::new(ButtonId::SkipDiscount, "⏭️ Skip Discount"),
        ],
    )
}

#[must_use]
pub fn delivery_choice(brand: &str) -> Reply {
    buttons(
        "🚚 Delivery Method",
        "Please choose your preferred delivery method:",
        brand,
        vec![
            Button::new(ButtonId::Ship, "🚚 Ship to Address"),
            Button::new(ButtonId::Pickup, "🏪 Store Pickup"),
        ],
    )
}

#[must_use]
pub fn order_summary(session: &Session, quote: &Quote, brand: &str) -> Reply {
    let mut body = format!(
        "Thank you {}!\n\n📦 Items Total: {}",
        session.customer.name.as_deref().unwrap_or("there"),
        quote.subtotal
    );
    if let Some(code) = session.discount_code().filter(|_| quote.discount.is_positive()) {
        let _ = write!(body, "\n🎟️ Discount Applied: -{} ({code})", quote.discount);
    }
    let _ = write!(
        body,
        "\n🚚 Shipping: {}\n💰 *Grand Total: {}*",
        quote.shipping, quote.grand_total
    );
    if let Some(address) = &session.address {
        let _ = write!(body, "\n\nShipping to:\n{}", address.one_line());
    }
    let method = match session.delivery {
        Some(DeliveryType::Pickup) => "🏪 Pickup from Store",
        Some(DeliveryType::Ship) | None => "🚚 Ship to Address",
    };
    let _ = write!(body, "\nDelivery Method: {method}");

    buttons(
        "✅ Order Summary",
        body,
        brand,
        vec![
            Button::new(ButtonId::ConfirmPayment, "💳 Proceed to Payment"),
            Button::new(ButtonId::CancelOrder, "❌ Cancel Order"),
        ],
    )
}

#[must_use]
pub fn payment_link(url: &str) -> Reply {
    Reply::text(format!(
        "💳 Complete your payment:\n{url}\n\nWe'll confirm your order once payment is completed."
    ))
}

#[must_use]
pub fn missing_information() -> Reply {
    Reply::text("❌ Missing order information. Please start over by typing \"Hi\".")
}

#[must_use]
pub fn payment_link_failed() -> Reply {
    Reply::text("❌ Failed to generate payment link. Please try again.")
}

#[must_use]
pub fn awaiting_payment() -> Reply {
    Reply::text("⏳ Awaiting payment confirmation...")
}

#[must_use]
pub fn already_processing() -> Reply {
    Reply::text("🛒 Your order is already being processed.")
}

#[must_use]
pub fn order_cancelled() -> Reply {
    Reply::text("❌ Order cancelled. Type \"Hi\" to start over.")
}

#[must_use]
pub fn ask_order_id() -> Reply {
    Reply::text("Please enter your *Order ID* to track your order.")
}

#[must_use]
pub fn order_status(status: &OrderStatus) -> Reply {
    Reply::text(format!(
        "✅ Order ID: {}\nPayment Status: {}\nFulfillment Status: {}\n\nMessage *Hi* to restart the bot.",
        status.name, status.financial_status, status.fulfillment_status
    ))
}

#[must_use]
pub fn order_not_found(name: &OrderName) -> Reply {
    Reply::text(format!(
        "❌ No order found with ID {name}. Please check and try again. Message *Hi* to restart the bot."
    ))
}

#[must_use]
pub fn order_lookup_failed() -> Reply {
    Reply::text(
        "❌ Failed to fetch order details. Please try again later.\n\nMessage *Hi* to restart the bot.",
    )
}

#[must_use]
pub fn recent_order(order: &LastOrder) -> Reply {
    Reply::text(format!(
        "🧾 Your recent order is already being processed.\n\n*ORDER ID:* {}\n*ORDER DATE:* {}\n*STATUS:* {}\n\nIf you want to place another order, message *New*.",
        order.order_name,
        order.placed_at.format("%d/%m/%Y"),
        order.fulfillment_status
    ))
}

#[must_use]
pub fn order_placed(name: &OrderName) -> Reply {
    Reply::text(format!(
        "✅ Order placed! 🧾\nOrder ID: *{name}*\nThank you for shopping with us!\n\nTo track your order send *Hi*"
    ))
}

#[must_use]
pub fn order_failed() -> Reply {
    Reply::text(
        "❌ Failed to create your order. Your payment is safe; we'll place the order shortly or contact you.",
    )
}
