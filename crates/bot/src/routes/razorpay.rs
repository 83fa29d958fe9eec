//! Razorpay payment link webhook.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
};
use chat_checkout_core::{Money, PaymentReference};
use tracing::{debug, info, instrument, warn};

use crate::error::AppError;
use crate::finalizer::FinalizeOutcome;
use crate::razorpay::{WebhookEvent, verify_webhook_signature};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

const PAYMENT_RECEIVED_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1"><title>Payment received</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 3rem 1rem;">
<h1>Payment received</h1>
<p>Thank you! Your order confirmation will arrive on WhatsApp shortly.</p>
</body>
</html>
"#;

/// Create Razorpay routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/razorpay-webhook", get(landing).post(receive))
}

/// Page the buyer is redirected to after paying.
async fn landing() -> Html<&'static str> {
    Html(PAYMENT_RECEIVED_PAGE)
}

/// Handle a payment link event.
///
/// Only `payment_link.paid` is acted on. A failed order placement answers
/// 502 so Razorpay redelivers the event.
#[instrument(skip_all)]
async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if let Some(secret) = &state.secrets().razorpay_webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing signature header".into()))?;
        verify_webhook_signature(secret, &body, signature)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Failed to parse payload: {e}")))?;

    let Some(link) = event.paid_link() else {
        debug!(event = %event.event, "Ignoring payment event");
        return Ok(StatusCode::OK);
    };

    let reference = PaymentReference::new(link.id.clone());
    let paid = link.paid_minor_units().map(Money::from_minor_units);

    match state.finalizer().finalize(&reference, paid).await? {
        FinalizeOutcome::Ignored => {
            debug!(reference = %reference, "No pending checkout for payment");
            Ok(StatusCode::OK)
        }
        FinalizeOutcome::Placed(order) | FinalizeOutcome::AlreadyPlaced(order) => {
            info!(reference = %reference, order = %order, "Payment finalized");
            Ok(StatusCode::OK)
        }
        FinalizeOutcome::Failed { attempts } => {
            warn!(reference = %reference, attempts, "Order placement failed");
            Ok(StatusCode::BAD_GATEWAY)
        }
    }
}
