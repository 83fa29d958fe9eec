//! WhatsApp Cloud API webhook.

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::error::AppError;
use crate::state::AppState;
use crate::whatsapp::{WebhookPayload, constant_time_compare, verify_signature};

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Create WhatsApp webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", get(verify).post(receive))
}

/// Query string of the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Echo the challenge when the verify token matches.
#[instrument(skip_all)]
async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String, AppError> {
    let expected = state.secrets().verify_token.expose_secret();
    let token_ok = params
        .verify_token
        .as_deref()
        .is_some_and(|token| constant_time_compare(token, expected));

    if params.mode.as_deref() == Some("subscribe") && token_ok {
        debug!("Webhook verified");
        return Ok(params.challenge.unwrap_or_default());
    }

    warn!(mode = ?params.mode, "Webhook verification rejected");
    Err(AppError::Forbidden("Verification failed".into()))
}

/// Handle inbound messages.
///
/// Each message is run through the checkout conversation in order. Once the
/// payload parses the response is always 200 so the gateway does not
/// redeliver; storage failures are logged.
#[instrument(skip_all)]
async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if let Some(secret) = &state.secrets().whatsapp_app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing signature header".into()))?;
        verify_signature(secret, &body, signature)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Failed to parse payload: {e}")))?;

    for message in payload.messages() {
        let id = message.sender();
        let Some(event) = message.to_event() else {
            debug!(kind = %message.kind, "Ignoring unsupported message");
            continue;
        };

        if let Err(e) = state.service().handle(&id, event).await {
            error!(identity = %id, error = %e, "Failed to handle message");
        }
    }

    Ok(StatusCode::OK)
}
