//! WhatsApp Cloud API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_checkout_core::{ConversationId, ProductId};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::error::{GraphErrorResponse, WhatsAppError};
use super::types::{
    ButtonAction, CatalogAction, CatalogParameters, Content, FlowAction, FlowParameters,
    FlowPayload, Header, Interactive, OutboundMessage, ReplyButton, SendResponse, Text,
};
use crate::config::WhatsAppConfig;
use crate::conversation::replies;
use crate::error::CheckoutError;
use crate::messaging::{Button, Messenger, Reply};

/// Sends messages through the Cloud API.
#[derive(Clone)]
pub struct WhatsAppClient {
    inner: Arc<WhatsAppClientInner>,
}

struct WhatsAppClientInner {
    client: reqwest::Client,
    messages_url: String,
    access_token: SecretString,
    flow_id: Option<String>,
    catalog_thumbnail_id: Option<ProductId>,
    catalog_fallback_url: Option<String>,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("messages_url", &self.inner.messages_url)
            .field("access_token", &"[REDACTED]")
            .field("flow_id", &self.inner.flow_id)
            .finish_non_exhaustive()
    }
}

impl WhatsAppClient {
    /// Create a client for the configured phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &WhatsAppConfig, timeout: Duration) -> Result<Self, WhatsAppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(WhatsAppClientInner {
                client,
                messages_url: config.messages_url(),
                access_token: config.access_token.clone(),
                flow_id: config.checkout_flow_id.clone(),
                catalog_thumbnail_id: config.catalog_thumbnail_id.clone(),
                catalog_fallback_url: config.catalog_fallback_url.clone(),
            }),
        })
    }

    /// Post one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, message), fields(to = %message.to))]
    pub async fn post(&self, message: &OutboundMessage) -> Result<SendResponse, WhatsAppError> {
        let response = self
            .inner
            .client
            .post(&self.inner.messages_url)
            .bearer_auth(self.inner.access_token.expose_secret())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let sent: SendResponse = response.json().await?;
            debug!(id = ?sent.messages.first().map(|m| &m.id), "Message sent");
            return Ok(sent);
        }

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => WhatsAppError::RateLimited,
            StatusCode::UNAUTHORIZED => {
                WhatsAppError::Unauthorized("Access token rejected".to_string())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<GraphErrorResponse>(&body)
                    .map_or(body, |e| e.error.message);
                WhatsAppError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        })
    }

    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is rejected.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), WhatsAppError> {
        self.post(&OutboundMessage::new(to, Content::text(body)))
            .await
            .map(|_| ())
    }

    /// Send a message with reply buttons.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is rejected.
    pub async fn send_buttons(
        &self,
        to: &str,
        header: Option<&str>,
        body: &str,
        footer: Option<&str>,
        buttons: &[Button],
    ) -> Result<(), WhatsAppError> {
        let interactive = Interactive::Button {
            header: header.map(Header::text),
            body: Text::new(body),
            footer: footer.map(Text::new),
            action: ButtonAction {
                buttons: buttons.iter().map(ReplyButton::from).collect(),
            },
        };
        self.post(&OutboundMessage::new(to, Content::Interactive { interactive }))
            .await
            .map(|_| ())
    }

    /// Open the checkout form. Without a configured flow this sends the
    /// body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is rejected.
    pub async fn send_flow(
        &self,
        to: &str,
        header: &str,
        body: &str,
        cta: &str,
        screen: &str,
        data: Value,
    ) -> Result<(), WhatsAppError> {
        let Some(flow_id) = &self.inner.flow_id else {
            warn!("Form requested without a flow id, sending text");
            return self.send_text(to, body).await;
        };

        let interactive = Interactive::Flow {
            header: Header::text(header),
            body: Text::new(body),
            action: FlowAction {
                name: "flow",
                parameters: FlowParameters {
                    flow_message_version: "3",
                    flow_token: Uuid::new_v4().simple().to_string(),
                    flow_id: flow_id.clone(),
                    flow_cta: cta.to_string(),
                    flow_action: "navigate",
                    flow_action_payload: FlowPayload {
                        screen: screen.to_string(),
                        data,
                    },
                },
            },
        };
        self.post(&OutboundMessage::new(to, Content::Interactive { interactive }))
            .await
            .map(|_| ())
    }

    /// Send the catalog browser, falling back to a text link when the
    /// catalog message is rejected and a link is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if both the catalog and the fallback fail.
    pub async fn send_catalog(
        &self,
        to: &str,
        body: &str,
        footer: Option<&str>,
    ) -> Result<(), WhatsAppError> {
        let interactive = Interactive::CatalogMessage {
            body: Text::new(body),
            footer: footer.map(Text::new),
            action: CatalogAction {
                name: "catalog_message",
                parameters: self.inner.catalog_thumbnail_id.as_ref().map(|id| {
                    CatalogParameters {
                        thumbnail_product_retailer_id: id.to_string(),
                    }
                }),
            },
        };

        match self
            .post(&OutboundMessage::new(to, Content::Interactive { interactive }))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let Some(url) = &self.inner.catalog_fallback_url else {
                    return Err(e);
                };
                warn!(error = %e, "Catalog message failed, sending link");
                self.send_text(to, &replies::catalog_fallback(url)).await
            }
        }
    }
}

#[async_trait]
impl Messenger for WhatsAppClient {
    async fn send(&self, to: &ConversationId, reply: &Reply) -> Result<(), CheckoutError> {
        let to = to.as_str();
        let result = match reply {
            Reply::Text(body) => self.send_text(to, body).await,
            Reply::Buttons {
                header,
                body,
                footer,
                buttons,
            } => {
                self.send_buttons(to, header.as_deref(), body, footer.as_deref(), buttons)
                    .await
            }
            Reply::Form {
                header,
                body,
                cta,
                screen,
                data,
            } => {
                self.send_flow(to, header, body, cta, screen, data.clone())
                    .await
            }
            Reply::Catalog { body, footer } => {
                self.send_catalog(to, body, footer.as_deref()).await
            }
        };
        result.map_err(CheckoutError::from)
    }
}
