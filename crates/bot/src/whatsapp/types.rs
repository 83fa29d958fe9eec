//! Outbound message payloads for the Cloud API `/messages` endpoint.

use serde::Serialize;
use serde_json::Value;

use crate::messaging::Button;

/// One message to one recipient.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: String,
    #[serde(flatten)]
    pub content: Content,
}

impl OutboundMessage {
    pub fn new(to: impl Into<String>, content: Content) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: to.into(),
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: TextBody },
    Interactive { interactive: Interactive },
}

impl Content {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            text: TextBody {
                body: body.into(),
                preview_url: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBody {
    pub body: String,
    pub preview_url: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Text {
    pub text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Header {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl Header {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text",
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interactive {
    Button {
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<Header>,
        body: Text,
        #[serde(skip_serializing_if = "Option::is_none")]
        footer: Option<Text>,
        action: ButtonAction,
    },
    Flow {
        header: Header,
        body: Text,
        action: FlowAction,
    },
    CatalogMessage {
        body: Text,
        #[serde(skip_serializing_if = "Option::is_none")]
        footer: Option<Text>,
        action: CatalogAction,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ButtonAction {
    pub buttons: Vec<ReplyButton>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyButton {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub reply: ReplyButtonBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyButtonBody {
    pub id: &'static str,
    pub title: String,
}

impl From<&Button> for ReplyButton {
    fn from(button: &Button) -> Self {
        Self {
            kind: "reply",
            reply: ReplyButtonBody {
                id: button.id.as_str(),
                title: button.title.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowAction {
    pub name: &'static str,
    pub parameters: FlowParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowParameters {
    pub flow_message_version: &'static str,
    pub flow_token: String,
    pub flow_id: String,
    pub flow_cta: String,
    pub flow_action: &'static str,
    pub flow_action_payload: FlowPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowPayload {
    pub screen: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogAction {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<CatalogParameters>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogParameters {
    pub thumbnail_product_retailer_id: String,
}

/// Successful `/messages` response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SentMessage {
    pub id: String,
}
