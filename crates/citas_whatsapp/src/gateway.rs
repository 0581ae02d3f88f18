//! Client for the chat-automation gateway that holds the WhatsApp session.
//!
//! The gateway speaks a WAHA-style HTTP API: one named session, a raw pairing
//! string while unpaired, and a `sendText` endpoint once the session is `WORKING`.

use citas_common::services::BoxFuture;
use citas_common::{is_success, read_body, HTTP_CLIENT};
use citas_config::WhatsAppServiceConfig;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::GatewayError;

pub const API_KEY_HEADER: &str = "X-Api-Key";
const WORKING: &str = "WORKING";

/// Session state as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub status: String,
    /// Display name of the paired account, when connected.
    pub name: Option<String>,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.status == WORKING
    }
}

pub trait WhatsAppGateway: Send + Sync {
    fn session_status(&self) -> BoxFuture<'_, SessionStatus, GatewayError>;

    /// Raw pairing string to render as a QR, `None` while the gateway has none.
    fn pairing_code(&self) -> BoxFuture<'_, Option<String>, GatewayError>;

    fn send_text<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BoxFuture<'a, (), GatewayError>;
}

#[derive(Deserialize)]
struct SessionMe {
    #[serde(rename = "pushName")]
    push_name: Option<String>,
}

#[derive(Deserialize)]
struct SessionInfo {
    status: String,
    me: Option<SessionMe>,
}

#[derive(Clone)]
pub struct HttpWhatsAppGateway {
    base_url: String,
    session: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpWhatsAppGateway {
    pub fn new(base_url: &str, session: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session: session.to_string(),
            api_key,
            client: HTTP_CLIENT.clone(),
        }
    }

    pub fn from_config(config: &WhatsAppServiceConfig) -> Self {
        Self::new(
            &config.gateway_url,
            &config.session,
            config.gateway_api_key().map(str::to_string),
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

impl WhatsAppGateway for HttpWhatsAppGateway {
    fn session_status(&self) -> BoxFuture<'_, SessionStatus, GatewayError> {
        Box::pin(async move {
            let url = format!("{}/api/sessions/{}", self.base_url, self.session);
            let response = self.authorized(self.client.get(&url)).send().await?;
            let (status, body) = read_body(response).await?;
            if !is_success(status) {
                return Err(GatewayError::Api { status, details: body });
            }
            let info: SessionInfo = serde_json::from_value(body)
                .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;
            Ok(SessionStatus {
                status: info.status,
                name: info.me.and_then(|me| me.push_name),
            })
        })
    }

    fn pairing_code(&self) -> BoxFuture<'_, Option<String>, GatewayError> {
        Box::pin(async move {
            let url = format!("{}/api/{}/auth/qr", self.base_url, self.session);
            let response = self
                .authorized(self.client.get(&url).query(&[("format", "raw")]))
                .send()
                .await?;
            let (status, body) = read_body(response).await?;
            if status == 404 {
                return Ok(None);
            }
            if !is_success(status) {
                return Err(GatewayError::Api { status, details: body });
            }
            let value = body
                .get("value")
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            if value.is_none() {
                debug!("Gateway has no pairing code yet");
            }
            Ok(value)
        })
    }

    fn send_text<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BoxFuture<'a, (), GatewayError> {
        Box::pin(async move {
            let url = format!("{}/api/sendText", self.base_url);
            let payload = json!({
                "session": self.session,
                "chatId": chat_id,
                "text": text,
            });
            let response = self
                .authorized(self.client.post(&url).json(&payload))
                .send()
                .await?;
            let (status, body) = read_body(response).await?;
            if !is_success(status) {
                return Err(GatewayError::Api { status, details: body });
            }
            Ok(())
        })
    }
}

pub fn gateway_from_config(config: &WhatsAppServiceConfig) -> Arc<dyn WhatsAppGateway> {
    Arc::new(HttpWhatsAppGateway::from_config(config))
}
