// --- File: crates/citas_whatsapp/src/handlers.rs ---
//! Backend-side proxy to the companion verification service.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::Json,
};
use citas_common::{read_body, HTTP_CLIENT};
use citas_config::AppConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::gateway::API_KEY_HEADER;

const UNREACHABLE: &str =
    "No se pudo conectar con el servicio de verificación. Intenta más tarde.";

#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub client: Client,
}

impl ProxyState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            client: HTTP_CLIENT.clone(),
        }
    }

    fn service_url(&self) -> Option<&str> {
        self.config.whatsapp.as_ref().and_then(|w| w.service_url())
    }

    fn api_key(&self) -> Option<&str> {
        self.config.whatsapp.as_ref().and_then(|w| w.api_key())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    /// `send-code`, `verify-code` or `status`
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAction {
    SendCode,
    VerifyCode,
    Status,
}

impl ProxyAction {
    pub fn parse(action: Option<&str>) -> Option<Self> {
        match action? {
            "send-code" => Some(ProxyAction::SendCode),
            "verify-code" => Some(ProxyAction::VerifyCode),
            "status" => Some(ProxyAction::Status),
            _ => None,
        }
    }

    /// Companion path this action is relayed to.
    pub fn path(self) -> &'static str {
        match self {
            ProxyAction::SendCode => "/send-code",
            ProxyAction::VerifyCode => "/verify-code",
            ProxyAction::Status => "/health",
        }
    }
}

type ProxyReply = (StatusCode, Json<Value>);

fn failure(status: StatusCode, error: &str) -> ProxyReply {
    (status, Json(json!({ "success": false, "error": error })))
}

fn unreachable_status() -> ProxyReply {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "success": false, "status": "disconnected", "error": UNREACHABLE })),
    )
}

/// Reduces the companion's `/health` reply to `{success, status, name?}`.
fn status_summary(health: &Value) -> Value {
    let whatsapp = health
        .get("whatsapp")
        .and_then(Value::as_str)
        .unwrap_or("disconnected");
    let mut summary = json!({
        "success": whatsapp == "connected",
        "status": whatsapp,
    });
    if let Some(name) = health.get("name").and_then(Value::as_str) {
        summary["name"] = json!(name);
    }
    summary
}

/// Relays phone-verification actions to the companion service.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/whatsapp-verify",
    params(ProxyQuery),
    request_body = Value,
    responses(
        (status = 200, description = "Companion reply relayed as-is; `status` is summarised", body = Value),
        (status = 400, description = "Unknown action, or the companion rejected the request", body = Value),
        (status = 405, description = "send-code / verify-code called without POST", body = Value),
        (status = 500, description = "Companion URL not configured", body = Value),
        (status = 503, description = "Companion unreachable", body = Value)
    ),
    tag = "WhatsApp"
))]
pub async fn whatsapp_verify_handler(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    Query(query): Query<ProxyQuery>,
    body: Bytes,
) -> ProxyReply {
    let Some(base_url) = state.service_url() else {
        error!("WhatsApp companion URL is not configured");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "WhatsApp service not configured. Set CITAS__WHATSAPP__SERVICE_URL in environment.",
        );
    };

    let Some(action) = ProxyAction::parse(query.action.as_deref()) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Invalid action. Use: send-code, verify-code, or status",
        );
    };

    if action != ProxyAction::Status && method != Method::POST {
        return failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let url = format!("{}{}", base_url, action.path());
    let request = match action {
        ProxyAction::Status => state.client.get(&url),
        ProxyAction::SendCode | ProxyAction::VerifyCode => {
            let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));
            state.client.post(&url).json(&payload)
        }
    };
    let request = match state.api_key() {
        Some(key) => request.header(API_KEY_HEADER, key),
        None => request,
    };

    let (status, reply) = match request.send().await {
        Ok(response) => match read_body(response).await {
            Ok(read) => read,
            Err(err) => {
                error!("Companion reply could not be read: {}", err);
                return unreachable_status();
            }
        },
        Err(err) => {
            error!("WhatsApp companion unreachable at {}: {}", url, err);
            return unreachable_status();
        }
    };

    if !reply.is_object() {
        error!("Companion answered {} with a non-JSON body", status);
        return unreachable_status();
    }
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    info!("WhatsApp {:?} relayed with {}", action, status);

    if action == ProxyAction::Status && status.is_success() {
        return (status, Json(status_summary(&reply)));
    }
    (status, Json(reply))
}
