// --- File: crates/citas_whatsapp/src/companion/handlers.rs ---
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{SecondsFormat, Utc};
use citas_common::value_as_string;
use citas_config::WhatsAppServiceConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::gateway::{SessionStatus, WhatsAppGateway};
use crate::message::verification_message;
use crate::phone::{chat_id, format_phone};
use crate::qr::qr_data_url;
use crate::verification::{VerificationError, VerificationManager};

pub struct CompanionState {
    pub config: WhatsAppServiceConfig,
    pub manager: Arc<VerificationManager>,
    pub gateway: Arc<dyn WhatsAppGateway>,
    pub started: Instant,
}

impl CompanionState {
    pub fn new(
        config: WhatsAppServiceConfig,
        manager: Arc<VerificationManager>,
        gateway: Arc<dyn WhatsAppGateway>,
    ) -> Self {
        Self {
            config,
            manager,
            gateway,
            started: Instant::now(),
        }
    }

    /// Gateway session, or `None` when the gateway cannot be reached.
    async fn session(&self) -> Option<SessionStatus> {
        match self.gateway.session_status().await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!("WhatsApp gateway unreachable: {}", err);
                None
            }
        }
    }

    async fn is_connected(&self) -> bool {
        self.session().await.is_some_and(|s| s.is_connected())
    }
}

/// `{success:false, error, remainingAttempts?}` with a status code.
#[derive(Debug)]
pub struct CompanionFailure {
    pub status: StatusCode,
    pub body: FailureBody,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u8>,
}

impl CompanionFailure {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: FailureBody {
                success: false,
                error: error.into(),
                remaining_attempts: None,
            },
        }
    }
}

impl IntoResponse for CompanionFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<VerificationError> for CompanionFailure {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Store(msg) => {
                error!("Verification store error: {}", msg);
                CompanionFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            other => CompanionFailure {
                status: StatusCode::BAD_REQUEST,
                body: FailureBody {
                    success: false,
                    remaining_attempts: other.remaining_attempts(),
                    error: other.to_string(),
                },
            },
        }
    }
}

// --- Health ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// `connected` or `disconnected`
    pub whatsapp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: String,
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service liveness and session state", body = HealthResponse)),
    tag = "WhatsApp companion"
))]
pub async fn health_handler(State(state): State<Arc<CompanionState>>) -> Json<HealthResponse> {
    let session = state.session().await;
    let connected = session.as_ref().is_some_and(SessionStatus::is_connected);
    Json(HealthResponse {
        status: "ok".to_string(),
        whatsapp: if connected { "connected" } else { "disconnected" }.to_string(),
        name: session.and_then(|s| s.name).filter(|_| connected),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

// --- QR ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Deserialize)]
pub struct QrResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// PNG data URL of the pairing code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    pub connected: bool,
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/qr",
    responses(
        (status = 200, description = "Pairing QR, or the reason there is none", body = QrResponse),
        (status = 401, description = "Missing or wrong X-Api-Key", body = FailureBody),
        (status = 500, description = "QR rendering failed", body = FailureBody)
    ),
    tag = "WhatsApp companion"
))]
pub async fn qr_handler(
    State(state): State<Arc<CompanionState>>,
) -> Result<Json<QrResponse>, CompanionFailure> {
    if state.is_connected().await {
        return Ok(Json(QrResponse {
            success: true,
            message: Some("WhatsApp ya está conectado".to_string()),
            qr: None,
            connected: true,
        }));
    }

    let pairing = state.gateway.pairing_code().await.unwrap_or_else(|err| {
        warn!("Could not fetch pairing code: {}", err);
        None
    });
    let Some(pairing) = pairing else {
        return Ok(Json(QrResponse {
            success: false,
            message: Some("QR no disponible aún, espera unos segundos...".to_string()),
            qr: None,
            connected: false,
        }));
    };

    let qr = qr_data_url(&pairing).map_err(|err| {
        error!("QR rendering failed: {}", err);
        CompanionFailure::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;
    Ok(Json(QrResponse {
        success: true,
        message: None,
        qr: Some(qr),
        connected: false,
    }))
}

// --- Send code ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Default, Deserialize)]
pub struct SendCodeRequest {
    /// Phone number in any format; numbers are accepted too
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub phone: Option<Value>,
    pub nombre: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResponse {
    pub success: bool,
    pub message: String,
    /// Seconds until the code expires
    pub expires_in: i64,
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued and sent", body = SendCodeResponse),
        (status = 400, description = "Missing phone", body = FailureBody),
        (status = 503, description = "WhatsApp session not connected", body = FailureBody),
        (status = 500, description = "Message could not be sent", body = FailureBody)
    ),
    tag = "WhatsApp companion"
))]
pub async fn send_code_handler(
    State(state): State<Arc<CompanionState>>,
    body: Bytes,
) -> Result<Json<SendCodeResponse>, CompanionFailure> {
    let request: SendCodeRequest = serde_json::from_slice(&body).unwrap_or_default();
    let phone = request
        .phone
        .as_ref()
        .and_then(value_as_string)
        .map(|p| format_phone(&p))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CompanionFailure::new(StatusCode::BAD_REQUEST, "Teléfono requerido"))?;

    if !state.is_connected().await {
        return Err(CompanionFailure::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "WhatsApp no está conectado. Escanea el QR primero.",
        ));
    }

    let code = state.manager.issue_code(&phone).await?;
    let text = verification_message(
        &state.config.brand_name,
        request.nombre.as_deref(),
        &code,
        state.manager.ttl_secs(),
    );

    if let Err(err) = state.gateway.send_text(&chat_id(&phone), &text).await {
        error!("Sending verification code to {} failed: {}", phone, err);
        return Err(CompanionFailure::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error al enviar el mensaje. Verifica el número.",
        ));
    }

    info!("Verification code sent to {}", phone);
    Ok(Json(SendCodeResponse {
        success: true,
        message: "Código enviado por WhatsApp".to_string(),
        expires_in: state.manager.ttl_secs(),
    }))
}

// --- Verify code ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Default, Deserialize)]
pub struct VerifyCodeRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub phone: Option<Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub code: Option<Value>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub message: String,
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Phone verified", body = VerifyCodeResponse),
        (status = 400, description = "Missing fields, or the code was rejected", body = FailureBody)
    ),
    tag = "WhatsApp companion"
))]
pub async fn verify_code_handler(
    State(state): State<Arc<CompanionState>>,
    body: Bytes,
) -> Result<Json<VerifyCodeResponse>, CompanionFailure> {
    let request: VerifyCodeRequest = serde_json::from_slice(&body).unwrap_or_default();
    let phone = request.phone.as_ref().and_then(value_as_string).map(|p| format_phone(&p));
    let code = request.code.as_ref().and_then(value_as_string);
    let (Some(phone), Some(code)) = (phone.filter(|p| !p.is_empty()), code) else {
        return Err(CompanionFailure::new(
            StatusCode::BAD_REQUEST,
            "Teléfono y código requeridos",
        ));
    };

    state.manager.check_code(&phone, &code).await?;
    Ok(Json(VerifyCodeResponse {
        success: true,
        message: "Número verificado correctamente".to_string(),
    }))
}

// --- Status ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub whatsapp_connected: bool,
    pub pending_verifications: usize,
    /// Seconds since the service started
    pub uptime: f64,
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Session state, pending codes and uptime", body = StatusResponse),
        (status = 401, description = "Missing or wrong X-Api-Key", body = FailureBody)
    ),
    tag = "WhatsApp companion"
))]
pub async fn status_handler(
    State(state): State<Arc<CompanionState>>,
) -> Result<Json<StatusResponse>, CompanionFailure> {
    Ok(Json(StatusResponse {
        whatsapp_connected: state.is_connected().await,
        pending_verifications: state.manager.pending().await?,
        uptime: state.started.elapsed().as_secs_f64(),
    }))
}
