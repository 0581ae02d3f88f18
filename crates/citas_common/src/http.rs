use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{validation_error, CitasError, HttpStatusCode};

pub mod client;
pub mod cors;

/// Extension trait for CitasError to convert it to an Axum HTTP response.
pub trait IntoHttpResponse {
    /// Converts the error into an Axum HTTP response.
    fn into_http_response(self) -> Response;
}

impl IntoHttpResponse for CitasError {
    fn into_http_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self {
            CitasError::ConfigError(message) => {
                tracing::error!("Configuration error: {}", message);
                json!({ "error": "Server configuration error" })
            }
            CitasError::ValidationError(message) => json!({ "error": message }),
            CitasError::MethodNotAllowed => json!({ "error": "Method not allowed" }),
            CitasError::UpstreamError {
                service,
                message,
                details,
                ..
            } => {
                tracing::error!("{} error ({}): {}", service, status_code, details);
                json!({ "error": message, "details": details })
            }
            CitasError::HttpError(message) | CitasError::TimeoutError(message) => {
                tracing::error!("Upstream call failed: {}", message);
                json!({ "error": "Upstream service unavailable", "message": message })
            }
            CitasError::VerificationError {
                message,
                remaining_attempts,
            } => {
                let mut body = json!({ "success": false, "error": message });
                if let Some(remaining) = remaining_attempts {
                    body["remainingAttempts"] = json!(remaining);
                }
                body
            }
            CitasError::ParseError(message) | CitasError::InternalError(message) => {
                tracing::error!("Internal error: {}", message);
                json!({ "error": "Internal server error" })
            }
        };

        (status_code, Json(body)).into_response()
    }
}

/// Implement IntoResponse for CitasError so handlers can return it directly.
impl IntoResponse for CitasError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// Pulls a string out of a JSON value that may hold a string or a number.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decodes a JSON request body, reporting bad input as a 400 `{error}`.
///
/// Content-Type is not checked.
pub fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, CitasError> {
    serde_json::from_slice(body).map_err(|e| validation_error(format!("Invalid JSON body: {}", e)))
}
