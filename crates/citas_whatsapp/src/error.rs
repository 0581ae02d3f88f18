use citas_common::{upstream_error, CitasError, HttpStatusCode};
use serde_json::Value;
use thiserror::Error;

pub const GATEWAY_SERVICE: &str = "WhatsApp gateway";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway returned {status}")]
    Api { status: u16, details: Value },

    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),
}

impl HttpStatusCode for GatewayError {
    fn status_code(&self) -> u16 {
        match self {
            GatewayError::Request(err) if err.is_timeout() => 504,
            GatewayError::Request(_) => 502,
            GatewayError::Api { status, .. } => *status,
            GatewayError::UnexpectedResponse(_) => 500,
        }
    }
}

impl From<GatewayError> for CitasError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Request(e) => CitasError::from(e),
            GatewayError::Api { status, details } => upstream_error(
                GATEWAY_SERVICE,
                status,
                "Error talking to the WhatsApp gateway",
                details,
            ),
            GatewayError::UnexpectedResponse(msg) => CitasError::ParseError(msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum QrError {
    #[error("QR encode error: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("PNG encode error: {0}")]
    Image(#[from] image::ImageError),
}
