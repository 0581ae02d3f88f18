use citas_common::error::{
    config_error, upstream_error, validation_error, CitasError, HttpStatusCode,
};
use serde_json::Value;
use thiserror::Error;

pub const MERCADOPAGO_SERVICE: &str = "MercadoPago";

#[derive(Error, Debug)]
pub enum MercadoPagoError {
    #[error("MercadoPago access token is not configured")]
    NotConfigured,

    #[error("MercadoPago request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("MercadoPago returned status {status}")]
    Api { status: u16, details: Value },

    #[error("Unexpected MercadoPago response: {0}")]
    UnexpectedResponse(String),

    #[error("Webhook signature rejected: {0}")]
    Signature(String),
}

impl HttpStatusCode for MercadoPagoError {
    fn status_code(&self) -> u16 {
        match self {
            MercadoPagoError::NotConfigured => 500,
            MercadoPagoError::Request(err) if err.is_timeout() => 504,
            MercadoPagoError::Request(_) => 502,
            MercadoPagoError::Api { status, .. } => *status,
            MercadoPagoError::UnexpectedResponse(_) => 500,
            MercadoPagoError::Signature(_) => 401,
        }
    }
}

impl MercadoPagoError {
    /// Converts into the shared error, labelling upstream failures with `message`.
    pub fn into_citas(self, message: &str) -> CitasError {
        match self {
            MercadoPagoError::NotConfigured => config_error(MercadoPagoError::NotConfigured),
            MercadoPagoError::Request(err) => CitasError::from(err),
            MercadoPagoError::Api { status, details } => {
                upstream_error(MERCADOPAGO_SERVICE, status, message, details)
            }
            MercadoPagoError::UnexpectedResponse(msg) => CitasError::ParseError(msg),
            MercadoPagoError::Signature(msg) => validation_error(msg),
        }
    }
}

impl From<MercadoPagoError> for CitasError {
    fn from(err: MercadoPagoError) -> Self {
        err.into_citas("Error creating payment")
    }
}
