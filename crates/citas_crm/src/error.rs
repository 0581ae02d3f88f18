use citas_common::error::{
    config_error, upstream_error, validation_error, CitasError, HttpStatusCode,
};
use serde_json::Value;
use thiserror::Error;

/// Name used for the CRM in upstream error reports.
pub const CRM_SERVICE: &str = "Frappe CRM";

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("CRM API key/secret are not configured")]
    NotConfigured,

    #[error("Frappe request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Frappe returned status {status}")]
    Api { status: u16, details: Value },

    #[error("Unexpected Frappe response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid photo: {0}")]
    InvalidPhoto(String),
}

impl HttpStatusCode for CrmError {
    fn status_code(&self) -> u16 {
        match self {
            CrmError::NotConfigured => 500,
            CrmError::Request(err) if err.is_timeout() => 504,
            CrmError::Request(_) => 502,
            CrmError::Api { status, .. } => *status,
            CrmError::UnexpectedResponse(_) => 500,
            CrmError::InvalidPhoto(_) => 400,
        }
    }
}

impl CrmError {
    /// Converts into the shared error, labelling upstream failures with `message`.
    pub fn into_citas(self, message: &str) -> CitasError {
        match self {
            CrmError::NotConfigured => config_error(CrmError::NotConfigured),
            CrmError::Request(err) => CitasError::from(err),
            CrmError::Api { status, details } => upstream_error(CRM_SERVICE, status, message, details),
            CrmError::UnexpectedResponse(msg) => CitasError::ParseError(msg),
            CrmError::InvalidPhoto(msg) => validation_error(msg),
        }
    }
}

impl From<CrmError> for CitasError {
    fn from(err: CrmError) -> Self {
        err.into_citas("CRM request failed")
    }
}
