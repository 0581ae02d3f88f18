use std::fmt;
use thiserror::Error;

/// The base error type shared by every citas crate.
///
/// Feature crates keep their own error enums and convert into this one with
/// `From<SpecificError> for CitasError`; handlers then return it directly since it
/// implements `IntoResponse` (see `http.rs`).
#[derive(Error, Debug)]
pub enum CitasError {
    /// A required credential or URL is missing
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required request field is missing or malformed
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// A third-party API answered with a non-success status.
    /// `status` and `details` are relayed to the caller.
    #[error("{service} returned {status}: {message}")]
    UpstreamError {
        service: String,
        status: u16,
        message: String,
        details: serde_json::Value,
    },

    /// The upstream could not be reached
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// An upstream reply could not be decoded
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// A verification code check failed
    #[error("{message}")]
    VerificationError {
        message: String,
        remaining_attempts: Option<u8>,
    },

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for CitasError {
    fn status_code(&self) -> u16 {
        match self {
            CitasError::ConfigError(_) => 500,
            CitasError::ValidationError(_) => 400,
            CitasError::MethodNotAllowed => 405,
            CitasError::UpstreamError { status, .. } => *status,
            CitasError::HttpError(_) => 502,
            CitasError::TimeoutError(_) => 504,
            CitasError::ParseError(_) => 500,
            CitasError::VerificationError { .. } => 400,
            CitasError::InternalError(_) => 500,
        }
    }
}

// Common error conversions
impl From<reqwest::Error> for CitasError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CitasError::TimeoutError(err.to_string())
        } else {
            CitasError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CitasError {
    fn from(err: serde_json::Error) -> Self {
        CitasError::ParseError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> CitasError {
    CitasError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> CitasError {
    CitasError::ValidationError(message.to_string())
}

pub fn upstream_error<T: fmt::Display>(
    service: &str,
    status: u16,
    message: T,
    details: serde_json::Value,
) -> CitasError {
    CitasError::UpstreamError {
        service: service.to_string(),
        status,
        message: message.to_string(),
        details,
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> CitasError {
    CitasError::InternalError(message.to_string())
}
