use once_cell::sync::Lazy;
use reqwest::{Client, Error as ReqwestError, Response};
use serde_json::Value;
use std::time::Duration;

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A static HTTP client reused by every outbound integration.
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    create_client(DEFAULT_TIMEOUT_SECS, true).unwrap_or_else(|err| {
        tracing::warn!("Falling back to default HTTP client: {}", err);
        Client::new()
    })
});

/// Creates a new HTTP client with a custom timeout and redirect policy.
pub fn create_client(timeout_secs: u64, follow_redirects: bool) -> Result<Client, ReqwestError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(if follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        })
        .build()
}

/// Reads an upstream reply as `(status, body)`.
///
/// Non-JSON bodies are kept as a JSON string and an empty body becomes `null`,
/// so the reply can always be relayed or logged.
pub async fn read_body(response: Response) -> Result<(u16, Value), ReqwestError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok((status, body))
}

/// True for 2xx statuses.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// `data.name` of a Frappe-style `{ "data": { "name": ... } }` reply.
pub fn data_name(body: &Value) -> Option<String> {
    body.get("data")
        .and_then(|data| data.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
