//! Uniform CORS headers and verb gating for browser-facing endpoints.
//!
//! Every endpoint answers `OPTIONS` with an empty 200, rejects unknown verbs with
//! 405 `{"error":"Method not allowed"}`, and stamps the CORS headers on all replies.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::Response,
    routing::MethodRouter,
};

use crate::error::CitasError;

/// Pre-flight handler: 200 with an empty body.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Fallback for verbs an endpoint does not serve.
pub async fn method_not_allowed() -> CitasError {
    CitasError::MethodNotAllowed
}

async fn apply_cors_headers(State(methods): State<&'static str>, mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(methods),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Wraps a method router with pre-flight handling, 405 gating and CORS headers.
///
/// `methods` is the literal `Access-Control-Allow-Methods` value, e.g. `"POST, OPTIONS"`.
pub fn with_cors<S>(route: MethodRouter<S>, methods: &'static str) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route
        .options(preflight)
        .fallback(method_not_allowed)
        .layer(axum::middleware::map_response_with_state(
            methods,
            apply_cors_headers,
        ))
}
