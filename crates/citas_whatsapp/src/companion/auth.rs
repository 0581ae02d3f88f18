use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;
use std::sync::Arc;
use tracing::warn;

use super::handlers::{CompanionFailure, CompanionState};
use crate::gateway::API_KEY_HEADER;

/// Requires `X-Api-Key` to match the configured key. Open when no key is set.
pub async fn require_api_key(
    State(state): State<Arc<CompanionState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => next.run(request).await,
        Some(_) => {
            warn!("Rejected {}: invalid {}", request.uri().path(), API_KEY_HEADER);
            CompanionFailure::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        None => {
            warn!("Rejected {}: missing {}", request.uri().path(), API_KEY_HEADER);
            CompanionFailure::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}
