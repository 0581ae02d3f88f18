use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use citas_config::WhatsAppServiceConfig;
use std::sync::Arc;

use super::auth::require_api_key;
use super::handlers::{
    health_handler, qr_handler, send_code_handler, status_handler, verify_code_handler,
    CompanionState,
};
use crate::gateway::gateway_from_config;
use crate::verification::VerificationManager;

/// State for the companion service built from its config section.
pub fn companion_state(config: &WhatsAppServiceConfig) -> Arc<CompanionState> {
    Arc::new(CompanionState::new(
        config.clone(),
        Arc::new(VerificationManager::from_config(config)),
        gateway_from_config(config),
    ))
}

/// Companion router. Everything but `/health` sits behind the API key check.
pub fn companion_routes(state: Arc<CompanionState>) -> Router {
    let protected = Router::new()
        .route("/qr", get(qr_handler))
        .route("/send-code", post(send_code_handler))
        .route("/verify-code", post(verify_code_handler))
        .route("/status", get(status_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .with_state(state)
}
