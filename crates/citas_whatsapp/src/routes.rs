use axum::{routing::get, Router};
use citas_common::with_cors;
use citas_config::AppConfig;
use std::sync::Arc;

use crate::handlers::{whatsapp_verify_handler, ProxyState};

/// Backend router for the verification proxy.
pub fn routes(config: Arc<AppConfig>) -> Router {
    let state = Arc::new(ProxyState::new(config));

    Router::new()
        .route(
            "/whatsapp-verify",
            with_cors(
                get(whatsapp_verify_handler).post(whatsapp_verify_handler),
                "GET, POST, OPTIONS",
            ),
        )
        .with_state(state)
}
