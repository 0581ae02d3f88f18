// --- File: crates/citas_crm/src/routes.rs ---

use axum::{
    routing::{get, post},
    Router,
};
use citas_common::with_cors;
use citas_config::AppConfig;
use std::sync::Arc;

use crate::handlers::{
    availability_handler, create_appointment_handler, create_lead_handler, CrmState,
};
use crate::service::{crm_from_config, CrmService};

/// Creates the router for the CRM feature, building the Frappe client from config.
pub fn routes(config: Arc<AppConfig>) -> Router {
    let crm = crm_from_config(config.crm.as_ref());
    routes_with_service(config, crm)
}

/// Same routes over an already built CRM service.
pub fn routes_with_service(config: Arc<AppConfig>, crm: Option<Arc<dyn CrmService>>) -> Router {
    let state = Arc::new(CrmState::new(config, crm));

    Router::new()
        .route(
            "/appointment",
            with_cors(post(create_appointment_handler), "POST, OPTIONS"),
        )
        .route(
            "/availability",
            with_cors(get(availability_handler), "GET, OPTIONS"),
        )
        .route(
            "/crm-lead",
            with_cors(post(create_lead_handler), "POST, OPTIONS"),
        )
        .with_state(state)
}
