// --- File: crates/citas_mercadopago/src/routes.rs ---

use axum::{
    routing::{get, post},
    Router,
};
use citas_common::with_cors;
use citas_config::AppConfig;
use citas_crm::{crm_from_config, CrmService};
use std::sync::Arc;

use crate::handlers::{
    create_payment_handler, payment_webhook_handler, verify_payment_handler, webhook_ack,
    PaymentState,
};
use crate::service::{gateway_from_config, PaymentGateway};

/// Creates the router for the payment feature.
pub fn routes(config: Arc<AppConfig>) -> Router {
    let gateway = gateway_from_config(config.mercadopago.as_ref());
    let crm = crm_from_config(config.crm.as_ref());
    routes_with_services(config, gateway, crm)
}

/// Same routes over already built gateway and CRM services.
pub fn routes_with_services(
    config: Arc<AppConfig>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    crm: Option<Arc<dyn CrmService>>,
) -> Router {
    let state = Arc::new(PaymentState::new(config, gateway, crm));

    Router::new()
        .route(
            "/payment",
            with_cors(post(create_payment_handler), "POST, OPTIONS"),
        )
        // MercadoPago probes the URL with other verbs; those only get an ack.
        .route(
            "/payment-webhook",
            post(payment_webhook_handler).fallback(webhook_ack),
        )
        .route(
            "/verify-payment",
            with_cors(get(verify_payment_handler), "GET, OPTIONS"),
        )
        .with_state(state)
}
