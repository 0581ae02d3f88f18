// --- File: crates/services/citas_backend/src/app.rs ---
use axum::{routing::get, Router};
use citas_config::AppConfig;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
#[allow(unused_imports)] // used by the integration features only
use {
    citas_common::{is_crm_enabled, is_mercadopago_enabled, is_whatsapp_enabled},
    tracing::info,
};

/// The `/api` router with every enabled integration merged in.
#[allow(unused_variables)] // config is only read by the integration features
pub fn api_router(config: Arc<AppConfig>) -> Router {
    #[allow(unused_mut)] // for the features it needs to be mutable
    let mut router = Router::new().route("/", get(|| async { "Citas API" }));

    #[cfg(feature = "crm")]
    {
        if is_crm_enabled(&config) {
            info!("CRM: adding /appointment, /availability and /crm-lead");
            router = router.merge(citas_crm::routes::routes(config.clone()));
        }
    }
    #[cfg(feature = "mercadopago")]
    {
        if is_mercadopago_enabled(&config) {
            info!("MercadoPago: adding /payment, /payment-webhook and /verify-payment");
            router = router.merge(citas_mercadopago::routes::routes(config.clone()));
        }
    }
    #[cfg(feature = "whatsapp")]
    {
        if is_whatsapp_enabled(&config) {
            info!("WhatsApp: adding /whatsapp-verify");
            router = router.merge(citas_whatsapp::routes::routes(config.clone()));
        }
    }

    router
}

/// Full application: `/api`, optional Swagger UI, request tracing.
pub fn build_app(config: Arc<AppConfig>) -> Router {
    #[allow(unused_mut)]
    let mut app = Router::new().nest("/api", api_router(config));

    #[cfg(feature = "openapi")]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "Citas API",
                version = "0.1.0",
                description = "Appointments, patient intake, payments and phone verification",
                license(name = "MIT", url = "https://opensource.org/licenses/MIT")
            ),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        #[allow(unused_mut)]
        let mut openapi_doc = ApiDoc::openapi();
        #[cfg(feature = "crm")]
        openapi_doc.merge(citas_crm::doc::CrmApiDoc::openapi());
        #[cfg(feature = "mercadopago")]
        openapi_doc.merge(citas_mercadopago::doc::MercadoPagoApiDoc::openapi());
        #[cfg(feature = "whatsapp")]
        openapi_doc.merge(citas_whatsapp::doc::WhatsAppApiDoc::openapi());

        info!("Adding Swagger UI at /api/docs");
        app = app.merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc));
    }

    app.layer(TraceLayer::new_for_http())
}
