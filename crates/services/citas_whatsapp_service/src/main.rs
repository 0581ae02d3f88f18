// File: services/citas_whatsapp_service/src/main.rs
use citas_common::logging;
use citas_config::load_config;
use citas_whatsapp::companion::{companion_routes, companion_state};
use citas_whatsapp::spawn_expiry_sweeper;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            logging::init();
            error!("Failed to load config: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init_from_config(&config.logging);

    let Some(service_config) = config.whatsapp_service.clone() else {
        error!("Missing [whatsapp_service] section in config");
        return ExitCode::FAILURE;
    };

    let state = companion_state(&service_config);
    let sweeper = spawn_expiry_sweeper(
        state.manager.clone(),
        Duration::from_secs(service_config.sweep_interval_secs),
    );

    #[allow(unused_mut)]
    let mut app = companion_routes(state);

    #[cfg(feature = "openapi")]
    {
        use citas_whatsapp::doc::CompanionApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        info!("Adding Swagger UI at /docs");
        app = app.merge(SwaggerUi::new("/docs").url("/docs/openapi.json", CompanionApiDoc::openapi()));
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", service_config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Cannot bind {}: {}", addr, err);
            return ExitCode::FAILURE;
        }
    };
    info!("WhatsApp verification service listening on port {}", service_config.port);
    info!("Health check: http://localhost:{}/health", service_config.port);
    info!("QR code: http://localhost:{}/qr", service_config.port);
    if service_config.api_key().is_none() {
        info!("No API key configured; every route is open");
    }

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down verification service");
        })
        .await;
    sweeper.abort();

    if let Err(err) = served {
        error!("Server error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
