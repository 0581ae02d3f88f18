// File: services/citas_backend/src/main.rs
use citas_backend::build_app;
use citas_common::logging;
use citas_config::load_config;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            logging::init();
            error!("Failed to load config: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init_from_config(&config.logging);

    let app = build_app(config.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Cannot bind {}: {}", addr, err);
            return ExitCode::FAILURE;
        }
    };
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    if let Err(err) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
