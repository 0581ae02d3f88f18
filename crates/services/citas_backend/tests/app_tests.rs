use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use citas_backend::build_app;
use citas_config::AppConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn config(value: Value) -> Arc<AppConfig> {
    Arc::new(serde_json::from_value(value).unwrap())
}

async fn send(config: Arc<AppConfig>, uri: &str) -> (StatusCode, String) {
    let response = build_app(config)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn test_api_root() {
    let config = config(json!({"server": {"host": "127.0.0.1", "port": 8080}}));
    let (status, body) = send(config, "/api/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Citas API");
}

#[tokio::test]
async fn test_disabled_integrations_are_not_routed() {
    let config = config(json!({
        "server": {"host": "127.0.0.1", "port": 8080},
        "use_crm": false,
        "use_whatsapp": true,
        "crm": {"base_url": "http://crm.test", "api_key": "k", "api_secret": "s"}
    }));

    assert_eq!(send(config.clone(), "/api/availability?date=2025-05-05").await.0, StatusCode::NOT_FOUND);
    // use_whatsapp without a [whatsapp] section stays off too.
    assert_eq!(send(config, "/api/whatsapp-verify?action=status").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_credentials_fail_as_config_error() {
    let config = config(json!({
        "server": {"host": "127.0.0.1", "port": 8080},
        "use_crm": true,
        "crm": {"base_url": "http://crm.test", "api_key": "secret_from_env", "api_secret": "secret_from_env"}
    }));

    let (status, body) = send(config, "/api/availability?date=2025-05-05").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"], "Server configuration error");
}
