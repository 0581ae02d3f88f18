use axum::{
    body::{to_bytes, Body},
    http::{header as http_header, Request, StatusCode},
    Router,
};
use citas_config::{AppConfig, WhatsAppServiceConfig};
use citas_whatsapp::companion::{companion_routes, companion_state};
use citas_whatsapp::routes::routes;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proxy_for(service_url: Option<&str>, api_key: Option<&str>) -> Router {
    let config: AppConfig = serde_json::from_value(json!({
        "server": {"host": "127.0.0.1", "port": 8080},
        "use_whatsapp": true,
        "whatsapp": {"service_url": service_url, "api_key": api_key}
    }))
    .unwrap();
    routes(Arc::new(config))
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post_action(action: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/whatsapp-verify?action={}", action))
        .header(http_header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_action(action: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/whatsapp-verify?action={}", action))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_send_code_is_relayed_with_api_key() {
    let companion = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-code"))
        .and(header("X-Api-Key", "shared"))
        .and(body_json(json!({"phone": "912345678", "nombre": "Ana"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "message": "Código enviado por WhatsApp", "expiresIn": 600
        })))
        .expect(1)
        .mount(&companion)
        .await;

    let (status, body) = call(
        proxy_for(Some(&companion.uri()), Some("shared")),
        post_action("send-code", json!({"phone": "912345678", "nombre": "Ana"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiresIn"], 600);
}

#[tokio::test]
async fn test_companion_rejection_keeps_status() {
    let companion = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify-code"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "Código incorrecto. Intentos restantes: 1",
            "remainingAttempts": 1
        })))
        .mount(&companion)
        .await;

    let (status, body) = call(
        proxy_for(Some(&companion.uri()), None),
        post_action("verify-code", json!({"phone": "912345678", "code": "1"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["remainingAttempts"], 1);
}

#[tokio::test]
async fn test_status_summarises_health() {
    let companion = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "whatsapp": "connected",
            "name": "Dra. Nikkita",
            "timestamp": "2025-05-05T12:00:00.000Z"
        })))
        .mount(&companion)
        .await;

    let (status, body) = call(proxy_for(Some(&companion.uri()), None), get_action("status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "status": "connected", "name": "Dra. Nikkita"})
    );
}

#[tokio::test]
async fn test_proxy_rule_failures() {
    let (status, body) = call(proxy_for(None, None), get_action("status")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let (status, body) = call(proxy_for(Some("http://127.0.0.1:9"), None), get_action("reset")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid action. Use: send-code, verify-code, or status"
    );

    let (status, body) =
        call(proxy_for(Some("http://127.0.0.1:9"), None), get_action("send-code")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"success": false, "error": "Method not allowed"}));
}

#[tokio::test]
async fn test_unreachable_companion_is_503() {
    // Nothing listens on the discard port.
    let (status, body) = call(proxy_for(Some("http://127.0.0.1:9"), None), get_action("status")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "disconnected");
    assert_eq!(
        body["error"],
        "No se pudo conectar con el servicio de verificación. Intenta más tarde."
    );
}

#[tokio::test]
async fn test_preflight_and_unsupported_verb() {
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/whatsapp-verify?action=send-code")
        .body(Body::empty())
        .unwrap();
    let response = proxy_for(None, None).oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[http_header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, OPTIONS"
    );

    let delete = Request::builder()
        .method("DELETE")
        .uri("/whatsapp-verify?action=status")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(proxy_for(None, None), delete).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Method not allowed"}));
}

/// Backend proxy → real companion over TCP → mocked chat gateway.
#[tokio::test]
async fn test_end_to_end_verification() {
    let gateway = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "WORKING"})))
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sendText"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "m1"})))
        .expect(1)
        .mount(&gateway)
        .await;

    let service_config: WhatsAppServiceConfig = serde_json::from_value(json!({
        "gateway_url": gateway.uri(),
        "api_key": "shared"
    }))
    .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let companion_url = format!("http://{}", listener.local_addr().unwrap());
    let companion = companion_routes(companion_state(&service_config));
    tokio::spawn(async move {
        axum::serve(listener, companion).await.unwrap();
    });

    let proxy = proxy_for(Some(&companion_url), Some("shared"));
    let (status, _) = call(
        proxy.clone(),
        post_action("send-code", json!({"phone": "+56 9 8765 4321", "nombre": "Luis"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = gateway
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/api/sendText")
        .unwrap();
    let sent: Value = serde_json::from_slice(&sent.body).unwrap();
    assert_eq!(sent["chatId"], "56987654321@c.us");
    let code = sent["text"].as_str().unwrap().split('*').nth(3).unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, body) = call(
        proxy,
        post_action("verify-code", json!({"phone": "987654321", "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
