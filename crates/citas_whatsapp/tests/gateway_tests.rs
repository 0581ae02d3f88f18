use citas_whatsapp::{GatewayError, HttpWhatsAppGateway, WhatsAppGateway};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_session_status_reads_push_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/default"))
        .and(header("X-Api-Key", "gw-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "default",
            "status": "WORKING",
            "me": {"id": "56911111111@c.us", "pushName": "Dra. Nikkita"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpWhatsAppGateway::new(&server.uri(), "default", Some("gw-key".into()));
    let status = gateway.session_status().await.unwrap();

    assert!(status.is_connected());
    assert_eq!(status.name.as_deref(), Some("Dra. Nikkita"));
}

#[tokio::test]
async fn test_session_in_scan_state_is_not_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/clinic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "clinic", "status": "SCAN_QR_CODE", "me": null
        })))
        .mount(&server)
        .await;

    let gateway = HttpWhatsAppGateway::new(&format!("{}/", server.uri()), "clinic", None);
    let status = gateway.session_status().await.unwrap();

    assert!(!status.is_connected());
    assert_eq!(status.name, None);
}

#[tokio::test]
async fn test_pairing_code_raw_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/default/auth/qr"))
        .and(query_param("format", "raw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "2@abc,def"})))
        .mount(&server)
        .await;

    let gateway = HttpWhatsAppGateway::new(&server.uri(), "default", None);
    assert_eq!(gateway.pairing_code().await.unwrap().as_deref(), Some("2@abc,def"));
}

#[tokio::test]
async fn test_pairing_code_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/default/auth/qr"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/other/auth/qr"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>starting</html>"))
        .mount(&server)
        .await;

    let missing = HttpWhatsAppGateway::new(&server.uri(), "default", None);
    assert_eq!(missing.pairing_code().await.unwrap(), None);

    let not_json = HttpWhatsAppGateway::new(&server.uri(), "other", None);
    assert_eq!(not_json.pairing_code().await.unwrap(), None);
}

#[tokio::test]
async fn test_send_text_payload_and_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sendText"))
        .and(body_json(json!({
            "session": "default",
            "chatId": "56912345678@c.us",
            "text": "hola"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "msg-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpWhatsAppGateway::new(&server.uri(), "default", None);
    gateway.send_text("56912345678@c.us", "hola").await.unwrap();

    let err = gateway.send_text("000@c.us", "hola").await.unwrap_err();
    assert!(matches!(err, GatewayError::Api { status: 404, .. }));
}
