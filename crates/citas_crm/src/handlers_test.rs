#[cfg(test)]
mod tests {
    use crate::routes::routes_with_service;
    use crate::service::mock::MockCrmService;
    use crate::service::{CrmEvent, CrmService};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use citas_config::AppConfig;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn config() -> Arc<AppConfig> {
        Arc::new(
            serde_json::from_value(json!({
                "server": {"host": "127.0.0.1", "port": 8080},
                "use_crm": true,
                "crm": {"base_url": "http://crm.test", "api_key": "k", "api_secret": "s"}
            }))
            .unwrap(),
        )
    }

    fn app(crm: Option<Arc<MockCrmService>>) -> Router {
        routes_with_service(config(), crm.map(|c| c as Arc<dyn CrmService>))
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_availability_marks_booked_slot() {
        let crm = Arc::new(MockCrmService::with_events(vec![CrmEvent {
            name: Some("EV-1".into()),
            subject: Some("Cita: Ana".into()),
            starts_on: "2025-05-05 10:00:00".into(),
            ends_on: Some("2025-05-05 10:30:00".into()),
            status: Some("Open".into()),
        }]));

        let (status, body) = call(app(Some(crm)), Method::GET, "/availability?date=2025-05-05", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["date"], "2025-05-05");
        assert_eq!(body["workingHours"]["slotDuration"], 30);
        assert_eq!(body["slots"].as_array().unwrap().len(), 16);
        assert_eq!(body["busySlots"][0]["start"], "10:00");
        let slot = |t: &str| {
            body["slots"]
                .as_array()
                .unwrap()
                .iter()
                .find(|s| s["time"] == t)
                .cloned()
                .unwrap()
        };
        assert_eq!(slot("10:00")["available"], false);
        assert_eq!(slot("10:30")["available"], true);
    }

    #[tokio::test]
    async fn test_availability_requires_date_before_config() {
        let (status, body) = call(app(None), Method::GET, "/availability", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Date parameter is required (YYYY-MM-DD)");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let (status, body) = call(
            app(None),
            Method::POST,
            "/appointment",
            Some(json!({"nombre": "Ana", "fecha": "2025-05-05", "hora": "10:00"})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server configuration error");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_validation_error() {
        let crm = Arc::new(MockCrmService::default());
        for uri in ["/appointment", "/crm-lead"] {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("nombre=Ana"))
                .unwrap();
            let response = app(Some(crm.clone())).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
        }
        assert!(crm.created_events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_appointment_creates_event() {
        let crm = Arc::new(MockCrmService::default());
        let (status, body) = call(
            app(Some(crm.clone())),
            Method::POST,
            "/appointment",
            Some(json!({
                "nombre": "Ana Pérez",
                "telefono": "912345678",
                "email": "ana@example.com",
                "fecha": "2025-05-05",
                "hora": "10:00",
                "motivo": "Control"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Cita agendada correctamente");
        assert_eq!(body["event_id"], "EV-0001");
        let created = crm.created_events.lock().unwrap();
        assert_eq!(created[0].starts_on, "2025-05-05 10:00:00");
        assert_eq!(created[0].ends_on, "2025-05-05 10:30:00");
    }

    #[tokio::test]
    async fn test_wrong_verb_and_preflight() {
        let crm = Arc::new(MockCrmService::default());
        let (status, body) = call(app(Some(crm.clone())), Method::GET, "/appointment", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");

        let (status, body) = call(app(Some(crm)), Method::OPTIONS, "/crm-lead", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_lead_reports_photo_count() {
        let crm = Arc::new(MockCrmService::default());
        let (status, body) = call(
            app(Some(crm.clone())),
            Method::POST,
            "/crm-lead",
            Some(json!({
                "personal": {"nombre": "Ana Pérez", "telefono": "912345678", "email": "ana@example.com"},
                "medical": {"edad": "34"},
                "interest": {"razon": "Consulta"},
                "fotos": ["data:image/jpeg;base64,aGVsbG8="]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Lead created successfully");
        assert_eq!(body["lead_id"], "CRM-LEAD-0001");
        assert_eq!(body["photos_uploaded"], 1);
        assert_eq!(crm.created_leads.lock().unwrap()[0].last_name, "Pérez");
    }

    #[tokio::test]
    async fn test_lead_without_photos_omits_count() {
        let crm = Arc::new(MockCrmService::default());
        let (status, body) = call(
            app(Some(crm)),
            Method::POST,
            "/crm-lead",
            Some(json!({"personal": {"nombre": "Ana"}})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("photos_uploaded").is_none());
    }
}
