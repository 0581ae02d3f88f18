// --- File: crates/citas_mercadopago/src/handlers.rs ---
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use chrono::Utc;
use chrono_tz::Tz;
use citas_common::{config_error, json_body, validation_error, CitasError};
use citas_config::{AppConfig, MercadoPagoConfig};
use citas_crm::logic::clinic_timezone;
use citas_crm::CrmService;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::logic::{
    build_preference, chargeable_price, generate_external_reference, is_valid_payment_id,
    record_paid_appointment,
    PaidAppointment, PaymentReceipt, PaymentRequest, PaymentResponse, VerifyPaymentQuery,
    VerifyPaymentResponse, WebhookNotification, WebhookQuery,
};
use crate::service::PaymentGateway;
use crate::signature::verify_signature;

#[derive(Clone)]
pub struct PaymentState {
    pub config: Arc<AppConfig>,
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub crm: Option<Arc<dyn CrmService>>,
    pub tz: Tz,
}

impl PaymentState {
    pub fn new(
        config: Arc<AppConfig>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        crm: Option<Arc<dyn CrmService>>,
    ) -> Self {
        Self {
            tz: clinic_timezone(&config.scheduling),
            config,
            gateway,
            crm,
        }
    }

    fn mercadopago(&self) -> Result<&MercadoPagoConfig, CitasError> {
        self.config
            .mercadopago
            .as_ref()
            .ok_or_else(|| config_error("MercadoPago section missing"))
    }

    fn gateway(&self) -> Result<&dyn PaymentGateway, CitasError> {
        self.gateway
            .as_deref()
            .ok_or_else(|| config_error("Missing MercadoPago access token"))
    }

    fn crm(&self) -> Result<&dyn CrmService, CitasError> {
        self.crm
            .as_deref()
            .ok_or_else(|| config_error("Missing CRM API credentials"))
    }
}

/// Creates a checkout preference, or short-circuits for free appointments.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/payment",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Checkout link, or free appointment marker", body = PaymentResponse),
        (status = 400, description = "Invalid precio or body"),
        (status = 500, description = "Payment gateway not configured")
    ),
    tag = "Payments"
))]
pub async fn create_payment_handler(
    State(state): State<Arc<PaymentState>>,
    body: Bytes,
) -> Result<Json<PaymentResponse>, CitasError> {
    let request: PaymentRequest = json_body(&body)?;
    let Some(price) = chargeable_price(request.precio.as_ref())? else {
        info!("Free appointment, no payment required");
        return Ok(Json(PaymentResponse::free()));
    };
    let config = state.mercadopago()?;
    let gateway = state.gateway()?;

    let external_reference = generate_external_reference(Utc::now(), &mut rand::thread_rng());
    let preference = build_preference(&request, config, &external_reference, price);
    let created = gateway
        .create_preference(preference, uuid::Uuid::new_v4().to_string())
        .await
        .map_err(|e| e.into_citas("Error creating payment"))?;

    Ok(Json(PaymentResponse::Checkout {
        success: true,
        payment_url: created.init_point,
        sandbox_url: created.sandbox_init_point,
        preference_id: created.id,
        external_reference,
    }))
}

/// Acknowledges any non-POST call to the webhook URL.
pub async fn webhook_ack() -> Json<Value> {
    Json(json!({ "received": true }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Payment notification receiver. Always answers 200.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/payment-webhook",
    request_body = Value,
    responses(
        (status = 200, description = "Notification acknowledged", body = Value)
    ),
    tag = "Payments"
))]
pub async fn payment_webhook_handler(
    State(state): State<Arc<PaymentState>>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let notification = WebhookNotification::parse(&body, &query);
    info!("Webhook received: {:?}", notification);

    if !notification.is_payment() {
        return Json(json!({ "received": true, "ignored": true }));
    }
    let Some(payment_id) = notification.payment_id else {
        return Json(json!({ "received": true, "no_payment_id": true }));
    };

    if let Some(secret) = state.mercadopago().ok().and_then(|c| c.webhook_secret()) {
        if let Err(err) = verify_signature(
            secret,
            header_str(&headers, "x-signature"),
            header_str(&headers, "x-request-id"),
            Some(&payment_id),
        ) {
            warn!("Ignoring webhook for payment {}: {}", payment_id, err);
            return Json(json!({ "received": true, "processed": false }));
        }
    }

    match process_payment_notification(&state, &payment_id).await {
        Ok(response) => Json(response),
        Err(err) => {
            error!("Webhook processing failed for payment {}: {}", payment_id, err);
            Json(json!({ "received": true, "processed": false }))
        }
    }
}

async fn process_payment_notification(
    state: &PaymentState,
    payment_id: &str,
) -> Result<Value, CitasError> {
    let gateway = state.gateway()?;
    let crm = state.crm()?;
    let payment = gateway
        .get_payment(payment_id.to_string())
        .await
        .map_err(|e| e.into_citas("Error fetching payment"))?;

    if !payment.is_approved() {
        return Ok(json!({ "received": true, "status": payment.status }));
    }

    let appointment = PaidAppointment::from_payment(&payment);
    let receipt = PaymentReceipt {
        payment_id,
        external_reference: payment.external_reference.as_deref(),
        amount: payment.transaction_amount,
    };
    let window = appointment.window(Utc::now(), state.tz);
    let record = record_paid_appointment(crm, &appointment, &receipt, window).await;

    Ok(json!({
        "received": true,
        "processed": true,
        "event_id": record.event_id,
    }))
}

/// Confirms a payment when the customer returns from checkout.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/verify-payment",
    params(VerifyPaymentQuery),
    responses(
        (status = 200, description = "Payment state and created records", body = VerifyPaymentResponse),
        (status = 400, description = "Missing or malformed payment_id"),
        (status = 500, description = "Payment gateway or CRM not configured")
    ),
    tag = "Payments"
))]
pub async fn verify_payment_handler(
    State(state): State<Arc<PaymentState>>,
    Query(query): Query<VerifyPaymentQuery>,
) -> Result<Json<VerifyPaymentResponse>, CitasError> {
    let payment_id = query
        .payment_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| validation_error("Missing payment_id"))?;
    if !is_valid_payment_id(payment_id) {
        return Err(validation_error("Invalid payment_id"));
    }
    info!(
        "Verifying payment {} (status={:?}, ref={:?})",
        payment_id, query.status, query.external_reference
    );
    let gateway = state.gateway()?;
    let crm = state.crm()?;

    let payment = gateway
        .get_payment(payment_id.to_string())
        .await
        .map_err(|e| e.into_citas("Error verifying payment"))?;

    if !payment.is_approved() {
        return Ok(Json(VerifyPaymentResponse::NotApproved {
            success: false,
            status: payment.status,
            message: "Pago no aprobado".to_string(),
        }));
    }

    let appointment = PaidAppointment::from_payment(&payment);
    let receipt = PaymentReceipt {
        payment_id,
        external_reference: query
            .external_reference
            .as_deref()
            .or(payment.external_reference.as_deref()),
        amount: payment.transaction_amount,
    };
    let window = appointment.window(Utc::now(), state.tz);
    let record = record_paid_appointment(crm, &appointment, &receipt, window).await;

    Ok(Json(VerifyPaymentResponse::Approved {
        success: true,
        payment_status: payment.status.clone().unwrap_or_default(),
        amount: payment.transaction_amount,
        event_id: record.event_id,
        lead_id: record.lead_id,
        appointment,
    }))
}
