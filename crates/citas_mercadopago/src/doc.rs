// File: crates/citas_mercadopago/src/doc.rs

#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::logic::{PaidAppointment, PaymentRequest, PaymentResponse, VerifyPaymentResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::create_payment_handler,
        crate::handlers::payment_webhook_handler,
        crate::handlers::verify_payment_handler
    ),
    components(
        schemas(PaymentRequest, PaymentResponse, PaidAppointment, VerifyPaymentResponse)
    ),
    tags(
        (name = "Payments", description = "MercadoPago Checkout Pro payments for appointments")
    ),
    servers(
        (url = "/api", description = "Citas API server")
    )
)]
pub struct MercadoPagoApiDoc;
