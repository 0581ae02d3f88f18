// File: crates/citas_whatsapp/src/doc.rs

#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::companion::handlers::{
    FailureBody, HealthResponse, QrResponse, SendCodeRequest, SendCodeResponse, StatusResponse,
    VerifyCodeRequest, VerifyCodeResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(crate::handlers::whatsapp_verify_handler),
    tags(
        (name = "WhatsApp", description = "Phone verification by WhatsApp code")
    ),
    servers(
        (url = "/api", description = "Citas API server")
    )
)]
pub struct WhatsAppApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::companion::handlers::health_handler,
        crate::companion::handlers::qr_handler,
        crate::companion::handlers::send_code_handler,
        crate::companion::handlers::verify_code_handler,
        crate::companion::handlers::status_handler
    ),
    components(
        schemas(
            FailureBody, HealthResponse, QrResponse, SendCodeRequest, SendCodeResponse,
            StatusResponse, VerifyCodeRequest, VerifyCodeResponse
        )
    ),
    tags(
        (name = "WhatsApp companion", description = "Verification code service backed by the chat gateway")
    )
)]
pub struct CompanionApiDoc;
