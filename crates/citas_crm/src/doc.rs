// File: crates/citas_crm/src/doc.rs

#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::logic::{
    AppointmentRequest, AppointmentResponse, AvailabilityResponse, AvailabilitySlot,
    BusyInterval, InterestData, LeadPhoto, LeadRequest, LeadResponse, MedicalData,
    PersonalData, WorkingHours,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::create_appointment_handler,
        crate::handlers::availability_handler,
        crate::handlers::create_lead_handler
    ),
    components(
        schemas(
            AppointmentRequest,
            AppointmentResponse,
            AvailabilityResponse,
            AvailabilitySlot,
            BusyInterval,
            WorkingHours,
            LeadRequest,
            LeadResponse,
            PersonalData,
            MedicalData,
            InterestData,
            LeadPhoto
        )
    ),
    tags(
        (name = "CRM", description = "Appointments, availability and leads backed by Frappe CRM")
    ),
    servers(
        (url = "/api", description = "Citas API server")
    )
)]
pub struct CrmApiDoc;
