// --- File: crates/citas_crm/src/handlers.rs ---
use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use chrono_tz::Tz;
use citas_common::{config_error, json_body, CitasError};
use citas_config::AppConfig;
use std::sync::Arc;
use tracing::info;

use crate::logic::{
    build_appointment_event, busy_intervals_from_events, clinic_timezone, compute_slots,
    parse_query_date, AppointmentRequest, AppointmentResponse, AvailabilityQuery,
    AvailabilityResponse, LeadRequest, LeadResponse, LeadSubmission, WorkingHours,
};
use crate::service::CrmService;

/// Shared state of the CRM routes.
#[derive(Clone)]
pub struct CrmState {
    pub config: Arc<AppConfig>,
    /// `None` when the CRM credentials are not configured.
    pub crm: Option<Arc<dyn CrmService>>,
    pub hours: WorkingHours,
    pub appointment_minutes: i64,
    pub tz: Tz,
}

impl CrmState {
    pub fn new(config: Arc<AppConfig>, crm: Option<Arc<dyn CrmService>>) -> Self {
        Self {
            hours: WorkingHours::from(&config.scheduling),
            appointment_minutes: config.scheduling.appointment_minutes,
            tz: clinic_timezone(&config.scheduling),
            crm,
            config,
        }
    }

    fn crm(&self) -> Result<&dyn CrmService, CitasError> {
        self.crm
            .as_deref()
            .ok_or_else(|| config_error("Missing CRM API credentials"))
    }
}

/// Creates a calendar event for a website booking.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/appointment",
    request_body = AppointmentRequest,
    responses(
        (status = 200, description = "Appointment created", body = AppointmentResponse),
        (status = 400, description = "Missing or malformed fecha/hora/nombre"),
        (status = 500, description = "CRM not configured or internal error")
    ),
    tag = "CRM"
))]
pub async fn create_appointment_handler(
    State(state): State<Arc<CrmState>>,
    body: Bytes,
) -> Result<Json<AppointmentResponse>, CitasError> {
    let request: AppointmentRequest = json_body(&body)?;
    let crm = state.crm()?;
    let event = build_appointment_event(&request, state.appointment_minutes)?;
    info!("Creating event: {}", event.subject);

    let event_id = crm
        .create_event(event)
        .await
        .map_err(|e| e.into_citas("Error creating appointment"))?;

    Ok(Json(AppointmentResponse {
        success: true,
        message: "Cita agendada correctamente".to_string(),
        event_id,
    }))
}

/// Slot grid for one day.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Slot grid for the day", body = AvailabilityResponse),
        (status = 400, description = "Missing or malformed date"),
        (status = 500, description = "CRM not configured or internal error")
    ),
    tag = "CRM"
))]
pub async fn availability_handler(
    State(state): State<Arc<CrmState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, CitasError> {
    let date = parse_query_date(query.date.as_deref())?;
    let crm = state.crm()?;

    let events = crm
        .list_events(date)
        .await
        .map_err(|e| e.into_citas("Error fetching availability"))?;
    let busy_slots = busy_intervals_from_events(&events);
    let slots = compute_slots(&busy_slots, &state.hours);
    info!(
        "Availability for {}: {} events, {} slots",
        date,
        events.len(),
        slots.len()
    );

    Ok(Json(AvailabilityResponse {
        success: true,
        date: date.format("%Y-%m-%d").to_string(),
        working_hours: state.hours.clone(),
        slots,
        busy_slots,
    }))
}

/// Creates a CRM lead from the intake form.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/crm-lead",
    request_body = LeadRequest,
    responses(
        (status = 200, description = "Lead created", body = LeadResponse),
        (status = 400, description = "Body is not valid JSON"),
        (status = 500, description = "CRM not configured or internal error")
    ),
    tag = "CRM"
))]
pub async fn create_lead_handler(
    State(state): State<Arc<CrmState>>,
    body: Bytes,
) -> Result<Json<LeadResponse>, CitasError> {
    let request: LeadRequest = json_body(&body)?;
    let crm = state.crm()?;
    let options = state
        .config
        .crm
        .as_ref()
        .map(|c| c.lead.clone())
        .unwrap_or_default();

    let submission = LeadSubmission {
        crm,
        options: &options,
        tz: state.tz,
    };
    let outcome = submission
        .submit(&request, Utc::now())
        .await
        .map_err(|e| e.into_citas("Error creating lead in CRM"))?;

    Ok(Json(LeadResponse {
        success: true,
        message: "Lead created successfully".to_string(),
        lead_id: outcome.lead_id,
        photos_uploaded: outcome.photos_uploaded,
    }))
}
