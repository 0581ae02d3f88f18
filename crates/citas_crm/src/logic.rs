// --- File: crates/citas_crm/src/logic.rs ---
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use citas_common::{validation_error, value_as_string, BestEffort, CitasError};
use citas_config::{LeadOptions, SchedulingConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::CrmError;
use crate::service::{Attachment, CrmEvent, CrmService, NewEvent, NewLead, LEAD_DOCTYPE};

/// Datetime layout Frappe stores and expects.
pub const CRM_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Length assumed for events stored without an end.
const DEFAULT_EVENT_MINUTES: i64 = 30;

const UNSPECIFIED: &str = "No especificado";

// --- Availability ---

/// Working window of the clinic, echoed back in the availability response.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
    pub slot_duration: u32,
    pub break_start: String,
    pub break_end: String,
}

impl From<&SchedulingConfig> for WorkingHours {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            start: config.work_start.clone(),
            end: config.work_end.clone(),
            slot_duration: config.slot_duration,
            break_start: config.break_start.clone(),
            break_end: config.break_end.clone(),
        }
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self::from(&SchedulingConfig::default())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilitySlot {
    pub time: String,
    pub available: bool,
}

/// A booked `[start, end)` range of one day, as `HH:MM`.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: String,
    pub end: String,
    pub subject: Option<String>,
}

impl BusyInterval {
    /// Slot starts are compared as zero-padded strings.
    fn covers(&self, time: &str) -> bool {
        time >= self.start.as_str() && time < self.end.as_str()
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams, utoipa::ToSchema))]
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    /// Day to inspect, `YYYY-MM-DD`.
    pub date: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub success: bool,
    pub date: String,
    pub working_hours: WorkingHours,
    pub slots: Vec<AvailabilitySlot>,
    pub busy_slots: Vec<BusyInterval>,
}

fn minutes_of(hhmm: &str) -> Option<u32> {
    let time = NaiveTime::parse_from_str(hhmm.trim(), "%H:%M").ok()?;
    Some(time.hour() * 60 + time.minute())
}

fn hhmm(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn in_break(time: &str, hours: &WorkingHours) -> bool {
    time >= hours.break_start.as_str() && time < hours.break_end.as_str()
}

/// Builds the day's slot grid.
///
/// Steps from `hours.start` to `hours.end` (exclusive) by `slot_duration` minutes.
/// Times inside `[break_start, break_end)` are left out of the grid; every other
/// slot is unavailable when any busy interval covers its start time. A zero step
/// or an unparsable window gives an empty grid.
pub fn compute_slots(busy: &[BusyInterval], hours: &WorkingHours) -> Vec<AvailabilitySlot> {
    let (Some(start), Some(end)) = (minutes_of(&hours.start), minutes_of(&hours.end)) else {
        warn!("Unusable working hours: {:?}", hours);
        return Vec::new();
    };
    if hours.slot_duration == 0 || end <= start {
        return Vec::new();
    }

    (start..end)
        .step_by(hours.slot_duration as usize)
        .map(hhmm)
        .filter(|time| !in_break(time, hours))
        .map(|time| {
            let available = !busy.iter().any(|interval| interval.covers(&time));
            AvailabilitySlot { time, available }
        })
        .collect()
}

/// Parses the datetime strings Frappe returns (`2025-05-05 10:00:00[.ffffff]`).
pub fn parse_crm_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Converts CRM events into busy intervals; events without an end last 30 minutes.
pub fn busy_intervals_from_events(events: &[CrmEvent]) -> Vec<BusyInterval> {
    events
        .iter()
        .filter_map(|event| {
            let Some(start) = parse_crm_datetime(&event.starts_on) else {
                warn!("Skipping event with unreadable start: {:?}", event);
                return None;
            };
            let end = event
                .ends_on
                .as_deref()
                .and_then(parse_crm_datetime)
                .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_MINUTES));
            Some(BusyInterval {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
                subject: event.subject.clone(),
            })
        })
        .collect()
}

/// Reads the `date` query parameter.
pub fn parse_query_date(date: Option<&str>) -> Result<NaiveDate, CitasError> {
    let date = date
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| validation_error("Date parameter is required (YYYY-MM-DD)"))?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| validation_error("Invalid date format (YYYY-MM-DD)"))
}

// --- Appointments ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentRequest {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub fecha: Option<String>,
    /// `HH:MM`
    #[serde(default)]
    pub hora: Option<String>,
    #[serde(default)]
    pub motivo: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentResponse {
    pub success: bool,
    pub message: String,
    pub event_id: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, CitasError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| validation_error(format!("Missing required field: {}", field)))
}

/// Start and end of an appointment from `fecha` + `hora`.
pub fn appointment_window(
    fecha: &str,
    hora: &str,
    minutes: i64,
) -> Result<(NaiveDateTime, NaiveDateTime), CitasError> {
    let date = NaiveDate::parse_from_str(fecha.trim(), "%Y-%m-%d")
        .map_err(|_| validation_error("Invalid fecha (YYYY-MM-DD)"))?;
    let time = NaiveTime::parse_from_str(hora.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(hora.trim(), "%H:%M:%S"))
        .map_err(|_| validation_error("Invalid hora (HH:MM)"))?;
    let start = date.and_time(time);
    let end = Duration::try_minutes(minutes)
        .and_then(|length| start.checked_add_signed(length))
        .ok_or_else(|| validation_error(format!("Invalid duration: {} minutes", minutes)))?;
    Ok((start, end))
}

pub fn format_crm_datetime(value: &NaiveDateTime) -> String {
    value.format(CRM_DATETIME_FORMAT).to_string()
}

/// Event for a booking made from the website form.
pub fn build_appointment_event(
    request: &AppointmentRequest,
    minutes: i64,
) -> Result<NewEvent, CitasError> {
    let nombre = required(&request.nombre, "nombre")?;
    let (start, end) = appointment_window(
        required(&request.fecha, "fecha")?,
        required(&request.hora, "hora")?,
        minutes,
    )?;

    let description = format!(
        "<b>Paciente:</b> {}<br>\n<b>Teléfono:</b> {}<br>\n<b>Email:</b> {}<br>\n<b>Motivo:</b> {}<br>\n<br>\n<i>Cita agendada desde el sitio web</i>",
        nombre,
        request.telefono.as_deref().unwrap_or_default(),
        request.email.as_deref().unwrap_or_default(),
        request
            .motivo
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Consulta general"),
    );

    let event = NewEvent::open(
        format!("Cita: {}", nombre),
        format_crm_datetime(&start),
        format_crm_datetime(&end),
        description,
    );
    Ok(match request.lead_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(lead_id) => event.linked_to_lead(lead_id),
        None => event,
    })
}

// --- Leads ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalData {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Pre-evaluation answers; values may arrive as strings or numbers.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalData {
    #[serde(default)]
    pub edad: Option<Value>,
    #[serde(default)]
    pub estatura: Option<Value>,
    #[serde(default)]
    pub peso: Option<Value>,
    #[serde(default)]
    pub cirugias_previas: Option<Value>,
    #[serde(default)]
    pub cirugias_previas_detalle: Option<Value>,
    #[serde(default)]
    pub condiciones_medicas: Option<Value>,
    #[serde(default)]
    pub condiciones_medicas_detalle: Option<Value>,
    #[serde(default)]
    pub medicamentos: Option<Value>,
    #[serde(default)]
    pub medicamentos_detalle: Option<Value>,
    #[serde(default)]
    pub fumadora: Option<Value>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestData {
    #[serde(default)]
    pub razon: Option<String>,
    #[serde(default)]
    pub expectativas: Option<String>,
    #[serde(default)]
    pub disponibilidad: Option<String>,
    #[serde(default)]
    pub como_nos_conociste: Option<String>,
}

/// A photo as sent by the intake form: a bare base64/data-URL string or an object.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LeadPhoto {
    Encoded(String),
    File {
        #[serde(default)]
        name: Option<String>,
        data: String,
        #[serde(default, alias = "type")]
        content_type: Option<String>,
    },
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadRequest {
    #[serde(default)]
    pub personal: PersonalData,
    #[serde(default)]
    pub medical: MedicalData,
    #[serde(default)]
    pub interest: InterestData,
    #[serde(default)]
    pub fotos: Vec<LeadPhoto>,
    #[serde(default, alias = "comment")]
    pub comentario: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos_uploaded: Option<usize>,
}

/// Splits a full name at the first whitespace: `"Ana María Pérez"` -> (`Ana`, `María Pérez`).
pub fn split_name(full_name: &str) -> (String, String) {
    let full_name = full_name.trim();
    match full_name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (full_name.to_string(), String::new()),
    }
}

/// The clinic's zone; unknown names fall back to America/Santiago.
pub fn clinic_timezone(config: &SchedulingConfig) -> Tz {
    Tz::from_str(&config.timezone).unwrap_or_else(|_| {
        warn!("Unknown timezone '{}', using America/Santiago", config.timezone);
        Tz::America__Santiago
    })
}

fn text_or_unspecified(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNSPECIFIED)
        .to_string()
}

fn value_or_unspecified(value: &Option<Value>) -> String {
    value
        .as_ref()
        .and_then(value_as_string)
        .unwrap_or_else(|| UNSPECIFIED.to_string())
}

fn answer_with_detail(label: &str, answer: &Option<Value>, detail: &Option<Value>) -> String {
    let mut line = format!("- {}: {}", label, value_or_unspecified(answer));
    if let Some(detail) = detail.as_ref().and_then(value_as_string) {
        line.push_str(&format!("\n    Detalle: {}", detail));
    }
    line
}

/// Plain-text note block stored on the lead.
pub fn build_lead_notes(request: &LeadRequest, registered_at: &DateTime<Tz>) -> String {
    let p = &request.personal;
    let m = &request.medical;
    let i = &request.interest;

    let sections = [
        "📋 INFORMACIÓN DEL LEAD - PRE-EVALUACIÓN".to_string(),
        format!(
            "👤 DATOS PERSONALES\n- Nombre: {}\n- Teléfono: {}\n- Email: {}",
            text_or_unspecified(&p.nombre),
            text_or_unspecified(&p.telefono),
            text_or_unspecified(&p.email),
        ),
        [
            "📊 DATOS MÉDICOS".to_string(),
            format!("- Edad: {}", value_or_unspecified(&m.edad)),
            format!("- Estatura: {} cm", value_or_unspecified(&m.estatura)),
            format!("- Peso: {} kg", value_or_unspecified(&m.peso)),
            answer_with_detail("Cirugías previas", &m.cirugias_previas, &m.cirugias_previas_detalle),
            answer_with_detail(
                "Condiciones médicas",
                &m.condiciones_medicas,
                &m.condiciones_medicas_detalle,
            ),
            answer_with_detail("Medicamentos", &m.medicamentos, &m.medicamentos_detalle),
            format!("- Fumadora: {}", value_or_unspecified(&m.fumadora)),
        ]
        .join("\n"),
        format!(
            "💭 INTERÉS Y EXPECTATIVAS\n- Razón de consulta: {}\n- Expectativas: {}\n- Disponibilidad: {}\n- Cómo nos conoció: {}",
            text_or_unspecified(&i.razon),
            text_or_unspecified(&i.expectativas),
            text_or_unspecified(&i.disponibilidad),
            text_or_unspecified(&i.como_nos_conociste),
        ),
        format!(
            "📅 Fecha de registro: {}\n🌐 Fuente: Chatbot Web",
            registered_at.format("%d-%m-%Y, %H:%M:%S")
        ),
    ];
    sections.join("\n\n")
}

/// Copies intake answers into CRM custom fields.
///
/// Keys of `mapping` are dotted paths into the request JSON (`medical.edad`);
/// values are CRM fieldnames. Missing or null answers are skipped.
pub fn map_custom_fields(
    request: &LeadRequest,
    mapping: &BTreeMap<String, String>,
) -> Map<String, Value> {
    let mut fields = Map::new();
    if mapping.is_empty() {
        return fields;
    }
    let Ok(source) = serde_json::to_value(request) else {
        return fields;
    };
    for (path, fieldname) in mapping {
        let pointer = format!("/{}", path.replace('.', "/"));
        match source.pointer(&pointer) {
            Some(Value::Null) | None => {}
            Some(value) => {
                fields.insert(fieldname.clone(), value.clone());
            }
        }
    }
    fields
}

/// Lead document for an intake form submission.
pub fn build_intake_lead(
    request: &LeadRequest,
    options: &LeadOptions,
    registered_at: &DateTime<Tz>,
) -> NewLead {
    let (first_name, last_name) = split_name(request.personal.nombre.as_deref().unwrap_or_default());
    NewLead {
        doctype: LEAD_DOCTYPE.to_string(),
        first_name,
        last_name,
        email: request.personal.email.clone().unwrap_or_default(),
        mobile_no: request.personal.telefono.clone().unwrap_or_default(),
        source: Some("Website".to_string()),
        status: None,
        notes: build_lead_notes(request, registered_at),
        custom_fields: map_custom_fields(request, &options.custom_fields),
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        _ => "jpg",
    }
}

/// Decodes one intake photo into an attachment for `lead_id`.
///
/// Accepts raw base64 or a `data:<mime>;base64,` URL; the content type defaults
/// to `image/jpeg`.
pub fn decode_photo(photo: &LeadPhoto, index: usize, lead_id: &str) -> Result<Attachment, CrmError> {
    let (name, data, declared_type) = match photo {
        LeadPhoto::Encoded(data) => (None, data.as_str(), None),
        LeadPhoto::File {
            name,
            data,
            content_type,
        } => (name.clone(), data.as_str(), content_type.clone()),
    };

    let (url_type, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| CrmError::InvalidPhoto(format!("photo {} is not a valid data URL", index + 1)))?;
            let mime = header.trim_end_matches(";base64").to_string();
            (Some(mime).filter(|m| !m.is_empty()), payload)
        }
        None => (None, data),
    };

    let content_type = declared_type
        .or(url_type)
        .unwrap_or_else(|| "image/jpeg".to_string());
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CrmError::InvalidPhoto(format!("photo {}: {}", index + 1, e)))?;
    if bytes.is_empty() {
        return Err(CrmError::InvalidPhoto(format!("photo {} is empty", index + 1)));
    }

    let file_name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("foto_{}.{}", index + 1, extension_for(&content_type)));

    Ok(Attachment {
        doctype: LEAD_DOCTYPE.to_string(),
        docname: lead_id.to_string(),
        file_name,
        content_type,
        bytes,
    })
}

/// Result of a lead submission.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadOutcome {
    pub lead_id: Option<String>,
    pub comment_added: bool,
    /// `None` when the request carried no photos.
    pub photos_uploaded: Option<usize>,
}

/// Creates a lead and applies the enrichment steps enabled in [`LeadOptions`].
///
/// Only the lead creation is required; the comment and photo uploads are
/// best-effort and never fail the submission.
pub struct LeadSubmission<'a> {
    pub crm: &'a dyn CrmService,
    pub options: &'a LeadOptions,
    pub tz: Tz,
}

impl LeadSubmission<'_> {
    pub async fn submit(
        &self,
        request: &LeadRequest,
        now: DateTime<Utc>,
    ) -> Result<LeadOutcome, CrmError> {
        let lead = build_intake_lead(request, self.options, &now.with_timezone(&self.tz));
        let lead_id = self.crm.create_lead(lead).await?;
        info!("Lead created: {:?}", lead_id);

        let Some(id) = lead_id.as_deref() else {
            return Ok(LeadOutcome {
                lead_id,
                comment_added: false,
                photos_uploaded: None,
            });
        };

        let comment_added = match request.comentario.as_deref().map(str::trim) {
            Some(comment) if self.options.attach_comment && !comment.is_empty() => BestEffort::run(
                "lead comment",
                self.crm
                    .add_comment(LEAD_DOCTYPE.to_string(), id.to_string(), comment.to_string()),
            )
            .await
            .is_done(),
            _ => false,
        };

        let photos_uploaded = if request.fotos.is_empty() {
            None
        } else if !self.options.upload_photos {
            Some(0)
        } else {
            let mut uploaded = 0;
            for (index, photo) in request.fotos.iter().take(self.options.max_photos).enumerate() {
                let outcome = BestEffort::run("lead photo upload", async {
                    let attachment = decode_photo(photo, index, id)?;
                    self.crm.upload_file(attachment).await
                })
                .await;
                if outcome.is_done() {
                    uploaded += 1;
                }
            }
            Some(uploaded)
        };

        Ok(LeadOutcome {
            lead_id,
            comment_added,
            photos_uploaded,
        })
    }
}
