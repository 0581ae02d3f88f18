// --- File: crates/citas_mercadopago/src/logic.rs ---
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use citas_common::{validation_error, value_as_string, BestEffort, CitasError};
use citas_config::MercadoPagoConfig;
use citas_crm::logic::{appointment_window, format_crm_datetime, split_name};
use citas_crm::{CrmService, NewEvent, NewLead, LEAD_DOCTYPE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::service::{
    AppointmentMetadata, BackUrls, PayerPhone, Payment, Preference, PreferenceItem,
    PreferencePayer,
};

const DEFAULT_DURATION_MINUTES: i64 = 30;
/// Longest booking accepted from payment metadata (one working day).
const MAX_DURATION_MINUTES: i64 = 480;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// --- Payment preference ---

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub servicio: Option<String>,
    /// CLP amount; zero or absent means the appointment is free.
    #[serde(default)]
    pub precio: Option<Value>,
    #[serde(default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub hora: Option<String>,
    #[serde(default)]
    pub duracion: Option<Value>,
    #[serde(default)]
    pub motivo: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PaymentResponse {
    Checkout {
        success: bool,
        payment_url: Option<String>,
        sandbox_url: Option<String>,
        preference_id: String,
        external_reference: String,
    },
    Free {
        success: bool,
        free: bool,
        message: String,
    },
}

impl PaymentResponse {
    pub fn free() -> Self {
        PaymentResponse::Free {
            success: true,
            free: true,
            message: "Cita gratuita, no requiere pago".to_string(),
        }
    }
}

/// Price to charge, or `None` for a free appointment.
pub fn chargeable_price(precio: Option<&Value>) -> Result<Option<f64>, CitasError> {
    let Some(raw) = precio.and_then(value_as_string) else {
        return Ok(None);
    };
    let price: f64 = raw
        .parse()
        .map_err(|_| validation_error(format!("Invalid precio: {}", raw)))?;
    if price < 0.0 || !price.is_finite() {
        return Err(validation_error(format!("Invalid precio: {}", raw)));
    }
    Ok(Some(price).filter(|p| *p > 0.0))
}

/// `CITA-<unix millis>-<9 base36 chars>`
pub fn generate_external_reference<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("CITA-{}-{}", now.timestamp_millis(), suffix)
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// Checkout Pro preference for an appointment.
pub fn build_preference(
    request: &PaymentRequest,
    config: &MercadoPagoConfig,
    external_reference: &str,
    price: f64,
) -> Preference {
    let nombre = text(&request.nombre);
    let servicio = text(&request.servicio);
    let fecha = text(&request.fecha);
    let hora = text(&request.hora);
    let (name, surname) = split_name(&nombre);
    let site = config.site_url.trim_end_matches('/');
    let telefono = text(&request.telefono);

    Preference {
        items: vec![PreferenceItem {
            id: external_reference.to_string(),
            title: format!("Cita: {}", servicio),
            description: format!("Cita con Dra. Nikkita - {} a las {}", fecha, hora),
            quantity: 1,
            currency_id: config.currency_id.clone(),
            unit_price: price,
        }],
        payer: PreferencePayer {
            name,
            surname,
            email: text(&request.email),
            phone: PayerPhone {
                number: telefono.chars().filter(char::is_ascii_digit).collect(),
            },
        },
        back_urls: BackUrls {
            success: format!("{}/pago-exitoso.html?ref={}", site, external_reference),
            failure: format!("{}/pago-fallido.html?ref={}", site, external_reference),
            pending: format!("{}/pago-pendiente.html?ref={}", site, external_reference),
        },
        auto_return: "approved".to_string(),
        external_reference: external_reference.to_string(),
        notification_url: format!("{}/api/payment-webhook", site),
        statement_descriptor: config.statement_descriptor.clone(),
        metadata: AppointmentMetadata {
            nombre,
            email: text(&request.email),
            telefono,
            servicio,
            fecha,
            hora,
            duracion: request.duracion.clone().unwrap_or(Value::Null),
            motivo: text(&request.motivo),
        },
    }
}

/// Chilean peso amount with `.` thousands separators: `45000.0` -> `45.000`.
pub fn format_clp(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

// --- Paid appointments ---

/// Appointment details recovered from an approved payment.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaidAppointment {
    pub nombre: String,
    #[serde(skip)]
    pub email: String,
    #[serde(skip)]
    pub telefono: String,
    pub servicio: String,
    pub fecha: Option<String>,
    pub hora: Option<String>,
    #[serde(skip)]
    pub duracion: i64,
    #[serde(skip)]
    pub motivo: String,
}

fn meta_string(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(value_as_string)
}

/// Minutes in `1..=MAX_DURATION_MINUTES`; anything else is ignored.
fn parse_duration(raw: &str) -> Option<i64> {
    let minutes = raw.trim().parse::<f64>().ok()?.round();
    (1.0..=MAX_DURATION_MINUTES as f64)
        .contains(&minutes)
        .then_some(minutes as i64)
}

impl PaidAppointment {
    /// Reads the metadata stored on the preference, falling back to the payer.
    pub fn from_payment(payment: &Payment) -> Self {
        let empty = Map::new();
        let metadata = payment.metadata.as_ref().unwrap_or(&empty);
        let payer = payment.payer.clone().unwrap_or_default();

        Self {
            nombre: meta_string(metadata, "nombre")
                .or(payer.first_name)
                .unwrap_or_else(|| "Sin nombre".to_string()),
            email: meta_string(metadata, "email")
                .or(payer.email)
                .unwrap_or_default(),
            telefono: meta_string(metadata, "telefono").unwrap_or_default(),
            servicio: meta_string(metadata, "servicio").unwrap_or_else(|| "Consulta".to_string()),
            fecha: meta_string(metadata, "fecha"),
            hora: meta_string(metadata, "hora"),
            duracion: meta_string(metadata, "duracion")
                .as_deref()
                .and_then(parse_duration)
                .unwrap_or(DEFAULT_DURATION_MINUTES),
            motivo: meta_string(metadata, "motivo").unwrap_or_default(),
        }
    }

    /// Event window in clinic wall-clock time.
    ///
    /// Without a usable `fecha`/`hora` the booking lands on tomorrow 10:00 in `tz`
    /// with the default length.
    pub fn window(&self, now: DateTime<Utc>, tz: Tz) -> (NaiveDateTime, NaiveDateTime) {
        if let (Some(fecha), Some(hora)) = (&self.fecha, &self.hora) {
            match appointment_window(fecha, hora, self.duracion) {
                Ok(window) => return window,
                Err(err) => warn!("Unusable appointment metadata ({}), using fallback", err),
            }
        }
        let tomorrow = now.with_timezone(&tz).date_naive() + Duration::days(1);
        let start = tomorrow.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default());
        (start, start + Duration::minutes(DEFAULT_DURATION_MINUTES))
    }
}

/// Identifiers of what a payment produced in the payment gateway.
pub struct PaymentReceipt<'a> {
    pub payment_id: &'a str,
    pub external_reference: Option<&'a str>,
    pub amount: Option<f64>,
}

fn amount_text(amount: Option<f64>) -> String {
    amount.map(format_clp).unwrap_or_default()
}

pub fn build_paid_event(
    appointment: &PaidAppointment,
    receipt: &PaymentReceipt<'_>,
    window: (NaiveDateTime, NaiveDateTime),
) -> NewEvent {
    let description = [
        format!("<b>👤 Paciente:</b> {}<br>", appointment.nombre),
        format!("<b>📱 Teléfono:</b> {}<br>", appointment.telefono),
        format!("<b>📧 Email:</b> {}<br>", appointment.email),
        format!("<b>🏥 Servicio:</b> {}<br>", appointment.servicio),
        format!("<b>💰 Monto pagado:</b> ${} CLP<br>", amount_text(receipt.amount)),
        format!(
            "<b>📝 Motivo:</b> {}<br>",
            Some(appointment.motivo.as_str())
                .filter(|m| !m.is_empty())
                .unwrap_or("No especificado")
        ),
        "<br>".to_string(),
        format!("<b>🔖 ID de pago:</b> {}<br>", receipt.payment_id),
        format!(
            "<b>📅 Referencia:</b> {}<br>",
            receipt.external_reference.unwrap_or_default()
        ),
        "<br>".to_string(),
        "<i style=\"color: green;\">✓ Pago confirmado vía MercadoPago</i>".to_string(),
    ]
    .join("\n");

    NewEvent::open(
        format!("✅ Cita PAGADA: {} - {}", appointment.nombre, appointment.servicio),
        format_crm_datetime(&window.0),
        format_crm_datetime(&window.1),
        description,
    )
}

pub fn build_paid_lead(appointment: &PaidAppointment, receipt: &PaymentReceipt<'_>) -> NewLead {
    let (first_name, last_name) = split_name(&appointment.nombre);
    NewLead {
        doctype: LEAD_DOCTYPE.to_string(),
        first_name: Some(first_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Sin nombre".to_string()),
        last_name,
        email: appointment.email.clone(),
        mobile_no: appointment.telefono.clone(),
        source: None,
        status: Some("New".to_string()),
        notes: format!(
            "Cita pagada: {} - {} {}\nMonto: ${} CLP\nID Pago: {}",
            appointment.servicio,
            appointment.fecha.as_deref().unwrap_or_default(),
            appointment.hora.as_deref().unwrap_or_default(),
            amount_text(receipt.amount),
            receipt.payment_id
        ),
        custom_fields: Map::new(),
    }
}

/// What was written to the CRM for a paid appointment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaidRecord {
    pub event_id: Option<String>,
    pub lead_id: Option<String>,
}

/// Creates the paid event and the matching lead. Both calls are best-effort.
pub async fn record_paid_appointment(
    crm: &dyn CrmService,
    appointment: &PaidAppointment,
    receipt: &PaymentReceipt<'_>,
    window: (NaiveDateTime, NaiveDateTime),
) -> PaidRecord {
    let event = build_paid_event(appointment, receipt, window);
    let event_id = BestEffort::run("paid appointment event", crm.create_event(event))
        .await
        .ok()
        .flatten();
    info!("Paid appointment event: {:?}", event_id);

    let lead = build_paid_lead(appointment, receipt);
    let lead_id = BestEffort::run("paid appointment lead", crm.create_lead(lead))
        .await
        .ok()
        .flatten();

    PaidRecord { event_id, lead_id }
}

// --- Webhook ---

/// MercadoPago payment ids are numeric; anything outside `[A-Za-z0-9_-]` is refused
/// before it reaches a request path.
pub fn is_valid_payment_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Query string MercadoPago appends to webhook calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "data.id")]
    pub data_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// A notification reduced to what the handler needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotification {
    pub kind: Option<String>,
    pub payment_id: Option<String>,
}

impl WebhookNotification {
    /// Reads `type`/`data.id` from the body, falling back to the query string.
    ///
    /// Bodies that are not JSON are treated as empty.
    pub fn parse(body: &[u8], query: &WebhookQuery) -> Self {
        let body: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

        let kind = body
            .get("type")
            .or_else(|| body.get("topic"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| query.kind.clone())
            .or_else(|| query.topic.clone());
        let payment_id = body
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(value_as_string)
            .or_else(|| query.data_id.clone())
            .or_else(|| query.id.clone())
            .map(|id| id.trim().to_string())
            .filter(|id| is_valid_payment_id(id));

        Self { kind, payment_id }
    }

    pub fn is_payment(&self) -> bool {
        self.kind.as_deref() == Some("payment")
    }
}

// --- Verify payment ---

#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams, utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyPaymentQuery {
    pub payment_id: Option<String>,
    pub status: Option<String>,
    pub external_reference: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VerifyPaymentResponse {
    Approved {
        success: bool,
        payment_status: String,
        amount: Option<f64>,
        event_id: Option<String>,
        lead_id: Option<String>,
        appointment: PaidAppointment,
    },
    NotApproved {
        success: bool,
        status: Option<String>,
        message: String,
    },
}
