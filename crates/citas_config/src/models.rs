use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Frappe CRM Config ---
// Key and secret usually hold "secret_from_env" in the config file.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CrmConfig {
    #[serde(default = "default_crm_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub lead: LeadOptions,
}

impl CrmConfig {
    /// Returns `(key, secret)` when both are present and resolved.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().filter(|v| is_resolved(v))?;
        let secret = self.api_secret.as_deref().filter(|v| is_resolved(v))?;
        Some((key, secret))
    }
}

/// Optional enrichment steps applied when a lead is submitted.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LeadOptions {
    #[serde(default = "default_true")]
    pub attach_comment: bool,
    #[serde(default = "default_true")]
    pub upload_photos: bool,
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,
    /// Intake path (e.g. `medical.edad`) -> CRM fieldname (e.g. `custom_edad`).
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl Default for LeadOptions {
    fn default() -> Self {
        Self {
            attach_comment: true,
            upload_photos: true,
            max_photos: default_max_photos(),
            custom_fields: BTreeMap::new(),
        }
    }
}

// --- MercadoPago Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MercadoPagoConfig {
    #[serde(default = "default_mp_api")]
    pub api_base_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Secret used to validate the `x-signature` header of webhook notifications.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_currency")]
    pub currency_id: String,
    #[serde(default = "default_statement_descriptor")]
    pub statement_descriptor: String,
}

impl MercadoPagoConfig {
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|v| is_resolved(v))
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref().filter(|v| is_resolved(v))
    }
}

// --- WhatsApp proxy (backend side) ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct WhatsAppProxyConfig {
    /// Base URL of the companion verification service.
    #[serde(default)]
    pub service_url: Option<String>,
    /// Shared key sent to the companion as `X-Api-Key`.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl WhatsAppProxyConfig {
    pub fn service_url(&self) -> Option<&str> {
        self.service_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|v| !v.is_empty() && is_resolved(v))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|v| is_resolved(v))
    }
}

// --- WhatsApp companion service ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WhatsAppServiceConfig {
    #[serde(default = "default_companion_port")]
    pub port: u16,
    /// Base URL of the chat-automation gateway holding the WhatsApp session.
    pub gateway_url: String,
    #[serde(default)]
    pub gateway_api_key: Option<String>,
    #[serde(default = "default_session")]
    pub session: String,
    /// When set, callers must present it as `X-Api-Key`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_brand")]
    pub brand_name: String,
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl WhatsAppServiceConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|v| is_resolved(v))
    }

    pub fn gateway_api_key(&self) -> Option<&str> {
        self.gateway_api_key.as_deref().filter(|v| is_resolved(v))
    }
}

// --- Scheduling ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulingConfig {
    pub work_start: String,
    pub work_end: String,
    /// Grid step in minutes.
    pub slot_duration: u32,
    pub break_start: String,
    pub break_end: String,
    /// Length of a booked appointment in minutes.
    pub appointment_minutes: i64,
    /// IANA zone of the clinic, used for "tomorrow" fallbacks and note timestamps.
    pub timezone: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            work_start: "09:00".to_string(),
            work_end: "18:00".to_string(),
            slot_duration: 30,
            break_start: "13:00".to_string(),
            break_end: "14:00".to_string(),
            appointment_minutes: 30,
            timezone: "America/Santiago".to_string(),
        }
    }
}

// --- Logging ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for a daily rolling log file. No file logging when absent.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub journald: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            journald: false,
        }
    }
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_crm: bool,
    #[serde(default)]
    pub use_mercadopago: bool,
    #[serde(default)]
    pub use_whatsapp: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub crm: Option<CrmConfig>,
    #[serde(default)]
    pub mercadopago: Option<MercadoPagoConfig>,
    #[serde(default)]
    pub whatsapp: Option<WhatsAppProxyConfig>,
    #[serde(default)]
    pub whatsapp_service: Option<WhatsAppServiceConfig>,

    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A value still holding the `secret_from_env` marker was never resolved.
fn is_resolved(value: &str) -> bool {
    !value.is_empty() && value != crate::SECRET_MARKER
}

fn default_true() -> bool {
    true
}
fn default_max_photos() -> usize {
    3
}
fn default_crm_url() -> String {
    "https://crm.dranikkita.com".to_string()
}
fn default_mp_api() -> String {
    "https://api.mercadopago.com".to_string()
}
fn default_site_url() -> String {
    "https://dranikkita.com".to_string()
}
fn default_currency() -> String {
    "CLP".to_string()
}
fn default_statement_descriptor() -> String {
    "DRA NIKKITA".to_string()
}
fn default_companion_port() -> u16 {
    3001
}
fn default_session() -> String {
    "default".to_string()
}
fn default_brand() -> String {
    "Dra. Nikkita".to_string()
}
fn default_code_ttl() -> i64 {
    600
}
fn default_max_attempts() -> u8 {
    3
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}
