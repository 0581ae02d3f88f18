//! MercadoPago REST client (Checkout Pro preferences and payment lookup).

use citas_common::services::BoxFuture;
use citas_common::{is_success, read_body, HTTP_CLIENT};
use citas_config::MercadoPagoConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::MercadoPagoError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub quantity: u32,
    pub currency_id: String,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayerPhone {
    pub number: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreferencePayer {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: PayerPhone,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Appointment details carried through the checkout and returned on the payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentMetadata {
    pub nombre: String,
    pub email: String,
    pub telefono: String,
    pub servicio: String,
    pub fecha: String,
    pub hora: String,
    pub duracion: Value,
    pub motivo: String,
}

/// Body of `POST /checkout/preferences`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Preference {
    pub items: Vec<PreferenceItem>,
    pub payer: PreferencePayer,
    pub back_urls: BackUrls,
    pub auto_return: String,
    pub external_reference: String,
    pub notification_url: String,
    pub statement_descriptor: String,
    pub metadata: AppointmentMetadata,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PreferenceCreated {
    pub id: String,
    #[serde(default)]
    pub init_point: Option<String>,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PaymentPayer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The fields of `GET /v1/payments/{id}` the handlers use.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Payment {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<f64>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub payer: Option<PaymentPayer>,
}

impl Payment {
    pub fn is_approved(&self) -> bool {
        self.status.as_deref() == Some("approved")
    }
}

/// Payment operations the handlers depend on.
pub trait PaymentGateway: Send + Sync {
    /// Creates a Checkout Pro preference; `idempotency_key` makes retries safe.
    fn create_preference(
        &self,
        preference: Preference,
        idempotency_key: String,
    ) -> BoxFuture<'_, PreferenceCreated, MercadoPagoError>;

    fn get_payment(&self, payment_id: String) -> BoxFuture<'_, Payment, MercadoPagoError>;
}

#[derive(Clone)]
pub struct MercadoPagoClient {
    api_base_url: String,
    access_token: String,
    client: Client,
}

impl MercadoPagoClient {
    pub fn new(api_base_url: &str, access_token: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            client: HTTP_CLIENT.clone(),
        }
    }

    pub fn from_config(config: &MercadoPagoConfig) -> Result<Self, MercadoPagoError> {
        let token = config.token().ok_or(MercadoPagoError::NotConfigured)?;
        Ok(Self::new(&config.api_base_url, token))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, MercadoPagoError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let (status, body) = read_body(response).await?;
        if is_success(status) {
            Ok(body)
        } else {
            Err(MercadoPagoError::Api {
                status,
                details: body,
            })
        }
    }

    async fn post_preference(
        &self,
        preference: Preference,
        idempotency_key: String,
    ) -> Result<PreferenceCreated, MercadoPagoError> {
        let url = format!("{}/checkout/preferences", self.api_base_url);
        debug!("Creating MercadoPago preference {}", preference.external_reference);

        let body = self
            .send(
                self.client
                    .post(url)
                    .header("X-Idempotency-Key", idempotency_key)
                    .json(&preference),
            )
            .await?;
        let created: PreferenceCreated = serde_json::from_value(body)
            .map_err(|e| MercadoPagoError::UnexpectedResponse(e.to_string()))?;
        info!("MercadoPago preference created: {}", created.id);
        Ok(created)
    }

    async fn fetch_payment(&self, payment_id: String) -> Result<Payment, MercadoPagoError> {
        let url = format!("{}/v1/payments/{}", self.api_base_url, payment_id);
        let body = self.send(self.client.get(url)).await?;
        let payment: Payment = serde_json::from_value(body)
            .map_err(|e| MercadoPagoError::UnexpectedResponse(e.to_string()))?;
        info!("Payment {} status: {:?}", payment_id, payment.status);
        Ok(payment)
    }
}

impl PaymentGateway for MercadoPagoClient {
    fn create_preference(
        &self,
        preference: Preference,
        idempotency_key: String,
    ) -> BoxFuture<'_, PreferenceCreated, MercadoPagoError> {
        Box::pin(self.post_preference(preference, idempotency_key))
    }

    fn get_payment(&self, payment_id: String) -> BoxFuture<'_, Payment, MercadoPagoError> {
        Box::pin(self.fetch_payment(payment_id))
    }
}

/// The payment gateway for this config, if a usable access token is present.
pub fn gateway_from_config(config: Option<&MercadoPagoConfig>) -> Option<Arc<dyn PaymentGateway>> {
    match MercadoPagoClient::from_config(config?) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            warn!("MercadoPago client not available: {}", err);
            None
        }
    }
}
