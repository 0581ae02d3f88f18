//! Frappe CRM client.
//!
//! [`CrmService`] is the seam the handlers (and the payment crate) depend on;
//! [`FrappeClient`] implements it over Frappe's REST resources with token auth.

use chrono::NaiveDate;
use citas_common::services::BoxFuture;
use citas_common::{data_name, is_success, read_body, HTTP_CLIENT};
use citas_config::CrmConfig;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::CrmError;

/// Doctype of Frappe CRM leads.
pub const LEAD_DOCTYPE: &str = "CRM Lead";

/// An event row as returned by the Event list endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CrmEvent {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub starts_on: String,
    #[serde(default)]
    pub ends_on: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of a new Event document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewEvent {
    pub doctype: String,
    pub subject: String,
    pub starts_on: String,
    pub ends_on: String,
    pub event_type: String,
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_doctype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_docname: Option<String>,
}

impl NewEvent {
    /// A public, open event; the defaults every booking uses.
    pub fn open(subject: String, starts_on: String, ends_on: String, description: String) -> Self {
        Self {
            doctype: "Event".to_string(),
            subject,
            starts_on,
            ends_on,
            event_type: "Public".to_string(),
            status: "Open".to_string(),
            description,
            reference_doctype: None,
            reference_docname: None,
        }
    }

    /// Links the event to an existing lead.
    pub fn linked_to_lead(mut self, lead_id: &str) -> Self {
        self.reference_doctype = Some(LEAD_DOCTYPE.to_string());
        self.reference_docname = Some(lead_id.to_string());
        self
    }
}

/// Body of a new CRM Lead document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewLead {
    pub doctype: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub notes: String,
    /// Mapped custom fields, written at top level.
    #[serde(flatten)]
    pub custom_fields: Map<String, Value>,
}

/// A file to attach to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub doctype: String,
    pub docname: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Operations the citas handlers need from the CRM.
pub trait CrmService: Send + Sync {
    /// Non-cancelled events starting on `date`.
    fn list_events(&self, date: NaiveDate) -> BoxFuture<'_, Vec<CrmEvent>, CrmError>;

    /// Creates an event and returns its document name when the CRM reports one.
    fn create_event(&self, event: NewEvent) -> BoxFuture<'_, Option<String>, CrmError>;

    /// Creates a lead and returns its document name when the CRM reports one.
    fn create_lead(&self, lead: NewLead) -> BoxFuture<'_, Option<String>, CrmError>;

    /// Adds a timeline comment to a document.
    fn add_comment(
        &self,
        doctype: String,
        docname: String,
        content: String,
    ) -> BoxFuture<'_, (), CrmError>;

    /// Uploads a file attached to a document; returns the stored file URL if any.
    fn upload_file(&self, attachment: Attachment) -> BoxFuture<'_, Option<String>, CrmError>;
}

/// Frappe REST client authenticated with `token <key>:<secret>`.
#[derive(Clone)]
pub struct FrappeClient {
    base_url: String,
    authorization: String,
    client: Client,
}

impl FrappeClient {
    pub fn new(base_url: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("token {}:{}", api_key, api_secret),
            client: HTTP_CLIENT.clone(),
        }
    }

    /// Builds a client, or `NotConfigured` when the credentials are missing.
    pub fn from_config(config: &CrmConfig) -> Result<Self, CrmError> {
        let (key, secret) = config.credentials().ok_or(CrmError::NotConfigured)?;
        Ok(Self::new(&config.base_url, key, secret))
    }

    fn resource_url(&self, doctype: &str) -> String {
        format!("{}/api/resource/{}", self.base_url, doctype)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, CrmError> {
        let response = request
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .send()
            .await?;
        let (status, body) = read_body(response).await?;
        if is_success(status) {
            Ok(body)
        } else {
            Err(CrmError::Api {
                status,
                details: body,
            })
        }
    }

    async fn insert<T: Serialize + ?Sized>(
        &self,
        doctype: &str,
        document: &T,
    ) -> Result<Option<String>, CrmError> {
        let body = self
            .send(self.client.post(self.resource_url(doctype)).json(document))
            .await?;
        let name = data_name(&body);
        info!("Frappe {} created: {:?}", doctype, name);
        Ok(name)
    }

    async fn fetch_events(&self, date: NaiveDate) -> Result<Vec<CrmEvent>, CrmError> {
        let day = date.format("%Y-%m-%d").to_string();
        let filters = json!([
            ["starts_on", ">=", format!("{} 00:00:00", day)],
            ["starts_on", "<=", format!("{} 23:59:59", day)],
            ["status", "!=", "Cancelled"]
        ]);
        let fields = json!(["name", "subject", "starts_on", "ends_on", "status"]);
        let query = serde_urlencoded::to_string([
            ("filters", filters.to_string()),
            ("fields", fields.to_string()),
            ("limit_page_length", "500".to_string()),
        ])
        .map_err(|e| CrmError::UnexpectedResponse(e.to_string()))?;

        let url = format!("{}?{}", self.resource_url("Event"), query);
        debug!("Fetching events: {}", url);

        let body = self.send(self.client.get(url)).await?;
        let rows = body.get("data").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(rows).map_err(|e| CrmError::UnexpectedResponse(e.to_string()))
    }

    async fn post_comment(
        &self,
        doctype: String,
        docname: String,
        content: String,
    ) -> Result<(), CrmError> {
        let comment = json!({
            "doctype": "Comment",
            "comment_type": "Comment",
            "reference_doctype": doctype,
            "reference_name": docname,
            "content": content,
        });
        self.insert("Comment", &comment).await.map(|_| ())
    }

    async fn post_file(&self, attachment: Attachment) -> Result<Option<String>, CrmError> {
        let part = multipart::Part::bytes(attachment.bytes)
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.content_type)
            .map_err(|e| CrmError::InvalidPhoto(e.to_string()))?;
        let form = multipart::Form::new()
            .text("doctype", attachment.doctype)
            .text("docname", attachment.docname)
            .text("is_private", "1")
            .part("file", part);

        let url = format!("{}/api/method/upload_file", self.base_url);
        let body = self.send(self.client.post(url).multipart(form)).await?;
        let file_url = body
            .get("message")
            .and_then(|m| m.get("file_url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        info!("Uploaded {} -> {:?}", attachment.file_name, file_url);
        Ok(file_url)
    }
}

impl CrmService for FrappeClient {
    fn list_events(&self, date: NaiveDate) -> BoxFuture<'_, Vec<CrmEvent>, CrmError> {
        Box::pin(self.fetch_events(date))
    }

    fn create_event(&self, event: NewEvent) -> BoxFuture<'_, Option<String>, CrmError> {
        Box::pin(async move { self.insert("Event", &event).await })
    }

    fn create_lead(&self, lead: NewLead) -> BoxFuture<'_, Option<String>, CrmError> {
        Box::pin(async move { self.insert(LEAD_DOCTYPE, &lead).await })
    }

    fn add_comment(
        &self,
        doctype: String,
        docname: String,
        content: String,
    ) -> BoxFuture<'_, (), CrmError> {
        Box::pin(self.post_comment(doctype, docname, content))
    }

    fn upload_file(&self, attachment: Attachment) -> BoxFuture<'_, Option<String>, CrmError> {
        Box::pin(self.post_file(attachment))
    }
}

/// The CRM client for this config, if the CRM section and credentials are present.
pub fn crm_from_config(config: Option<&CrmConfig>) -> Option<Arc<dyn CrmService>> {
    let config = config?;
    match FrappeClient::from_config(config) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            tracing::warn!("CRM client not available: {}", err);
            None
        }
    }
}
