//! Best-effort notification sinks.
//!
//! A sink never returns an error: every failure is logged and folded into a
//! [`SinkResult`] so one sink can never stop another, or the submission.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::crm_client::{CreateContact, HubSpotClient};
use crate::email_client::{EmailClient, TemplateParams};
use crate::errors::{AppError, ResultExt};
use crate::models::{FormType, Lead, SinkKind, SinkResult};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn kind(&self) -> SinkKind;

    async fn deliver(&self, lead: &Lead, form_type: FormType) -> SinkResult;
}

// ============ CRM ============

/// Creates or updates the lead as a HubSpot contact.
pub struct CrmSink {
    client: HubSpotClient,
    lead_source: String,
}

impl CrmSink {
    /// `brand` is used for the contact's `lead_source` property.
    pub fn new(client: HubSpotClient, brand: &str) -> Self {
        Self {
            client,
            lead_source: format!("{} Landing Page", brand),
        }
    }

    /// Properties for a brand-new contact.
    pub fn create_properties(&self, lead: &Lead, form_type: FormType) -> Map<String, Value> {
        let fields = &lead.fields;
        let (first_name, last_name) = split_name(&fields.name);

        let mut properties = Self::form_properties(lead, form_type);
        properties.insert("email".to_string(), json!(fields.email));
        properties.insert("firstname".to_string(), json!(first_name));
        properties.insert("lastname".to_string(), json!(last_name));
        properties.insert("company".to_string(), json!(fields.company));
        properties.insert("phone".to_string(), json!(fields.phone));
        properties.insert("hs_lead_status".to_string(), json!("NEW"));
        properties.insert("lead_source".to_string(), json!(self.lead_source));
        properties
    }

    /// Properties refreshed on an existing contact.
    pub fn update_properties(lead: &Lead, form_type: FormType) -> Map<String, Value> {
        let mut properties = Self::form_properties(lead, form_type);
        properties.insert("hs_lead_status".to_string(), json!("OPEN"));
        properties
    }

    fn form_properties(lead: &Lead, form_type: FormType) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert("market_segment".to_string(), json!(lead.market_segment));
        properties.insert("project_type".to_string(), json!(lead.fields.project_type));
        properties.insert("message".to_string(), json!(lead.fields.message));
        properties.insert("form_type".to_string(), json!(form_type));
        properties.insert(
            "consultation_requested".to_string(),
            json!((form_type == FormType::Contact).to_string()),
        );
        properties.insert(
            "demo_requested".to_string(),
            json!((form_type == FormType::Demo).to_string()),
        );
        properties
    }

    async fn upsert(&self, lead: &Lead, form_type: FormType) -> Result<Value, AppError> {
        let email = &lead.fields.email;

        if let Some(contact_id) = self.client.find_contact_by_email(email).await? {
            return self.update(&contact_id, lead, form_type).await;
        }

        match self
            .client
            .create_contact(self.create_properties(lead, form_type))
            .await?
        {
            CreateContact::Created(response) => {
                if let Some(contact_id) = HubSpotClient::extract_id(&response) {
                    tracing::info!("Contact created in HubSpot: {}", contact_id);
                    self.spawn_list_membership(contact_id, lead);
                }
                Ok(response)
            }
            CreateContact::Conflict => {
                tracing::info!("Contact already exists, updating instead");
                let contact_id = self
                    .client
                    .find_contact_by_email(email)
                    .await?
                    .ok_or_else(|| {
                        AppError::SinkDelivery(format!(
                            "HubSpot reported a duplicate for {} but search found none",
                            email
                        ))
                    })?;
                self.update(&contact_id, lead, form_type).await
            }
        }
    }

    async fn update(
        &self,
        contact_id: &str,
        lead: &Lead,
        form_type: FormType,
    ) -> Result<Value, AppError> {
        self.client
            .update_contact(contact_id, Self::update_properties(lead, form_type))
            .await
            .with_context(|| format!("updating contact {}", contact_id))?;

        tracing::info!("Contact updated in HubSpot: {}", contact_id);
        Ok(json!({ "id": contact_id }))
    }

    /// Files the contact under its segment list in the background. Never
    /// affects the sink's result.
    fn spawn_list_membership(&self, contact_id: String, lead: &Lead) {
        let client = self.client.clone();
        let list_name = lead.market_segment.list_name();

        tokio::spawn(async move {
            match add_to_segment_list(&client, &contact_id, list_name).await {
                Ok(true) => tracing::info!("Added contact to {} list", list_name),
                Ok(false) => tracing::warn!(
                    "List \"{}\" not found - create it in HubSpot",
                    list_name
                ),
                Err(e) => tracing::warn!("Could not add contact to list (non-critical): {}", e),
            }
        });
    }
}

/// Returns `Ok(false)` when the list does not exist.
async fn add_to_segment_list(
    client: &HubSpotClient,
    contact_id: &str,
    list_name: &str,
) -> Result<bool, AppError> {
    let Some(list_id) = client.find_list_by_name(list_name).await? else {
        return Ok(false);
    };
    client.add_contact_to_list(list_id, contact_id).await?;
    Ok(true)
}

/// Splits on the first space: "Mary Jane Watson" is ("Mary", "Jane Watson").
pub fn split_name(name: &str) -> (String, String) {
    match name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

#[async_trait]
impl NotificationSink for CrmSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Crm
    }

    async fn deliver(&self, lead: &Lead, form_type: FormType) -> SinkResult {
        match self.upsert(lead, form_type).await {
            Ok(response) => {
                tracing::info!("Lead synced to HubSpot CRM");
                SinkResult::delivered(response)
            }
            Err(e) => {
                tracing::warn!("HubSpot error (non-critical, continuing): {}", e);
                SinkResult::failed(e.to_string())
            }
        }
    }
}

// ============ Email ============

/// Notifies the team by email about a new lead.
pub struct EmailSink {
    client: Option<EmailClient>,
    to_email: String,
    brand: String,
}

impl EmailSink {
    /// `client` is `None` when EmailJS is not configured; the sink then
    /// reports "not configured" on every delivery without sending anything.
    pub fn new(client: Option<EmailClient>, to_email: String, brand: String) -> Self {
        Self {
            client,
            to_email,
            brand,
        }
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Email
    }

    async fn deliver(&self, lead: &Lead, form_type: FormType) -> SinkResult {
        let Some(client) = &self.client else {
            tracing::warn!("EmailJS not configured. Email notification skipped.");
            return SinkResult::not_configured();
        };

        let params = TemplateParams::for_lead(form_type, &self.to_email, &lead.fields, &self.brand);
        match client.send(&params).await {
            Ok(response) => {
                tracing::info!("Email notification sent successfully");
                SinkResult::delivered(response)
            }
            Err(e) => {
                tracing::error!("Error sending email notification: {}", e);
                SinkResult::failed(e.to_string())
            }
        }
    }
}

// ============ Webhook ============

/// POSTs the lead as JSON to a custom endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    endpoint: String,
    source: String,
}

impl WebhookSink {
    pub fn new(endpoint: String, source: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create webhook client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            source,
        })
    }

    /// Sanitized form fields plus `form_type`, `source` and a send timestamp.
    pub fn payload(&self, lead: &Lead, form_type: FormType) -> Value {
        let mut body = match serde_json::to_value(&lead.fields) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("form_type".to_string(), json!(form_type));
        body.insert("source".to_string(), json!(self.source));
        body.insert(
            "timestamp".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Value::Object(body)
    }

    async fn post(&self, lead: &Lead, form_type: FormType) -> Result<Value, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(lead, form_type))
            .send()
            .await
            .context("Lead API request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SinkDelivery(format!(
                "Lead API submission failed: {}",
                status
            )));
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(json!({ "status": status.as_u16(), "body": body }))
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Webhook
    }

    async fn deliver(&self, lead: &Lead, form_type: FormType) -> SinkResult {
        match self.post(lead, form_type).await {
            Ok(response) => SinkResult::delivered(response),
            Err(e) => {
                tracing::error!("Lead API error: {}", e);
                SinkResult::failed(e.to_string())
            }
        }
    }
}
