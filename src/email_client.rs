//! Transactional email relay (EmailJS REST API).

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{FormType, LeadFields};

/// Template parameters sent with every notification. The EmailJS template
/// references these names directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateParams {
    pub to_email: String,
    pub form_type: String,
    pub lead_name: String,
    pub lead_email: String,
    pub lead_company: String,
    pub lead_phone: String,
    pub project_type: String,
    pub message: String,
    pub timestamp: String,
    pub subject: String,
}

impl TemplateParams {
    pub fn for_lead(form_type: FormType, to_email: &str, fields: &LeadFields, brand: &str) -> Self {
        fn or_default(value: &str, default: &str) -> String {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        }

        Self {
            to_email: to_email.to_string(),
            form_type: form_type.to_string(),
            lead_name: or_default(&fields.name, "Not provided"),
            lead_email: or_default(&fields.email, "Not provided"),
            lead_company: or_default(&fields.company, "Not provided"),
            lead_phone: or_default(&fields.phone, "Not provided"),
            project_type: or_default(&fields.project_type, "Not specified"),
            message: or_default(&fields.message, "No message"),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            subject: format!("New {} lead from {}", form_type, brand),
        }
    }
}

#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    base_url: String,
    service_id: String,
    template_id: String,
    public_key: String,
}

impl EmailClient {
    /// Builds a client from configuration. All three EmailJS identifiers are
    /// required; a missing one is a configuration error.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let (Some(service_id), Some(template_id), Some(public_key)) = (
            config.emailjs_service_id.clone(),
            config.emailjs_template_id.clone(),
            config.emailjs_public_key.clone(),
        ) else {
            return Err(AppError::Configuration(
                "EmailJS not configured. Set EMAILJS_SERVICE_ID, EMAILJS_TEMPLATE_ID and EMAILJS_PUBLIC_KEY"
                    .to_string(),
            ));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create EmailJS client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.emailjs_base_url.trim_end_matches('/').to_string(),
            service_id,
            template_id,
            public_key,
        })
    }

    /// Sends one templated email. Returns the relay's status and response text.
    pub async fn send(&self, params: &TemplateParams) -> Result<Value, AppError> {
        let url = format!("{}/api/v1.0/email/send", self.base_url);
        tracing::info!("Sending '{}' email to {}", params.subject, params.to_email);

        let body = json!({
            "service_id": self.service_id,
            "template_id": self.template_id,
            "user_id": self.public_key,
            "template_params": params,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("EmailJS request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown response".to_string());

        if !status.is_success() {
            return Err(AppError::SinkDelivery(format!(
                "EmailJS returned {}: {}",
                status, text
            )));
        }

        Ok(json!({ "status": status.as_u16(), "text": text }))
    }

    /// Sends a test email with fixed sample lead data.
    pub async fn send_test_email(
        &self,
        to_email: &str,
        message: &str,
        brand: &str,
    ) -> Result<Value, AppError> {
        let fields = LeadFields {
            name: "Test User".to_string(),
            email: to_email.to_string(),
            company: "Test Company".to_string(),
            phone: "Not provided".to_string(),
            project_type: "Test".to_string(),
            message: message.to_string(),
        };
        let params = TemplateParams::for_lead(FormType::Test, to_email, &fields, brand);

        let response = self.send(&params).await?;
        tracing::info!("Test email sent to {}", to_email);
        Ok(response)
    }
}
