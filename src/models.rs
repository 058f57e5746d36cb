use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

// ============ Lead Models ============

/// Which form on the landing page produced a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Contact,
    Demo,
    Test,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Contact => "contact",
            FormType::Demo => "demo",
            FormType::Test => "test",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contact" => Ok(FormType::Contact),
            "demo" => Ok(FormType::Demo),
            "test" => Ok(FormType::Test),
            other => Err(AppError::BadRequest(format!(
                "Unknown form type '{}'. Expected contact, demo or test",
                other
            ))),
        }
    }
}

/// Market segment a lead is classified into.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MarketSegment {
    Vc,
    Pharma,
    Biotech,
    Entrepreneur,
    #[default]
    Unknown,
}

impl MarketSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSegment::Vc => "vc",
            MarketSegment::Pharma => "pharma",
            MarketSegment::Biotech => "biotech",
            MarketSegment::Entrepreneur => "entrepreneur",
            MarketSegment::Unknown => "unknown",
        }
    }

    /// Name of the CRM list contacts of this segment are filed under.
    pub fn list_name(&self) -> &'static str {
        match self {
            MarketSegment::Vc => "VC Leads",
            MarketSegment::Pharma => "Pharma Leads",
            MarketSegment::Biotech => "Biotech Leads",
            MarketSegment::Entrepreneur => "Entrepreneur Leads",
            MarketSegment::Unknown => "General Leads",
        }
    }
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw form body as posted by the landing page. Every field is optional
/// at this stage; the sanitizer decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLeadForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "projectType", alias = "project_type")]
    pub project_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Sanitized lead fields. `email` is always a validated, lower-cased address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFields {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, rename = "projectType")]
    pub project_type: String,
    #[serde(default)]
    pub message: String,
}

/// Where on the web a submission or interaction came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    /// Full URL of the page, including the query string.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default, rename = "userAgent", alias = "user_agent")]
    pub user_agent: Option<String>,
}

impl PageContext {
    /// Path component of the page URL, empty when the URL is missing or unparsable.
    pub fn path(&self) -> String {
        self.parsed_url()
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }

    /// Reads a query parameter from the page URL. Missing or empty values are `None`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.parsed_url()?
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    fn parsed_url(&self) -> Option<url::Url> {
        let raw = self.url.as_deref()?;
        url::Url::parse(raw).ok()
    }
}

/// A captured form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(flatten)]
    pub fields: LeadFields,
    pub form_type: FormType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub market_segment: MarketSegment,
}

impl Lead {
    /// Builds a lead at capture time, stamping it with the current time and
    /// the UTM tags found on the submitting page.
    pub fn capture(
        fields: LeadFields,
        form_type: FormType,
        market_segment: MarketSegment,
        source: &str,
        page: &PageContext,
    ) -> Self {
        Self {
            fields,
            form_type,
            timestamp: Utc::now(),
            source: source.to_string(),
            url: page.url.clone(),
            referrer: page.referrer.clone(),
            utm_source: page.query_param("utm_source"),
            utm_medium: page.query_param("utm_medium"),
            utm_campaign: page.query_param("utm_campaign"),
            market_segment,
        }
    }
}

/// Body of `POST /api/v1/leads/:form_type`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadSubmission {
    #[serde(flatten)]
    pub form: RawLeadForm,
    /// URL of the page the form was submitted from (UTM tags are read from it).
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

// ============ Analytics Models ============

/// A tracked interaction on the landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default, rename = "userAgent")]
    pub user_agent: String,
}

/// Body of `POST /api/v1/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackEventRequest {
    pub name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Aggregate counters over the stored events and leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_events: usize,
    pub total_leads: usize,
    pub page_views: usize,
    pub cta_clicks: usize,
    pub form_opens: usize,
    pub form_submits: usize,
    /// Form submits per page view, as a percentage.
    pub conversion_rate: f64,
    pub leads_by_segment: BTreeMap<MarketSegment, usize>,
}

// ============ Sink Models ============

/// Outcome of one notification attempt. Always returned as data, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl SinkResult {
    pub fn delivered(response: Value) -> Self {
        Self {
            success: true,
            error: None,
            response: Some(response),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            response: None,
        }
    }

    /// The sink is missing credentials; nothing was attempted.
    pub fn not_configured() -> Self {
        Self::failed("not configured")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Crm,
    Email,
    Webhook,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Crm => f.write_str("crm"),
            SinkKind::Email => f.write_str("email"),
            SinkKind::Webhook => f.write_str("webhook"),
        }
    }
}

/// One sink's result, attached to a submission for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkOutcome {
    pub sink: SinkKind,
    #[serde(flatten)]
    pub result: SinkResult,
}

/// What the submitter gets back. `success` reflects validation and local
/// capture only; sink outcomes live in `diagnostics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,
    pub lead: Option<Lead>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<SinkOutcome>,
}

impl SubmissionResult {
    pub fn accepted(lead: Lead, diagnostics: Vec<SinkOutcome>) -> Self {
        Self {
            success: true,
            lead: Some(lead),
            error: None,
            message: Some("Lead captured successfully".to_string()),
            diagnostics,
        }
    }

    pub fn rejected(error: &AppError) -> Self {
        Self {
            success: false,
            lead: None,
            error: Some(error.user_message()),
            message: None,
            diagnostics: Vec::new(),
        }
    }
}
