/// Lead submission pipeline
///
/// One submission runs:
/// 1. Sanitize and validate the form (nothing is written if this fails)
/// 2. Classify the market segment
/// 3. Append the lead to the lead store and a `form_submit` event to the event log
/// 4. Fan out to every configured sink concurrently, each bounded by a timeout
/// 5. Report success based on steps 1-3 only; sink outcomes ride along as diagnostics
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{object, AnalyticsTracker};
use crate::classifier::classify;
use crate::config::Config;
use crate::crm_client::HubSpotClient;
use crate::email_client::EmailClient;
use crate::models::{
    FormType, Lead, PageContext, RawLeadForm, SinkOutcome, SinkResult, SubmissionResult,
};
use crate::sanitize::sanitize_lead;
use crate::sinks::{CrmSink, EmailSink, NotificationSink, WebhookSink};
use crate::storage::LeadStore;

/// How long the response waits on any one sink.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LeadCaptureService {
    leads: Arc<LeadStore>,
    tracker: Arc<AnalyticsTracker>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    sink_timeout: Duration,
    source: String,
}

impl LeadCaptureService {
    pub fn new(leads: Arc<LeadStore>, tracker: Arc<AnalyticsTracker>, source: String) -> Self {
        Self {
            leads,
            tracker,
            sinks: Vec::new(),
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            source,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = timeout;
        self
    }

    /// Wires up every sink the configuration enables.
    ///
    /// - CRM: when a HubSpot key is present
    /// - Webhook: when `LEAD_API_ENDPOINT` is set
    /// - Email: only when email notifications are switched on
    pub async fn from_config(
        config: &Config,
        leads: Arc<LeadStore>,
        tracker: Arc<AnalyticsTracker>,
    ) -> Self {
        let mut service = Self::new(leads, tracker, config.lead_source.clone());

        match HubSpotClient::connect(
            config.hubspot_base_url.clone(),
            config.hubspot_api_key.clone(),
        )
        .await
        {
            Ok(client) => {
                tracing::info!("✓ HubSpot CRM sink enabled: {}", config.hubspot_base_url);
                service = service.with_sink(Arc::new(CrmSink::new(client, &config.brand_name)));
            }
            Err(e) => tracing::info!("HubSpot CRM sink disabled: {}", e),
        }

        if let Some(endpoint) = &config.lead_api_endpoint {
            match WebhookSink::new(endpoint.clone(), config.lead_source.clone()) {
                Ok(sink) => {
                    tracing::info!("✓ Lead API webhook sink enabled");
                    service = service.with_sink(Arc::new(sink));
                }
                Err(e) => tracing::error!("Lead API webhook sink disabled: {}", e),
            }
        }

        if config.enable_email_notifications {
            let client = match EmailClient::from_config(config) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            };
            tracing::info!("✓ Email notification sink enabled");
            service = service.with_sink(Arc::new(EmailSink::new(
                client,
                config.emailjs_to_email.clone(),
                config.brand_name.clone(),
            )));
        }

        service
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Captures one form submission.
    pub async fn submit(
        &self,
        form_type: FormType,
        raw: &RawLeadForm,
        page: &PageContext,
    ) -> SubmissionResult {
        let fields = match sanitize_lead(raw) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Lead submission rejected: {}", e);
                return SubmissionResult::rejected(&e);
            }
        };

        let segment = classify(&fields);
        let lead = self
            .leads
            .append(Lead::capture(fields, form_type, segment, &self.source, page));

        self.tracker.track_event(
            "form_submit",
            object(json!({
                "form_type": form_type,
                "market_segment": lead.market_segment,
                "has_company": !lead.fields.company.is_empty(),
                "has_project_type": !lead.fields.project_type.is_empty(),
            })),
            page,
        );

        tracing::info!(
            "[Lead Captured] {} form, segment {}, email {}",
            form_type,
            lead.market_segment,
            lead.fields.email
        );

        let diagnostics = self.dispatch(&lead, form_type).await;
        SubmissionResult::accepted(lead, diagnostics)
    }

    /// Runs every sink on its own task so a panicking sink is contained too.
    /// A sink still running at the timeout is reported as failed and left to
    /// finish in the background.
    async fn dispatch(&self, lead: &Lead, form_type: FormType) -> Vec<SinkOutcome> {
        let timeout = self.sink_timeout;
        let handles = self.sinks.iter().map(|sink| {
            let sink = Arc::clone(sink);
            let lead = lead.clone();
            let kind = sink.kind();
            let handle = tokio::spawn(async move { sink.deliver(&lead, form_type).await });
            async move {
                let result = match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        tracing::error!("{} sink task failed: {}", kind, e);
                        SinkResult::failed(format!("sink task failed: {}", e))
                    }
                    Err(_) => SinkResult::failed(format!("timed out after {:?}", timeout)),
                };
                SinkOutcome { sink: kind, result }
            }
        });

        let outcomes = join_all(handles).await;

        for outcome in outcomes.iter().filter(|o| !o.result.success) {
            tracing::warn!(
                "{} sink did not deliver: {}",
                outcome.sink,
                outcome.result.error.as_deref().unwrap_or("unknown error")
            );
        }

        outcomes
    }
}
