//! Interaction tracking for the landing page.
//!
//! Every tracked event is appended to the local [`EventLog`] and, when an
//! analytics endpoint is configured, forwarded there in the background.
//! Tracking never fails outward.

use chrono::Utc;
use moka::future::Cache;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{AnalyticsEvent, AnalyticsSummary, FormType, PageContext};
use crate::storage::{EventLog, LeadStore};

/// Scroll depth milestones, in percent.
const SCROLL_MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// Lifetime of a visitor session's "already tracked" markers.
const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

pub struct AnalyticsTracker {
    events: Arc<EventLog>,
    leads: Arc<LeadStore>,
    forwarder: Option<EventForwarder>,
    /// Per-session markers for once-only events (scroll milestones, section views).
    session_markers: Cache<String, ()>,
}

#[derive(Clone)]
struct EventForwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl AnalyticsTracker {
    pub fn new(events: Arc<EventLog>, leads: Arc<LeadStore>) -> Self {
        Self {
            events,
            leads,
            forwarder: None,
            session_markers: Cache::builder()
                .time_to_live(SESSION_TTL)
                .max_capacity(100_000)
                .build(),
        }
    }

    /// Forwards a copy of every event to `endpoint` (fire-and-forget).
    pub fn with_forwarding(mut self, endpoint: String) -> Self {
        self.forwarder = Some(EventForwarder {
            client: reqwest::Client::new(),
            endpoint,
        });
        self
    }

    /// Records an event. Returns the stored event.
    pub fn track_event(
        &self,
        name: &str,
        data: Map<String, Value>,
        page: &PageContext,
    ) -> AnalyticsEvent {
        let event = AnalyticsEvent {
            name: name.to_string(),
            data,
            timestamp: Utc::now(),
            url: page.url.clone().unwrap_or_default(),
            path: page.path(),
            referrer: page.referrer.clone().unwrap_or_default(),
            user_agent: page.user_agent.clone().unwrap_or_default(),
        };

        tracing::debug!("[Analytics Event] {} {:?}", event.name, event.data);
        self.events.append(event.clone());

        if let Some(forwarder) = &self.forwarder {
            forwarder.forward(&event);
        }

        event
    }

    pub fn page_view(&self, title: &str, page: &PageContext) -> AnalyticsEvent {
        self.track_event(
            "page_view",
            object(json!({
                "page_title": title,
                "page_path": page.path(),
            })),
            page,
        )
    }

    pub fn cta_click(&self, cta_name: &str, location: Option<&str>, page: &PageContext) -> AnalyticsEvent {
        self.track_event(
            "cta_click",
            object(json!({
                "cta_name": cta_name,
                "location": location.unwrap_or("unknown"),
            })),
            page,
        )
    }

    pub fn form_open(&self, form_type: FormType, page: &PageContext) -> AnalyticsEvent {
        self.track_event(
            "form_open",
            object(json!({ "form_type": form_type })),
            page,
        )
    }

    /// `action` is one of `focus`, `blur`, `change`.
    pub fn form_field(
        &self,
        form_type: FormType,
        field_name: &str,
        action: &str,
        page: &PageContext,
    ) -> AnalyticsEvent {
        self.track_event(
            "form_field_interaction",
            object(json!({
                "form_type": form_type,
                "field_name": field_name,
                "action": action,
            })),
            page,
        )
    }

    /// Records a form closed before submission, with what had been filled in.
    pub fn form_abandonment(
        &self,
        form_type: FormType,
        partial: &Map<String, Value>,
        page: &PageContext,
    ) -> AnalyticsEvent {
        let filled = |key: &str| {
            partial
                .get(key)
                .map(|v| !v.is_null() && v.as_str() != Some(""))
                .unwrap_or(false)
        };

        self.track_event(
            "form_abandonment",
            object(json!({
                "form_type": form_type,
                "fields_completed": partial.len(),
                "has_email": filled("email"),
                "has_name": filled("name"),
            })),
            page,
        )
    }

    /// Records the first milestone in [`SCROLL_MILESTONES`] that `percentage`
    /// has reached, once per session. Returns `None` when nothing new was recorded.
    pub async fn scroll_depth(
        &self,
        session_id: &str,
        percentage: f64,
        page: &PageContext,
    ) -> Option<AnalyticsEvent> {
        let milestone = SCROLL_MILESTONES
            .iter()
            .copied()
            .find(|m| percentage >= f64::from(*m))?;

        let marker = format!("{}:scroll_{}", session_id, milestone);
        if !self.mark_once(marker).await {
            return None;
        }

        Some(self.track_event(
            "scroll_depth",
            object(json!({ "percentage": milestone })),
            page,
        ))
    }

    /// Records a section coming into view, once per session.
    pub async fn section_view(
        &self,
        session_id: &str,
        section_id: &str,
        section_name: &str,
        page: &PageContext,
    ) -> Option<AnalyticsEvent> {
        let marker = format!("{}:section_viewed_{}", session_id, section_id);
        if !self.mark_once(marker).await {
            return None;
        }

        Some(self.track_event(
            "section_view",
            object(json!({
                "section_id": section_id,
                "section_name": section_name,
            })),
            page,
        ))
    }

    /// Stored events, oldest first.
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.list()
    }

    /// Counters over everything stored so far.
    pub fn summary(&self) -> AnalyticsSummary {
        let events = self.events.list();
        let leads = self.leads.list();

        let count = |name: &str| events.iter().filter(|e| e.name == name).count();
        let page_views = count("page_view");
        let form_submits = count("form_submit");

        let mut leads_by_segment = BTreeMap::new();
        for lead in &leads {
            *leads_by_segment.entry(lead.market_segment).or_insert(0) += 1;
        }

        AnalyticsSummary {
            total_events: events.len(),
            total_leads: leads.len(),
            page_views,
            cta_clicks: count("cta_click"),
            form_opens: count("form_open"),
            form_submits,
            conversion_rate: form_submits as f64 / page_views.max(1) as f64 * 100.0,
            leads_by_segment,
        }
    }

    /// Drops stored events and all session markers.
    pub fn clear(&self) {
        self.events.clear();
        self.session_markers.invalidate_all();
    }

    /// True the first time a marker is seen within its TTL.
    async fn mark_once(&self, marker: String) -> bool {
        self.session_markers
            .entry(marker)
            .or_insert(())
            .await
            .is_fresh()
    }
}

impl EventForwarder {
    fn forward(&self, event: &AnalyticsEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available, analytics event not forwarded");
            return;
        };

        let forwarder = self.clone();
        let event = event.clone();
        runtime.spawn(async move {
            let result = forwarder
                .client
                .post(&forwarder.endpoint)
                .json(&event)
                .send()
                .await;

            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::error!(
                        "Analytics endpoint returned {} for '{}'",
                        response.status(),
                        event.name
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Analytics tracking error: {}", e),
            }
        });
    }
}

/// Turns a `json!({...})` literal into an event data map.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn tracker() -> AnalyticsTracker {
        let backend = Arc::new(MemoryBackend::new());
        AnalyticsTracker::new(
            Arc::new(EventLog::new(backend.clone())),
            Arc::new(LeadStore::new(backend)),
        )
    }

    fn page() -> PageContext {
        PageContext {
            url: Some("https://byoticabio.ai/platform?utm_source=x".to_string()),
            referrer: Some("https://google.com".to_string()),
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[test]
    fn test_track_event_fills_page_fields() {
        let tracker = tracker();
        let event = tracker.cta_click("hero_demo", None, &page());

        assert_eq!(event.name, "cta_click");
        assert_eq!(event.path, "/platform");
        assert_eq!(event.referrer, "https://google.com");
        assert_eq!(event.user_agent, "test-agent");
        assert_eq!(event.data["location"], "unknown");
        assert_eq!(tracker.summary().total_events, 1);
    }

    #[test]
    fn test_form_abandonment_counts_filled_fields() {
        let tracker = tracker();
        let partial = object(json!({ "name": "Jane", "email": "", "company": "Acme" }));

        let event = tracker.form_abandonment(FormType::Demo, &partial, &page());

        assert_eq!(event.data["fields_completed"], 3);
        assert_eq!(event.data["has_name"], true);
        assert_eq!(event.data["has_email"], false);
    }

    #[tokio::test]
    async fn test_scroll_depth_once_per_session() {
        let tracker = tracker();

        let first = tracker.scroll_depth("s1", 30.0, &page()).await;
        assert_eq!(first.unwrap().data["percentage"], 25);
        assert!(tracker.scroll_depth("s1", 40.0, &page()).await.is_none());
        assert!(tracker.scroll_depth("s2", 40.0, &page()).await.is_some());
        assert!(tracker.scroll_depth("s3", 10.0, &page()).await.is_none());
    }

    #[tokio::test]
    async fn test_section_view_resets_after_clear() {
        let tracker = tracker();

        assert!(tracker.section_view("s1", "pricing", "Pricing", &page()).await.is_some());
        assert!(tracker.section_view("s1", "pricing", "Pricing", &page()).await.is_none());

        tracker.clear();
        tracker.session_markers.run_pending_tasks().await;

        assert!(tracker.section_view("s1", "pricing", "Pricing", &page()).await.is_some());
    }

    #[test]
    fn test_summary_conversion_rate() {
        let tracker = tracker();
        for _ in 0..4 {
            tracker.page_view("Home", &page());
        }
        tracker.track_event("form_submit", Map::new(), &page());

        let summary = tracker.summary();
        assert_eq!(summary.page_views, 4);
        assert_eq!(summary.form_submits, 1);
        assert!((summary.conversion_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_without_page_views() {
        let tracker = tracker();
        tracker.track_event("form_submit", Map::new(), &page());

        assert!((tracker.summary().conversion_rate - 100.0).abs() < f64::EPSILON);
    }
}
