use crate::analytics::AnalyticsTracker;
use crate::config::Config;
use crate::errors::AppError;
use crate::export::{export_filename, leads_to_csv};
use crate::integrity::checksum;
use crate::lead_capture::LeadCaptureService;
use crate::models::*;
use crate::storage::LeadStore;
use axum::{
    extract::{FromRequest, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Captured leads.
    pub leads: Arc<LeadStore>,
    /// Event tracking and summaries.
    pub tracker: Arc<AnalyticsTracker>,
    /// Submission pipeline.
    pub capture: Arc<LeadCaptureService>,
}

/// API routes, without the rate limiting and tracing layers `main` adds.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/leads", get(list_leads))
        .route("/api/v1/leads/export.csv", get(export_leads_csv))
        .route("/api/v1/leads/:form_type", post(submit_lead))
        .route("/api/v1/events", post(track_event).get(list_events))
        .route("/api/v1/analytics/summary", get(analytics_summary))
        .route("/api/v1/data", delete(clear_data))
        .fallback(not_found)
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Health check endpoint.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let storage = if state.config.storage_dir.is_some() {
        "file"
    } else {
        "memory"
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-lead-capture-api",
            "version": env!("CARGO_PKG_VERSION"),
            "brand": state.config.brand_name,
            "lead_source": state.config.lead_source,
            "storage": storage,
            "sinks": state.capture.sink_count()
        })),
    )
}

/// `Json` body whose rejections (bad syntax, wrong shape, missing content
/// type) answer with the `{success:false, error}` body of a failed form.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct FormJson<T>(pub T);

/// Builds the page context of a request from the body fields and the
/// `User-Agent` header.
fn page_context(page_url: Option<String>, referrer: Option<String>, headers: &HeaderMap) -> PageContext {
    PageContext {
        url: page_url,
        referrer: referrer.or_else(|| {
            headers
                .get(header::REFERER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        }),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// POST /api/v1/leads/:form_type
///
/// Captures a contact or demo form submission. Returns 200 with the stored
/// lead whenever validation passes, even if every sink failed; returns 400
/// with `{success:false, error}` when the form is invalid or the body is not
/// the expected JSON.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    Path(form_type): Path<String>,
    headers: HeaderMap,
    FormJson(payload): FormJson<LeadSubmission>,
) -> Result<Json<SubmissionResult>, AppError> {
    let form_type: FormType = form_type.parse()?;
    tracing::info!("POST /leads/{}", form_type);

    let page = page_context(payload.page_url, payload.referrer, &headers);
    let result = state.capture.submit(form_type, &payload.form, &page).await;

    if !result.success {
        return Err(AppError::Validation(
            result.error.unwrap_or_else(|| "Invalid submission".to_string()),
        ));
    }

    Ok(Json(result))
}

/// GET /api/v1/leads
pub async fn list_leads(State(state): State<Arc<AppState>>) -> Json<Vec<Lead>> {
    Json(state.leads.list())
}

/// GET /api/v1/leads/export.csv
///
/// Downloads all leads as CSV. The ETag is the SHA-256 of the body, so two
/// exports of an unchanged store carry the same tag.
pub async fn export_leads_csv(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let csv = leads_to_csv(&state.leads.list())?;
    let etag = format!("\"{}\"", checksum(&csv));

    let unchanged = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|tag| tag == etag);
    if unchanged {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Utc::now().date_naive())
    );

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .map_err(|e| AppError::InternalError(e.to_string()))?,
            ),
            (
                header::ETAG,
                HeaderValue::from_str(&etag).map_err(|e| AppError::InternalError(e.to_string()))?,
            ),
        ],
        csv,
    )
        .into_response())
}

/// POST /api/v1/events
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    FormJson(payload): FormJson<TrackEventRequest>,
) -> Result<(StatusCode, Json<AnalyticsEvent>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Event name is required".to_string()));
    }

    let page = page_context(payload.page_url, payload.referrer, &headers);
    let event = state.tracker.track_event(name, payload.data, &page);

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/v1/events
pub async fn list_events(State(state): State<Arc<AppState>>) -> Json<Vec<AnalyticsEvent>> {
    Json(state.tracker.events())
}

/// GET /api/v1/analytics/summary
pub async fn analytics_summary(State(state): State<Arc<AppState>>) -> Json<AnalyticsSummary> {
    Json(state.tracker.summary())
}

/// DELETE /api/v1/data
///
/// Clears stored leads, events and session markers.
pub async fn clear_data(State(state): State<Arc<AppState>>) -> StatusCode {
    tracing::warn!("Clearing all stored leads and analytics events");
    state.leads.clear();
    state.tracker.clear();
    StatusCode::NO_CONTENT
}
