use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_lead_capture_api::analytics::AnalyticsTracker;
use rust_lead_capture_api::config::Config;
use rust_lead_capture_api::handlers::{self, AppState};
use rust_lead_capture_api::lead_capture::LeadCaptureService;
use rust_lead_capture_api::storage::{
    EventLog, FileBackend, KeyValueBackend, LeadStore, MemoryBackend,
};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Local storage backend and stores.
/// - Notification sinks (CRM, email, webhook).
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_lead_capture_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Storage backend: files when STORAGE_DIR is set, memory otherwise
    let backend: Arc<dyn KeyValueBackend> = match &config.storage_dir {
        Some(dir) => {
            let backend = FileBackend::open(dir)?;
            tracing::info!("File storage ready at {}", backend.dir().display());
            Arc::new(backend)
        }
        None => Arc::new(MemoryBackend::new()),
    };

    let leads = Arc::new(LeadStore::new(backend.clone()));
    let events = Arc::new(EventLog::new(backend));

    let mut tracker = AnalyticsTracker::new(events, leads.clone());
    if let Some(endpoint) = &config.analytics_endpoint {
        tracing::info!("Forwarding analytics events to {}", endpoint);
        tracker = tracker.with_forwarding(endpoint.clone());
    }
    let tracker = Arc::new(tracker);

    let capture =
        LeadCaptureService::from_config(&config, leads.clone(), tracker.clone()).await;
    tracing::info!("Lead capture ready with {} sink(s)", capture.sink_count());

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        leads,
        tracker,
        capture: Arc::new(capture),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = handlers::routes().layer(
        ServiceBuilder::new()
            // Request size limit: 1MB is plenty for a form post
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
