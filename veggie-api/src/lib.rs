//! veggie-api library interface
//!
//! Exposes the service components and router for the binary and for
//! integration tests.

pub mod api;
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod error;
pub mod estimator;
pub mod orchestrator;
pub mod telemetry;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use veggie_common::events::{EventBus, SubscriberState};

use crate::cache::AmbientCache;
use crate::orchestrator::AnalysisOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Latest ambient snapshot (read-only from handlers)
    pub cache: AmbientCache,
    /// Analysis pipeline
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Telemetry subscriber connection state
    pub subscriber_state: watch::Receiver<SubscriberState>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        cache: AmbientCache,
        orchestrator: Arc<AnalysisOrchestrator>,
        event_bus: EventBus,
        subscriber_state: watch::Receiver<SubscriberState>,
    ) -> Self {
        Self {
            cache,
            orchestrator,
            event_bus,
            subscriber_state,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::ambient_routes())
        .merge(api::analysis_routes())
        .merge(api::ripening_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
