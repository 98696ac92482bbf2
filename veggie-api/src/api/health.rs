//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use veggie_common::events::SubscriberState;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" while telemetry is subscribed, "degraded" otherwise
    pub status: String,
    /// Module name ("veggie-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash captured at build time
    pub git_hash: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Telemetry subscriber connection state
    pub subscriber_state: SubscriberState,
    /// Whether a usable ambient reading is cached
    pub ambient_available: bool,
    /// Age of the cached reading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambient_age_seconds: Option<u64>,
    /// Classifier implementation in use
    pub classifier: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let uptime_seconds = now
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let subscriber_state = *state.subscriber_state.borrow();
    let reading = state.cache.latest_reading().ok();

    let status = match subscriber_state {
        SubscriberState::Subscribed => "ok",
        _ => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "veggie-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds,
        subscriber_state,
        ambient_available: reading.is_some(),
        ambient_age_seconds: reading.map(|r| r.age_seconds(now)),
        classifier: state.orchestrator.classifier_name().to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
