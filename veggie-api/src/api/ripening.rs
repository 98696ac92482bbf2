//! Standalone ripening endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use veggie_common::models::{AmbientReading, RipeningRequest, RipeningResponse};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /analyze-ripening
///
/// Estimates ripeness for a label the client already has, under the
/// conditions in the body. The ambient cache is not consulted.
pub async fn analyze_ripening(
    State(state): State<AppState>,
    body: Result<Json<RipeningRequest>, JsonRejection>,
) -> ApiResult<Json<RipeningResponse>> {
    let Json(request) = body?;

    let prediction = request.prediction.trim();
    if prediction.is_empty() {
        return Err(ApiError::BadRequest("prediction must not be empty".to_string()));
    }

    let reading = AmbientReading::new(request.temperature, request.humidity, Utc::now())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let estimate = state.orchestrator.estimate_ripening(prediction, &reading).await;
    Ok(Json(estimate.into()))
}

/// Build ripening routes
pub fn ripening_routes() -> Router<AppState> {
    Router::new().route("/analyze-ripening", post(analyze_ripening))
}
