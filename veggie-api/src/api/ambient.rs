//! Ambient reading endpoint

use axum::{extract::State, routing::get, Json, Router};
use veggie_common::models::AmbientReading;

use crate::error::ApiResult;
use crate::AppState;

/// GET /ambient
///
/// Latest normalized reading. 404 before the first telemetry message,
/// 500 when the latest message could not be interpreted.
pub async fn get_ambient(State(state): State<AppState>) -> ApiResult<Json<AmbientReading>> {
    let reading = state.cache.latest_reading()?;
    Ok(Json(reading))
}

/// Build ambient routes
pub fn ambient_routes() -> Router<AppState> {
    Router::new().route("/ambient", get(get_ambient))
}
