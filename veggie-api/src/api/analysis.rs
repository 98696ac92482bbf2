//! Produce analysis endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::debug;
use veggie_common::models::AnalysisResponse;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field names accepted for the image
const IMAGE_FIELDS: [&str; 2] = ["file", "image"];
const USER_ID_FIELD: &str = "user_id";

/// POST /analysis
///
/// Multipart body with an image (`file` or `image`) and an optional
/// `user_id`, which is logged but otherwise unused.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AnalysisResponse>> {
    let mut multipart = multipart?;
    let mut image = None;
    let mut user_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(name) if IMAGE_FIELDS.contains(&name) => {
                if image.is_none() {
                    image = Some(field.bytes().await?);
                }
            }
            Some(USER_ID_FIELD) => user_id = Some(field.text().await?),
            other => debug!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let image = image.ok_or_else(|| {
        ApiError::BadRequest("multipart body has no 'file' or 'image' field".to_string())
    })?;

    debug!(user_id = user_id.as_deref().unwrap_or("-"), bytes = image.len(), "Analysis requested");

    let response = state.orchestrator.analyze(&image).await?;
    Ok(Json(response))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/analysis", post(analyze))
}
