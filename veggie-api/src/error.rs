//! Error types for veggie-api
//!
//! Every handler error becomes an [`ApiError`], rendered as
//! `{"error": {"code": ..., "message": ...}}`.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cache::AmbientError;
use crate::orchestrator::AnalysisError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured body limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Ambient cache empty or unreadable (404 / 500)
    #[error(transparent)]
    Ambient(#[from] AmbientError),

    /// Analysis pipeline failed (500)
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::Ambient(AmbientError::Unavailable) => {
                (StatusCode::NOT_FOUND, "AMBIENT_UNAVAILABLE")
            }
            ApiError::Ambient(AmbientError::Unreadable(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AMBIENT_UNREADABLE")
            }
            ApiError::Analysis(AnalysisError::Classification(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CLASSIFICATION_FAILED")
            }
            ApiError::Analysis(AnalysisError::ClassificationTimeout(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CLASSIFICATION_TIMEOUT")
            }
            // Inside an analysis every ambient problem is a server error
            ApiError::Analysis(AnalysisError::Ambient(AmbientError::Unavailable)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AMBIENT_UNAVAILABLE")
            }
            ApiError::Analysis(AnalysisError::Ambient(AmbientError::Unreadable(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AMBIENT_UNREADABLE")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationError;
    use std::time::Duration;
    use veggie_common::models::NormalizationError;

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(ApiError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ApiError::PayloadTooLarge("x".into())), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status(AmbientError::Unavailable.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(AmbientError::Unreadable(NormalizationError::Opaque("x".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AnalysisError::Ambient(AmbientError::Unavailable).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AnalysisError::ClassificationTimeout(Duration::from_secs(1)).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(
                AnalysisError::Classification(ClassificationError::ModelUnavailable("x".into()))
                    .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unavailable_message_is_client_facing() {
        let err = ApiError::from(AmbientError::Unavailable);
        assert_eq!(
            err.to_string(),
            "No ambient data available yet. Please wait for telemetry messages."
        );
    }
}
